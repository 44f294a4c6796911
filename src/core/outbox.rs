//! Purpose: Queue drive notifications for later delivery.
//! Exports: `DriveNotice`, `Notifier`, `OutboxNotifier`.
//! Role: Notification port behind drive creation; delivery itself is an
//! operator concern (`placementd outbox`), not an inline SMTP call.
//! Invariants: Queuing happens after the drive row is committed; a queue
//! failure surfaces to the caller instead of silently dropping the notice.

use std::sync::Arc;

use crate::core::error::Error;
use crate::core::store::Store;

/// What students are told when a drive opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveNotice {
    pub drive_id: String,
    pub company_name: String,
    pub deadline_display: String,
}

impl DriveNotice {
    pub fn subject(&self) -> String {
        format!("New placement drive: {}", self.company_name)
    }

    pub fn body(&self) -> String {
        format!(
            "{} has opened a new placement drive.\n\n\
             Apply before {} at /drives/{}.",
            self.company_name, self.deadline_display, self.drive_id
        )
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipients: &[String], notice: &DriveNotice) -> Result<(), Error>;
}

/// Default notifier: one outbox row per notice, recipients batched together.
pub struct OutboxNotifier {
    store: Arc<Store>,
}

impl OutboxNotifier {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, recipients: &[String], notice: &DriveNotice) -> Result<(), Error> {
        self.store
            .queue_notice(recipients, &notice.subject(), &notice.body())?;
        Ok(())
    }
}
