//! Purpose: Define the stable public Rust API boundary for placementd.
//! Exports: Core types and operations needed by the server binary and tests.
//! Role: Public, additive-only surface; hides internal storage modules.
//! Invariants: This module is the only public path to store primitives.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::export::{write_csv, RowSource};
pub use crate::core::models::{
    format_deadline, parse_deadline, Application, ColumnSelection, Company, CompanyPublic,
    Drive, DriveDetail, DriveRequest, Role, RoleRequest, Student, APPLICANT_COLUMNS,
};
pub use crate::core::outbox::{DriveNotice, Notifier, OutboxNotifier};
pub use crate::core::store::{OutboxEntry, Store, PAGE_SIZE};
pub use crate::core::value::CellValue;
