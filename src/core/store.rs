//! Purpose: SQLite-backed data access for companies, drives, roles, and applications.
//! Exports: `Store`, `OutboxEntry`, `PAGE_SIZE`.
//! Role: The one place query text lives; handlers call these methods from
//! `spawn_blocking` and never touch the connection directly.
//! Invariants: The applicant-export cursor lives and dies inside
//! `with_applicant_rows`; it is released exactly once on every exit path.
//! Invariants: Export column selection is already allowlist-validated
//! (`ColumnSelection`) before it reaches this module.
//! Notes: One connection, one lock; a long-running export cursor holds the
//! lock for its whole lifetime (see `with_applicant_rows`).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Row};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};
use crate::core::export::RowSource;
use crate::core::models::{
    new_id, Application, ColumnSelection, Company, CompanyPublic, Drive, DriveDetail,
    DriveRequest, Role, Student,
};
use crate::core::schema::init_schema;
use crate::core::value::CellValue;

pub const PAGE_SIZE: i64 = 10;

pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub created_at: String,
    pub sent: bool,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to open database")
                .with_context(path.display().to_string())
                .with_source(err)
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to open in-memory database")
                .with_source(err)
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn init_schema(&self) -> Result<(), Error> {
        init_schema(&self.conn())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    // Companies

    pub fn create_company(&self, company: &mut Company) -> Result<(), Error> {
        if company.name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("company name is required"));
        }
        company.id = new_id("c")?;
        self.conn()
            .execute(
                "INSERT INTO companies (id, name, industry, website, overview, hr_name, hr_email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    company.id,
                    company.name,
                    company.industry,
                    company.website,
                    company.overview,
                    company.hr_name,
                    company.hr_email,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    pub fn company(&self, id: &str) -> Result<Company, Error> {
        self.conn()
            .query_row(
                "SELECT id, name, industry, website, overview, hr_name, hr_email
                 FROM companies WHERE id = ?1",
                params![id],
                company_from_row,
            )
            .map_err(|err| not_found(err, format!("company {id} not found")))
    }

    pub fn companies(&self, page: i64, name_filter: &str) -> Result<Vec<Company>, Error> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, industry, website, overview, hr_name, hr_email
                 FROM companies
                 WHERE name LIKE '%' || ?1 || '%'
                 ORDER BY name
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(query_error)?;
        let companies = stmt
            .query_map(
                params![name_filter, PAGE_SIZE, page.max(0) * PAGE_SIZE],
                company_from_row,
            )
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(companies)
    }

    pub fn companies_for_students(
        &self,
        page: i64,
        name_filter: &str,
    ) -> Result<Vec<CompanyPublic>, Error> {
        Ok(self
            .companies(page, name_filter)?
            .into_iter()
            .map(CompanyPublic::from)
            .collect())
    }

    // Students

    pub fn add_student(&self, student: &Student) -> Result<(), Error> {
        self.conn()
            .execute(
                "INSERT INTO students (id, name, email, phone, branch, cgpa, placed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    student.id,
                    student.name,
                    student.email,
                    student.phone,
                    student.branch,
                    student.cgpa,
                    student.placed,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    /// Email addresses of unplaced students in the allowed branches whose CGPA
    /// meets the drive minimum.
    pub fn mailing_list(&self, branches: &[String], min_cgpa: f64) -> Result<Vec<String>, Error> {
        if branches.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (0..branches.len())
            .map(|index| format!("?{}", index + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT email FROM students
             WHERE cgpa >= ?1 AND placed = 0 AND branch IN ({placeholders})
             ORDER BY email"
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql).map_err(query_error)?;
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&min_cgpa];
        for branch in branches {
            values.push(branch);
        }
        let emails = stmt
            .query_map(values.as_slice(), |row| row.get::<_, String>(0))
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(emails)
    }

    // Drives

    /// Insert the drive and its roles in one transaction; returns the drive id.
    pub fn create_drive(&self, request: &DriveRequest) -> Result<String, Error> {
        let drive_id = new_id("d")?;
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(query_error)?;
        tx.execute(
            "INSERT INTO drives (id, company_id, drive_type, location, deadline, min_cgpa,
                                 allowed_branches, qualifications, job_description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                drive_id,
                request.company_id,
                request.drive_type,
                request.location,
                request.deadline,
                request.min_cgpa,
                request.branches().join(","),
                request.qualifications,
                request.job_description,
            ],
        )
        .map_err(query_error)?;
        for role in &request.roles {
            let role_id = new_id("r")?;
            tx.execute(
                "INSERT INTO roles (id, drive_id, title, salary_low, salary_high,
                                    stipend_low, stipend_high)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    role_id,
                    drive_id,
                    role.title,
                    role.salary_low,
                    role.salary_high,
                    role.stipend_low,
                    role.stipend_high,
                ],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)?;
        Ok(drive_id)
    }

    pub fn drive(&self, id: &str) -> Result<DriveDetail, Error> {
        let drive = self
            .conn()
            .query_row(
                "SELECT d.id, d.company_id, c.name, d.drive_type, d.location, d.deadline,
                        d.min_cgpa, d.allowed_branches, d.qualifications, d.job_description
                 FROM drives d JOIN companies c ON c.id = d.company_id
                 WHERE d.id = ?1",
                params![id],
                drive_from_row,
            )
            .map_err(|err| not_found(err, format!("drive {id} not found")))?;
        let roles = self.roles_for_drive(id)?;
        Ok(DriveDetail {
            drive,
            roles,
            applied_role: None,
        })
    }

    fn roles_for_drive(&self, drive_id: &str) -> Result<Vec<Role>, Error> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, drive_id, title, salary_low, salary_high, stipend_low, stipend_high
                 FROM roles WHERE drive_id = ?1 ORDER BY title",
            )
            .map_err(query_error)?;
        let roles = stmt
            .query_map(params![drive_id], role_from_row)
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(roles)
    }

    pub fn drives_for_students(&self) -> Result<Vec<Drive>, Error> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.company_id, c.name, d.drive_type, d.location, d.deadline,
                        d.min_cgpa, d.allowed_branches, d.qualifications, d.job_description
                 FROM drives d JOIN companies c ON c.id = d.company_id
                 ORDER BY d.deadline",
            )
            .map_err(query_error)?;
        let drives = stmt
            .query_map([], drive_from_row)
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(drives)
    }

    pub fn delete_drive(&self, id: &str) -> Result<(), Error> {
        let deleted = self
            .conn()
            .execute("DELETE FROM drives WHERE id = ?1", params![id])
            .map_err(query_error)?;
        if deleted == 0 {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("drive {id} not found")));
        }
        Ok(())
    }

    // Applications

    pub fn applied_role(
        &self,
        student_id: &str,
        drive_id: &str,
    ) -> Result<Option<Role>, Error> {
        let result = self.conn().query_row(
            "SELECT r.id, r.drive_id, r.title, r.salary_low, r.salary_high,
                    r.stipend_low, r.stipend_high
             FROM applications a JOIN roles r ON r.id = a.role_id
             WHERE a.student_id = ?1 AND a.drive_id = ?2",
            params![student_id, drive_id],
            role_from_row,
        );
        match result {
            Ok(role) => Ok(Some(role)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(query_error(err)),
        }
    }

    pub fn apply(&self, application: &mut Application) -> Result<(), Error> {
        let role_drive: String = self
            .conn()
            .query_row(
                "SELECT drive_id FROM roles WHERE id = ?1",
                params![application.role_id],
                |row| row.get(0),
            )
            .map_err(|err| {
                not_found(err, format!("role {} not found", application.role_id))
            })?;
        if role_drive != application.drive_id {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("role does not belong to the given drive"));
        }
        application.id = new_id("a")?;
        application.applied_at = now_rfc3339()?;
        self.conn()
            .execute(
                "INSERT INTO applications (id, student_id, drive_id, role_id, applied_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    application.id,
                    application.student_id,
                    application.drive_id,
                    application.role_id,
                    application.applied_at,
                ],
            )
            .map_err(|err| {
                if constraint_violation(&err) {
                    Error::new(ErrorKind::AlreadyExists)
                        .with_message("student has already applied to this drive")
                } else {
                    query_error(err)
                }
            })?;
        Ok(())
    }

    // Applicant export

    /// Run the applicant-export query and hand the caller the column set plus
    /// a forward-only row cursor. The statement and cursor are dropped when
    /// this call returns, whatever path it takes.
    ///
    /// The connection lock is held until `consume` returns. When the consumer
    /// paces the cursor at a remote client's speed (the streaming CSV export
    /// does), every other store call waits behind it for the duration.
    pub fn with_applicant_rows<T>(
        &self,
        role_id: &str,
        selection: &ColumnSelection,
        drive_id: &str,
        consume: impl FnOnce(&[String], &mut dyn RowSource) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if role_id.is_empty() || drive_id.is_empty() {
            return Err(Error::new(ErrorKind::MissingParameter)
                .with_message("role and drive identifiers are required"));
        }
        let sql = format!(
            "SELECT {} FROM applications a
             JOIN students s ON s.id = a.student_id
             JOIN roles r ON r.id = a.role_id
             WHERE a.role_id = ?1 AND a.drive_id = ?2
             ORDER BY a.applied_at, a.rowid",
            selection.select_list()
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql).map_err(|err| {
            Error::new(ErrorKind::Query)
                .with_message("failed to prepare applicant export query")
                .with_source(err)
        })?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|column| column.decl_type().map(str::to_string))
            .collect();
        let rows = stmt.query(params![role_id, drive_id]).map_err(|err| {
            Error::new(ErrorKind::Query)
                .with_message("failed to run applicant export query")
                .with_source(err)
        })?;
        let mut source = SqliteRows { rows, decl_types };
        consume(&columns, &mut source)
    }

    // Outbox

    pub fn queue_notice(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<i64, Error> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO outbox (recipients, subject, body, created_at, sent)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![recipients.join(","), subject, body, now_rfc3339()?],
        )
        .map_err(query_error)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn outbox(&self, include_sent: bool) -> Result<Vec<OutboxEntry>, Error> {
        let conn = self.conn();
        let sql = if include_sent {
            "SELECT id, recipients, subject, body, created_at, sent
             FROM outbox ORDER BY id"
        } else {
            "SELECT id, recipients, subject, body, created_at, sent
             FROM outbox WHERE sent = 0 ORDER BY id"
        };
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let entries = stmt
            .query_map([], |row| {
                let recipients: String = row.get(1)?;
                Ok(OutboxEntry {
                    id: row.get(0)?,
                    recipients: recipients
                        .split(',')
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect(),
                    subject: row.get(2)?,
                    body: row.get(3)?,
                    created_at: row.get(4)?,
                    sent: row.get(5)?,
                })
            })
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(entries)
    }

    pub fn mark_sent(&self, id: i64) -> Result<(), Error> {
        let updated = self
            .conn()
            .execute("UPDATE outbox SET sent = 1 WHERE id = ?1", params![id])
            .map_err(query_error)?;
        if updated == 0 {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("outbox entry {id} not found")));
        }
        Ok(())
    }
}

struct SqliteRows<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    decl_types: Vec<Option<String>>,
}

impl RowSource for SqliteRows<'_> {
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, Error> {
        let row = self.rows.next().map_err(|err| {
            Error::new(ErrorKind::Iteration)
                .with_message("applicant cursor faulted mid-iteration")
                .with_source(err)
        })?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut cells = Vec::with_capacity(self.decl_types.len());
        for (index, decl_type) in self.decl_types.iter().enumerate() {
            let value = row.get_ref(index).map_err(|err| {
                Error::new(ErrorKind::Iteration)
                    .with_message(format!("failed to read cell {index}"))
                    .with_source(err)
            })?;
            cells.push(CellValue::from_sqlite(value, decl_type.as_deref()));
        }
        Ok(Some(cells))
    }
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        industry: row.get(2)?,
        website: row.get(3)?,
        overview: row.get(4)?,
        hr_name: row.get(5)?,
        hr_email: row.get(6)?,
    })
}

fn drive_from_row(row: &Row<'_>) -> rusqlite::Result<Drive> {
    let branches: String = row.get(7)?;
    Ok(Drive {
        id: row.get(0)?,
        company_id: row.get(1)?,
        company_name: row.get(2)?,
        drive_type: row.get(3)?,
        location: row.get(4)?,
        deadline: row.get(5)?,
        min_cgpa: row.get(6)?,
        allowed_branches: branches
            .split(',')
            .filter(|branch| !branch.is_empty())
            .map(str::to_string)
            .collect(),
        qualifications: row.get(8)?,
        job_description: row.get(9)?,
    })
}

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        drive_id: row.get(1)?,
        title: row.get(2)?,
        salary_low: row.get(3)?,
        salary_high: row.get(4)?,
        stipend_low: row.get(5)?,
        stipend_high: row.get(6)?,
    })
}

fn query_error(err: rusqlite::Error) -> Error {
    Error::new(ErrorKind::Query)
        .with_message("database query failed")
        .with_source(err)
}

fn not_found(err: rusqlite::Error, message: String) -> Error {
    match err {
        rusqlite::Error::QueryReturnedNoRows => {
            Error::new(ErrorKind::NotFound).with_message(message)
        }
        other => query_error(other),
    }
}

fn constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn now_rfc3339() -> Result<String, Error> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to format timestamp")
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::{Store, PAGE_SIZE};
    use crate::core::error::ErrorKind;
    use crate::core::export::write_csv;
    use crate::core::models::{
        Application, ColumnSelection, Company, DriveRequest, RoleRequest, Student,
    };

    fn test_store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        store
    }

    fn seed_company(store: &Store) -> Company {
        let mut company = Company {
            id: String::new(),
            name: "Initech".to_string(),
            industry: "Software".to_string(),
            website: "https://initech.example".to_string(),
            overview: "TPS reports at scale".to_string(),
            hr_name: "Dana".to_string(),
            hr_email: "dana@initech.example".to_string(),
        };
        store.create_company(&mut company).expect("company");
        company
    }

    fn seed_student(store: &Store, id: &str, branch: &str, cgpa: f64, placed: bool) {
        store
            .add_student(&Student {
                id: id.to_string(),
                name: format!("Student {id}"),
                email: format!("{id}@campus.example"),
                phone: "999".to_string(),
                branch: branch.to_string(),
                cgpa,
                placed,
            })
            .expect("student");
    }

    fn drive_request(company_id: &str) -> DriveRequest {
        DriveRequest {
            company_id: company_id.to_string(),
            drive_type: "full-time".to_string(),
            location: "Remote".to_string(),
            deadline: "2026-09-15T17:00:00Z".to_string(),
            min_cgpa: 7.0,
            allowed_branches: "CSE,ECE".to_string(),
            qualifications: String::new(),
            job_description: String::new(),
            roles: vec![RoleRequest {
                title: "Backend Engineer".to_string(),
                salary_low: 1_200_000,
                salary_high: 1_800_000,
                stipend_low: 0,
                stipend_high: 0,
            }],
        }
    }

    #[test]
    fn missing_company_is_not_found() {
        let store = test_store();
        let err = store.company("c_missing").expect_err("missing company");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn company_listing_paginates_and_filters() {
        let store = test_store();
        for index in 0..(PAGE_SIZE + 2) {
            let mut company = Company {
                id: String::new(),
                name: format!("Vendor {index:02}"),
                industry: String::new(),
                website: String::new(),
                overview: String::new(),
                hr_name: String::new(),
                hr_email: String::new(),
            };
            store.create_company(&mut company).expect("company");
        }

        let first = store.companies(0, "").expect("page 0");
        assert_eq!(first.len() as i64, PAGE_SIZE);
        let second = store.companies(1, "").expect("page 1");
        assert_eq!(second.len(), 2);

        let filtered = store.companies(0, "Vendor 03").expect("filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Vendor 03");
    }

    #[test]
    fn student_company_listing_hides_hr_contacts() {
        let store = test_store();
        seed_company(&store);
        let listing = store.companies_for_students(0, "").expect("listing");
        assert_eq!(listing.len(), 1);
        let json = serde_json::to_value(&listing[0]).expect("json");
        assert!(json.get("hr_email").is_none());
    }

    #[test]
    fn mailing_list_filters_branch_cgpa_and_placement() {
        let store = test_store();
        seed_student(&store, "s1", "CSE", 8.2, false);
        seed_student(&store, "s2", "CSE", 6.0, false);
        seed_student(&store, "s3", "ME", 9.0, false);
        seed_student(&store, "s4", "ECE", 7.5, true);
        seed_student(&store, "s5", "ECE", 7.5, false);

        let list = store
            .mailing_list(&["CSE".to_string(), "ECE".to_string()], 7.0)
            .expect("mailing list");

        assert_eq!(list, ["s1@campus.example", "s5@campus.example"]);
    }

    #[test]
    fn drive_round_trip_includes_roles_and_company_name() {
        let store = test_store();
        let company = seed_company(&store);
        let drive_id = store.create_drive(&drive_request(&company.id)).expect("drive");

        let detail = store.drive(&drive_id).expect("detail");
        assert_eq!(detail.drive.company_name, "Initech");
        assert_eq!(detail.drive.allowed_branches, ["CSE", "ECE"]);
        assert_eq!(detail.roles.len(), 1);
        assert_eq!(detail.roles[0].title, "Backend Engineer");

        store.delete_drive(&drive_id).expect("delete");
        let err = store.drive(&drive_id).expect_err("deleted drive");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = store.delete_drive(&drive_id).expect_err("double delete");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_application_conflicts() {
        let store = test_store();
        let company = seed_company(&store);
        let drive_id = store.create_drive(&drive_request(&company.id)).expect("drive");
        let role_id = store.drive(&drive_id).expect("detail").roles[0].id.clone();
        seed_student(&store, "s1", "CSE", 8.0, false);

        let mut application = Application {
            id: String::new(),
            student_id: "s1".to_string(),
            drive_id: drive_id.clone(),
            role_id: role_id.clone(),
            applied_at: String::new(),
        };
        store.apply(&mut application).expect("first application");
        assert!(!application.id.is_empty());

        let applied = store
            .applied_role("s1", &drive_id)
            .expect("applied role")
            .expect("some role");
        assert_eq!(applied.id, role_id);

        let mut duplicate = Application {
            id: String::new(),
            student_id: "s1".to_string(),
            drive_id,
            role_id,
            applied_at: String::new(),
        };
        let err = store.apply(&mut duplicate).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn application_against_unknown_role_is_not_found() {
        let store = test_store();
        seed_student(&store, "s1", "CSE", 8.0, false);
        let mut application = Application {
            id: String::new(),
            student_id: "s1".to_string(),
            drive_id: "d_missing".to_string(),
            role_id: "r_missing".to_string(),
            applied_at: String::new(),
        };
        let err = store.apply(&mut application).expect_err("unknown role");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn export_rows_coerce_floats_and_booleans_from_storage() {
        let store = test_store();
        let company = seed_company(&store);
        let drive_id = store.create_drive(&drive_request(&company.id)).expect("drive");
        let role_id = store.drive(&drive_id).expect("detail").roles[0].id.clone();
        seed_student(&store, "asha", "CSE", 8.765, true);
        let mut application = Application {
            id: String::new(),
            student_id: "asha".to_string(),
            drive_id: drive_id.clone(),
            role_id: role_id.clone(),
            applied_at: String::new(),
        };
        store.apply(&mut application).expect("apply");

        let selection = ColumnSelection::parse("name,cgpa,placed").expect("selection");
        let mut out = Vec::new();
        let written = store
            .with_applicant_rows(&role_id, &selection, &drive_id, |columns, rows| {
                assert_eq!(columns, ["name", "cgpa", "placed"]);
                write_csv(columns, rows, &mut out)
            })
            .expect("export");

        assert_eq!(written, 1);
        let text = String::from_utf8(out).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,cgpa,placed"));
        assert_eq!(lines.next(), Some("Student asha,8.77,true"));
    }

    #[test]
    fn export_rejects_empty_identifiers_before_querying() {
        let store = test_store();
        let selection = ColumnSelection::parse("name").expect("selection");
        let err = store
            .with_applicant_rows("", &selection, "d_1", |_, _| Ok(()))
            .expect_err("missing role id");
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
        let err = store
            .with_applicant_rows("r_1", &selection, "", |_, _| Ok(()))
            .expect_err("missing drive id");
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
    }

    #[test]
    fn outbox_queue_list_and_mark_sent() {
        let store = test_store();
        let id = store
            .queue_notice(
                &["a@campus.example".to_string(), "b@campus.example".to_string()],
                "New drive: Initech",
                "Apply before the deadline.",
            )
            .expect("queue");

        let pending = store.outbox(false).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipients.len(), 2);
        assert!(!pending[0].sent);

        store.mark_sent(id).expect("mark sent");
        assert!(store.outbox(false).expect("pending").is_empty());
        assert_eq!(store.outbox(true).expect("all").len(), 1);

        let err = store.mark_sent(9999).expect_err("missing entry");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
