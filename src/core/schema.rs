//! Purpose: Embedded SQLite schema for the portal database.
//! Exports: `init_schema`.
//! Role: Idempotent bootstrap run by `placementd init-db` and the test suite.
//! Invariants: Statements are `IF NOT EXISTS`; re-running is always safe.

use rusqlite::Connection;

use crate::core::error::{Error, ErrorKind};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS companies (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    industry    TEXT NOT NULL DEFAULT '',
    website     TEXT NOT NULL DEFAULT '',
    overview    TEXT NOT NULL DEFAULT '',
    hr_name     TEXT NOT NULL DEFAULT '',
    hr_email    TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS students (
    id      TEXT PRIMARY KEY,
    name    TEXT NOT NULL,
    email   TEXT NOT NULL UNIQUE,
    phone   TEXT NOT NULL DEFAULT '',
    branch  TEXT NOT NULL,
    cgpa    REAL NOT NULL DEFAULT 0,
    placed  BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS drives (
    id               TEXT PRIMARY KEY,
    company_id       TEXT NOT NULL REFERENCES companies(id),
    drive_type       TEXT NOT NULL,
    location         TEXT NOT NULL DEFAULT '',
    deadline         TEXT NOT NULL,
    min_cgpa         REAL NOT NULL DEFAULT 0,
    allowed_branches TEXT NOT NULL DEFAULT '',
    qualifications   TEXT NOT NULL DEFAULT '',
    job_description  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS roles (
    id           TEXT PRIMARY KEY,
    drive_id     TEXT NOT NULL REFERENCES drives(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    salary_low   INTEGER NOT NULL DEFAULT 0,
    salary_high  INTEGER NOT NULL DEFAULT 0,
    stipend_low  INTEGER NOT NULL DEFAULT 0,
    stipend_high INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS applications (
    id         TEXT PRIMARY KEY,
    student_id TEXT NOT NULL REFERENCES students(id),
    drive_id   TEXT NOT NULL REFERENCES drives(id) ON DELETE CASCADE,
    role_id    TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    applied_at TEXT NOT NULL,
    UNIQUE (student_id, drive_id)
);

CREATE TABLE IF NOT EXISTS outbox (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    recipients TEXT NOT NULL,
    subject    TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    sent       BOOLEAN NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_applications_role
    ON applications(role_id, drive_id);
";

pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA).map_err(|err| {
        Error::new(ErrorKind::Query)
            .with_message("failed to initialize schema")
            .with_source(err)
    })
}
