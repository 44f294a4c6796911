//! Purpose: Domain models for companies, drives, roles, and applications.
//! Exports: Model structs, `ColumnSelection`, `APPLICANT_COLUMNS`, `new_id`.
//! Role: Serde-facing shapes shared by the store, the HTTP layer, and tests.
//! Invariants: Export column selection is allowlist-checked before any SQL runs.
//! Invariants: Deadlines are RFC 3339 on the wire and in storage.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub hr_name: String,
    #[serde(default)]
    pub hr_email: String,
}

/// Student-visible projection of a company. HR contact details stay private.
#[derive(Clone, Debug, Serialize)]
pub struct CompanyPublic {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub website: String,
    pub overview: String,
}

impl From<Company> for CompanyPublic {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            name: company.name,
            industry: company.industry,
            website: company.website,
            overview: company.overview,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Role {
    pub id: String,
    pub drive_id: String,
    pub title: String,
    pub salary_low: i64,
    pub salary_high: i64,
    pub stipend_low: i64,
    pub stipend_high: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Drive {
    pub id: String,
    pub company_id: String,
    pub company_name: String,
    pub drive_type: String,
    pub location: String,
    pub deadline: String,
    pub min_cgpa: f64,
    pub allowed_branches: Vec<String>,
    pub qualifications: String,
    pub job_description: String,
}

/// Drive detail as served to a student: the drive, its roles, and the role
/// the student applied to, when they did.
#[derive(Clone, Debug, Serialize)]
pub struct DriveDetail {
    #[serde(flatten)]
    pub drive: Drive,
    pub roles: Vec<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_role: Option<Role>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleRequest {
    pub title: String,
    #[serde(default)]
    pub salary_low: i64,
    #[serde(default)]
    pub salary_high: i64,
    #[serde(default)]
    pub stipend_low: i64,
    #[serde(default)]
    pub stipend_high: i64,
}

/// Inbound body for drive creation. `allowed_branches` arrives as a single
/// comma-separated string, matching the admin console's form encoding.
#[derive(Clone, Debug, Deserialize)]
pub struct DriveRequest {
    pub company_id: String,
    pub drive_type: String,
    #[serde(default)]
    pub location: String,
    pub deadline: String,
    pub min_cgpa: f64,
    pub allowed_branches: String,
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub job_description: String,
    pub roles: Vec<RoleRequest>,
}

impl DriveRequest {
    pub fn branches(&self) -> Vec<String> {
        self.allowed_branches
            .split(',')
            .map(|branch| branch.trim().to_string())
            .filter(|branch| !branch.is_empty())
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub drive_id: String,
    pub role_id: String,
    #[serde(default)]
    pub applied_at: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub branch: String,
    pub cgpa: f64,
    pub placed: bool,
}

/// Columns a caller may request in the applicant export, mapped to the SQL
/// expression that produces them. The selector is matched against this table
/// before any query text is assembled.
pub const APPLICANT_COLUMNS: &[(&str, &str)] = &[
    ("name", "s.name"),
    ("email", "s.email"),
    ("phone", "s.phone"),
    ("branch", "s.branch"),
    ("cgpa", "s.cgpa"),
    ("placed", "s.placed"),
    ("role", "r.title"),
    ("applied_at", "a.applied_at"),
];

/// A validated, order-preserving applicant-export column selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSelection {
    columns: Vec<String>,
}

impl ColumnSelection {
    /// Parse a comma-separated selector. Order is significant and preserved.
    pub fn parse(selector: &str) -> Result<Self, Error> {
        let columns: Vec<String> = selector
            .split(',')
            .map(|column| column.trim().to_string())
            .filter(|column| !column.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(Error::new(ErrorKind::MissingParameter)
                .with_message("required_data selects no columns")
                .with_hint("Provide a comma-separated list like name,email,cgpa."));
        }
        for column in &columns {
            if !APPLICANT_COLUMNS
                .iter()
                .any(|(name, _)| name == column)
            {
                let known = APPLICANT_COLUMNS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown export column {column:?}"))
                    .with_hint(format!("Known columns: {known}.")));
            }
        }
        Ok(Self { columns })
    }

    pub fn names(&self) -> &[String] {
        &self.columns
    }

    /// SQL select list for the validated columns, aliased back to their
    /// public names so the result-set header matches the selector.
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                let expr = APPLICANT_COLUMNS
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, expr)| *expr)
                    .unwrap_or("NULL");
                format!("{expr} AS {column}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Random identifier with a short type prefix, e.g. `d_9f2c41a87be03d16`.
pub fn new_id(prefix: &str) -> Result<String, Error> {
    let mut raw = [0u8; 8];
    getrandom::getrandom(&mut raw).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to generate identifier")
            .with_source(err)
    })?;
    let mut id = String::with_capacity(prefix.len() + 1 + raw.len() * 2);
    id.push_str(prefix);
    id.push('_');
    for byte in raw {
        id.push_str(&format!("{byte:02x}"));
    }
    Ok(id)
}

/// Parse an RFC 3339 deadline from a request body.
pub fn parse_deadline(raw: &str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid deadline {raw:?}"))
            .with_hint("Use RFC 3339, e.g. 2026-09-15T17:00:00Z.")
            .with_source(err)
    })
}

/// Human-readable deadline used in notification bodies, e.g.
/// `05:00 PM 15/09/2026`.
pub fn format_deadline(deadline: OffsetDateTime) -> String {
    let format = format_description!("[hour repr:12]:[minute] [period] [day]/[month]/[year]");
    deadline
        .format(&format)
        .unwrap_or_else(|_| deadline.to_string())
}
