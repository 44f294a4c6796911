//! Purpose: Model dynamically typed result-set cells and their text coercion.
//! Exports: `CellValue`.
//! Role: Closed value universe between the SQLite driver and the CSV exporter.
//! Invariants: The variant set is closed; coercion is exhaustive and total.
//! Invariants: Coercion never fails; unknown driver types land in `Other`.

use std::borrow::Cow;

use rusqlite::types::ValueRef;

/// A single result-set cell. Every value read out of the store is reduced to
/// one of these variants before it reaches the exporter, so the coercion
/// below stays an exhaustive match rather than an open-ended type switch.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Null,
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Other(String),
}

impl CellValue {
    /// Coerce the cell to its CSV field representation.
    ///
    /// Fixed dispatch, first match wins: null becomes the empty field, bytes
    /// pass through raw, text is unchanged, integers print base-10, floats
    /// print with exactly two fraction digits, booleans print `true`/`false`,
    /// and anything else already carries its best-effort text form.
    pub fn to_field(&self) -> Cow<'_, [u8]> {
        match self {
            CellValue::Null => Cow::Borrowed(&b""[..]),
            CellValue::Bytes(bytes) => Cow::Borrowed(bytes.as_slice()),
            CellValue::Text(text) => Cow::Borrowed(text.as_bytes()),
            CellValue::Int(value) => Cow::Owned(value.to_string().into_bytes()),
            CellValue::Float(value) => Cow::Owned(format!("{value:.2}").into_bytes()),
            CellValue::Bool(value) => {
                Cow::Borrowed(if *value { &b"true"[..] } else { &b"false"[..] })
            }
            CellValue::Other(text) => Cow::Borrowed(text.as_bytes()),
        }
    }

    /// Classify a raw SQLite value. SQLite has no boolean storage class, so
    /// an integer 0/1 in a column declared boolean-ish is surfaced as `Bool`.
    pub fn from_sqlite(value: ValueRef<'_>, decl_type: Option<&str>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(raw) => {
                if decl_is_boolean(decl_type) && (raw == 0 || raw == 1) {
                    CellValue::Bool(raw == 1)
                } else {
                    CellValue::Int(raw)
                }
            }
            ValueRef::Real(raw) => CellValue::Float(raw),
            ValueRef::Text(raw) => match std::str::from_utf8(raw) {
                Ok(text) => CellValue::Text(text.to_string()),
                Err(_) => CellValue::Bytes(raw.to_vec()),
            },
            ValueRef::Blob(raw) => CellValue::Bytes(raw.to_vec()),
        }
    }
}

fn decl_is_boolean(decl_type: Option<&str>) -> bool {
    decl_type.is_some_and(|decl| {
        let decl = decl.trim();
        decl.eq_ignore_ascii_case("boolean") || decl.eq_ignore_ascii_case("bool")
    })
}
