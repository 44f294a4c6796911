//! Purpose: Stream heterogeneous result-set rows to a CSV sink, one row at a time.
//! Exports: `RowSource`, `write_csv`.
//! Role: Core of the applicant export; the HTTP layer only wires sinks and sources.
//! Invariants: At most one row is buffered; the full result set is never materialized.
//! Invariants: Every row's cell count must equal the column set length.
//! Invariants: Any mid-stream failure aborts the whole export with the underlying error.

use std::io;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::CellValue;

/// Forward-only, single-pass row cursor. `next_row` yields `Ok(None)` on clean
/// end-of-data and an error when the cursor faults mid-iteration.
pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, Error>;
}

/// Write one header record (the column set, in order) followed by one record
/// per row to `out`, coercing each cell through `CellValue::to_field`.
///
/// Each record is flushed as it is written, so the sink observes the export
/// incrementally and a later fault leaves exactly the already-written records
/// behind. Returns the number of data records written.
pub fn write_csv<W: io::Write>(
    columns: &[String],
    rows: &mut dyn RowSource,
    out: &mut W,
) -> Result<u64, Error> {
    let mut writer = csv::Writer::from_writer(out);

    writer
        .write_record(columns)
        .map_err(|err| write_error("failed to write export header record", err))?;
    writer
        .flush()
        .map_err(|err| write_error("failed to flush export header record", err))?;

    let mut written = 0u64;
    while let Some(cells) = rows.next_row()? {
        if cells.len() != columns.len() {
            return Err(Error::new(ErrorKind::Internal).with_message(format!(
                "row has {} cells, column set has {}",
                cells.len(),
                columns.len()
            )));
        }
        writer
            .write_record(cells.iter().map(CellValue::to_field))
            .map_err(|err| {
                write_error(format!("failed to write export record {}", written + 1), err)
            })?;
        writer.flush().map_err(|err| {
            write_error(format!("failed to flush export record {}", written + 1), err)
        })?;
        written += 1;
    }

    Ok(written)
}

fn write_error(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    Error::new(ErrorKind::Write)
        .with_message(message)
        .with_source(source)
}

#[cfg(test)]
mod tests {
    use super::{write_csv, RowSource};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::value::CellValue;

    struct FakeRows {
        rows: Vec<Vec<CellValue>>,
        fail_at: Option<usize>,
        reads: usize,
    }

    impl FakeRows {
        fn new(rows: Vec<Vec<CellValue>>) -> Self {
            Self {
                rows,
                fail_at: None,
                reads: 0,
            }
        }

        fn failing_at(rows: Vec<Vec<CellValue>>, fail_at: usize) -> Self {
            Self {
                rows,
                fail_at: Some(fail_at),
                reads: 0,
            }
        }
    }

    impl RowSource for FakeRows {
        fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, Error> {
            self.reads += 1;
            if self.fail_at == Some(self.reads) {
                return Err(Error::new(ErrorKind::Iteration)
                    .with_message("cursor faulted mid-iteration"));
            }
            Ok(self.rows.get(self.reads - 1).cloned())
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn parse_records(raw: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(raw);
        reader
            .records()
            .map(|record| {
                record
                    .expect("parse record")
                    .iter()
                    .map(|field| field.to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn export_emits_header_then_one_record_per_row() {
        let columns = columns(&["name", "branch", "cgpa"]);
        let mut rows = FakeRows::new(vec![
            vec![
                CellValue::Text("Asha".to_string()),
                CellValue::Text("CSE".to_string()),
                CellValue::Float(8.1),
            ],
            vec![
                CellValue::Text("Ravi".to_string()),
                CellValue::Text("ECE".to_string()),
                CellValue::Float(7.4),
            ],
        ]);
        let mut out = Vec::new();

        let written = write_csv(&columns, &mut rows, &mut out).expect("export");

        assert_eq!(written, 2);
        let records = parse_records(&out);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], ["name", "branch", "cgpa"]);
        for record in &records {
            assert_eq!(record.len(), columns.len());
        }
    }

    #[test]
    fn coercion_scenario_matches_expected_fields() {
        let columns = columns(&["name", "cgpa", "placed"]);
        let mut rows = FakeRows::new(vec![vec![
            CellValue::Text("Asha".to_string()),
            CellValue::Float(8.765),
            CellValue::Bool(true),
        ]]);
        let mut out = Vec::new();

        write_csv(&columns, &mut rows, &mut out).expect("export");

        let text = String::from_utf8(out).expect("utf8 output");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,cgpa,placed"));
        assert_eq!(lines.next(), Some("Asha,8.77,true"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn null_and_bytes_cells_coerce_in_place() {
        let columns = columns(&["email", "resume", "rank"]);
        let mut rows = FakeRows::new(vec![vec![
            CellValue::Null,
            CellValue::Bytes(vec![0x41, 0x42]),
            CellValue::Int(42),
        ]]);
        let mut out = Vec::new();

        write_csv(&columns, &mut rows, &mut out).expect("export");

        let records = parse_records(&out);
        assert_eq!(records[1], ["", "AB", "42"]);
    }

    #[test]
    fn empty_result_set_still_writes_the_header() {
        let columns = columns(&["name"]);
        let mut rows = FakeRows::new(Vec::new());
        let mut out = Vec::new();

        let written = write_csv(&columns, &mut rows, &mut out).expect("export");

        assert_eq!(written, 0);
        assert_eq!(parse_records(&out), vec![vec!["name".to_string()]]);
    }

    #[test]
    fn cursor_fault_truncates_after_already_written_rows() {
        let columns = columns(&["name"]);
        let rows: Vec<Vec<CellValue>> = (1..=5)
            .map(|n| vec![CellValue::Text(format!("student-{n}"))])
            .collect();
        let mut rows = FakeRows::failing_at(rows, 3);
        let mut out = Vec::new();

        let err = write_csv(&columns, &mut rows, &mut out).expect_err("cursor fault");

        assert_eq!(err.kind(), ErrorKind::Iteration);
        // The fault hit on the third read; no further rows were pulled.
        assert_eq!(rows.reads, 3);
        let records = parse_records(&out);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], ["name"]);
        assert_eq!(records[1], ["student-1"]);
        assert_eq!(records[2], ["student-2"]);
    }

    #[test]
    fn cell_count_mismatch_is_an_error_not_a_truncation() {
        let columns = columns(&["name", "cgpa"]);
        let mut rows = FakeRows::new(vec![vec![CellValue::Text("Asha".to_string())]]);
        let mut out = Vec::new();

        let err = write_csv(&columns, &mut rows, &mut out).expect_err("cell count breach");

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(parse_records(&out).len(), 1);
    }

    #[test]
    fn embedded_delimiters_are_quoted() {
        let columns = columns(&["name", "note"]);
        let mut rows = FakeRows::new(vec![vec![
            CellValue::Text("Asha, Jr.".to_string()),
            CellValue::Text("line one\nline two".to_string()),
        ]]);
        let mut out = Vec::new();

        write_csv(&columns, &mut rows, &mut out).expect("export");

        let records = parse_records(&out);
        assert_eq!(records[1], ["Asha, Jr.", "line one\nline two"]);
    }

    struct FailingWriter {
        budget: usize,
    }

    impl std::io::Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.len() > self.budget {
                return Err(std::io::Error::other("sink rejected write"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn header_write_failure_aborts_before_any_row_is_read() {
        let columns = columns(&["name"]);
        let mut rows = FakeRows::new(vec![vec![CellValue::Text("Asha".to_string())]]);
        let mut sink = FailingWriter { budget: 0 };

        let err = write_csv(&columns, &mut rows, &mut sink).expect_err("header write fails");

        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(rows.reads, 0);
    }

    #[test]
    fn row_write_failure_aborts_the_export() {
        let columns = columns(&["name"]);
        let mut rows = FakeRows::new(vec![
            vec![CellValue::Text("Asha".to_string())],
            vec![CellValue::Text("Ravi".to_string())],
        ]);
        // Enough budget for the header record only.
        let mut sink = FailingWriter { budget: 5 };

        let err = write_csv(&columns, &mut rows, &mut sink).expect_err("row write fails");

        assert_eq!(err.kind(), ErrorKind::Write);
    }
}
