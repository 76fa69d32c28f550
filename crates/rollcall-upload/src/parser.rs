use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UploadError};

/// One row of the access-control CSV export, keyed for the collector.
///
/// The export's "Last Name" column carries the guardian phone number, so it
/// lands in `phone`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvAttendanceRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_status: Option<String>,
}

const PERSON_ID: &str = "Person ID";
const FIRST_NAME: &str = "First Name";
const LAST_NAME: &str = "Last Name";
const DEPARTMENT: &str = "Department";
const MASK: &str = "Mask";
const ACCESS_DATE: &str = "Access Date";
const SWIPE_TIME: &str = "Card Swiping Time";
const STATUS: &str = "Attendance Status";

/// Column positions of the known headers.
struct Columns {
    person_code: Option<usize>,
    full_name: Option<usize>,
    phone: Option<usize>,
    department: Option<usize>,
    mask: Option<usize>,
    attendance_date: Option<usize>,
    attendance_time: Option<usize>,
    attendance_status: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Self {
        let names: Vec<&str> = headers.iter().map(normalize_header).collect();
        let find = |wanted: &str| names.iter().position(|n| *n == wanted);
        Self {
            person_code: find(PERSON_ID),
            full_name: find(FIRST_NAME),
            phone: find(LAST_NAME),
            department: find(DEPARTMENT),
            mask: find(MASK),
            attendance_date: find(ACCESS_DATE),
            attendance_time: find(SWIPE_TIME),
            attendance_status: find(STATUS),
        }
    }

    fn row(&self, record: &StringRecord) -> CsvAttendanceRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        CsvAttendanceRow {
            person_code: cell(self.person_code),
            full_name: cell(self.full_name),
            phone: cell(self.phone),
            department: cell(self.department),
            mask: cell(self.mask),
            attendance_date: cell(self.attendance_date),
            attendance_time: cell(self.attendance_time),
            attendance_status: cell(self.attendance_status),
        }
    }
}

/// Exports sometimes prefix header names with a tab (or a BOM on the first
/// one); both spellings name the same column.
fn normalize_header(name: &str) -> &str {
    name.trim_start_matches('\u{feff}').trim()
}

/// Parse CSV text with a header row. Unknown columns are ignored and rows
/// with no non-empty cell are skipped.
pub fn parse_csv(input: &[u8]) -> std::result::Result<Vec<CsvAttendanceRow>, csv::Error> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(input);
    let columns = Columns::locate(reader.headers()?);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(columns.row(&record));
    }
    Ok(rows)
}

/// Read and parse the export at `path`.
pub async fn parse_csv_file(path: &Path) -> Result<Vec<CsvAttendanceRow>> {
    let parse_failed = |source| UploadError::ParseFailed {
        path: path.to_path_buf(),
        source,
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| parse_failed(csv::Error::from(e)))?;
    let rows = parse_csv(&bytes).map_err(parse_failed)?;
    debug!(file = %path.display(), rows = rows.len(), "CSV parsed");
    Ok(rows)
}
