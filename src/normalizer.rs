use crate::error::{HuntOddsError, Result};
use crate::models::{
    HuntRecord, BAG, HUNT_CODE, N_LICENSES, R_1ST, R_2ND, R_3RD, R_TOT, UNIT_DESCRIPTION,
};
use crate::odds;
use calamine::{Data, Range, Reader};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static HUNT_CODE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}-\d-\d+$").expect("hunt code pattern is valid"));

/// Where things live in a report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLayout {
    /// Index of the row holding the real column names.
    pub header_row: usize,
    /// Columns at or beyond this index are ignored.
    pub column_limit: usize,
    /// Positions of r1st, r2nd, r3rd and rTot, independent of their labels.
    pub applicant_columns: [usize; 4],
    /// Header text that multi-page reports repeat inside the body.
    pub repeated_header_marker: String,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            header_row: 5,
            column_limit: 12,
            applicant_columns: [8, 9, 10, 11],
            repeated_header_marker: "Hunt Code".to_string(),
        }
    }
}

impl ReportLayout {
    /// Layout of a snapshot written by this crate, so it can be fed back
    /// through [`normalize`].
    pub fn snapshot() -> Self {
        Self {
            header_row: 0,
            column_limit: 8,
            applicant_columns: [4, 5, 6, 7],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(col) = self
            .applicant_columns
            .iter()
            .find(|&&col| col >= self.column_limit)
        {
            return Err(HuntOddsError::Config(format!(
                "applicant column {} is beyond the column limit {}",
                col, self.column_limit
            )));
        }
        Ok(())
    }
}

/// An untyped report: every row as read, header rows included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Reads a report from disk. Spreadsheet extensions go through
    /// [`RawTable::from_workbook`], anything else is read as CSV.
    pub fn from_path(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let table = if is_workbook(path) {
            let bytes = fs::read(path).map_err(|e| HuntOddsError::from_io(e, path))?;
            Self::from_workbook(Cursor::new(bytes))?
        } else {
            let file = File::open(path).map_err(|e| HuntOddsError::from_io(e, path))?;
            Self::from_reader(file)?
        };
        debug!(path = %path.display(), rows = table.rows.len(), "read raw report");
        Ok(table)
    }

    /// Reads the first sheet of an xlsx/xls/ods workbook. Rows and columns
    /// before the sheet's used range are padded with empty cells so that
    /// layout indices count from A1.
    pub fn from_workbook<RS: Read + Seek + Clone>(reader: RS) -> Result<Self> {
        let mut workbook = calamine::open_workbook_auto_from_rs(reader)
            .map_err(|e| HuntOddsError::Workbook(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| HuntOddsError::Workbook("workbook has no sheets".to_string()))?
            .map_err(|e| HuntOddsError::Workbook(e.to_string()))?;
        Ok(Self {
            rows: sheet_rows(&range),
        })
    }

    /// Reads CSV without treating any row as a header. Ragged rows are kept
    /// as-is and non-UTF-8 bytes are replaced.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.byte_records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            );
        }
        Ok(Self { rows })
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "xlsx" | "xlsm" | "xlsb" | "xls" | "ods"
            )
        })
        .unwrap_or(false)
}

fn sheet_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let mut rows = vec![Vec::new(); first_row as usize];
    for cells in range.rows() {
        let mut row = vec![String::new(); first_col as usize];
        row.extend(cells.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        }));
        rows.push(row);
    }
    rows
}

/// Column index of every canonical field.
struct ColumnMap {
    hunt_code: usize,
    unit_description: usize,
    bag: usize,
    n_licenses: usize,
    r1st: usize,
    r2nd: usize,
    r3rd: usize,
    r_tot: usize,
}

impl ColumnMap {
    fn resolve(header: &[String], layout: &ReportLayout) -> Result<Self> {
        let width = header.len().min(layout.column_limit);
        let mut labels: Vec<Option<&'static str>> = header[..width]
            .iter()
            .map(|label| canonical_label(label.trim()))
            .collect();

        let positional = [R_1ST, R_2ND, R_3RD, R_TOT];
        for (&col, name) in layout.applicant_columns.iter().zip(positional) {
            if col < width {
                labels[col] = Some(name);
            }
        }

        let find = |name: &str| {
            labels
                .iter()
                .position(|label| *label == Some(name))
                .ok_or_else(|| HuntOddsError::SchemaMismatch {
                    column: name.to_string(),
                })
        };

        Ok(Self {
            hunt_code: find(HUNT_CODE)?,
            unit_description: find(UNIT_DESCRIPTION)?,
            bag: find(BAG)?,
            n_licenses: find(N_LICENSES)?,
            r1st: find(R_1ST)?,
            r2nd: find(R_2ND)?,
            r3rd: find(R_3RD)?,
            r_tot: find(R_TOT)?,
        })
    }
}

fn canonical_label(label: &str) -> Option<&'static str> {
    match label {
        "Hunt Code" | HUNT_CODE => Some(HUNT_CODE),
        "Unit/Description" | UNIT_DESCRIPTION => Some(UNIT_DESCRIPTION),
        "Bag" | BAG => Some(BAG),
        "Licenses" | N_LICENSES => Some(N_LICENSES),
        _ => None,
    }
}

/// A cell that holds something other than whitespace.
fn present(row: &[String], col: usize) -> Option<&str> {
    row.get(col).map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Parses an applicant or license count. Blank cells count as zero;
/// thousands separators and integral floats ("12.0") are accepted.
fn parse_count(row: &[String], col: usize, column: &str, row_number: usize) -> Result<u32> {
    let Some(raw) = present(row, col) else {
        return Ok(0);
    };
    let cleaned = raw.trim().replace(',', "");
    if let Ok(value) = cleaned.parse::<u32>() {
        return Ok(value);
    }
    match cleaned.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value.fract() == 0.0
                && value <= f64::from(u32::MAX) =>
        {
            Ok(value as u32)
        }
        _ => Err(HuntOddsError::InvalidNumber {
            row: row_number,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Turns a raw report into typed records, in source order.
///
/// Rows up to and including `layout.header_row` are discarded, rows without a
/// hunt code or unit description are dropped, as are repeated header rows.
/// A zero applicant total is replaced by [`odds::ZERO_APPLICANT_SENTINEL`]
/// before `huntOdds` is computed. Any missing canonical column fails the whole
/// pass.
pub fn normalize(table: &RawTable, layout: &ReportLayout) -> Result<Vec<HuntRecord>> {
    let header = table
        .rows
        .get(layout.header_row)
        .ok_or(HuntOddsError::HeaderRowOutOfRange {
            index: layout.header_row,
            rows: table.rows.len(),
        })?;
    let columns = ColumnMap::resolve(header, layout)?;
    let marker = layout.repeated_header_marker.trim();

    let mut records = Vec::new();
    let mut incomplete = 0usize;
    let mut repeated_headers = 0usize;
    let mut zero_applicants = 0usize;

    for (index, row) in table.rows.iter().enumerate().skip(layout.header_row + 1) {
        let row_number = index + 1;

        let (Some(code), Some(description)) = (
            present(row, columns.hunt_code),
            present(row, columns.unit_description),
        ) else {
            debug!(row = row_number, "dropping row without hunt code or description");
            incomplete += 1;
            continue;
        };

        let hunt_code = code.trim();
        if hunt_code == marker {
            repeated_headers += 1;
            continue;
        }
        if !HUNT_CODE_SHAPE.is_match(hunt_code) {
            warn!(row = row_number, hunt_code, "hunt code does not look like SSS-W-NNN");
        }

        let n_licenses = parse_count(row, columns.n_licenses, N_LICENSES, row_number)?;
        let reported_total = parse_count(row, columns.r_tot, R_TOT, row_number)?;
        if reported_total == 0 {
            zero_applicants += 1;
        }
        let r_tot = odds::guard_applicants(reported_total);

        records.push(HuntRecord {
            hunt_code: hunt_code.to_string(),
            unit_description: description.to_string(),
            bag: row.get(columns.bag).cloned().unwrap_or_default(),
            n_licenses,
            r1st: parse_count(row, columns.r1st, R_1ST, row_number)?,
            r2nd: parse_count(row, columns.r2nd, R_2ND, row_number)?,
            r3rd: parse_count(row, columns.r3rd, R_3RD, row_number)?,
            r_tot,
            hunt_odds: odds::hunt_odds(n_licenses, r_tot)?,
        });
    }

    info!(
        records = records.len(),
        incomplete,
        repeated_headers,
        zero_applicants,
        "normalized report"
    );
    Ok(records)
}
