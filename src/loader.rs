use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::debug;

use crate::error::{GradeError, Result};

/// Joins a subject header and its component header into one column name.
pub const COLUMN_SEPARATOR: &str = " – ";

/// Header cell that marks the first header row and the leading column.
pub const ANCHOR: &str = "SR.No.";

/// A flattened sheet: one name per column, one map per data row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub anchor: String,
    pub columns: Vec<String>,
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based line in the source file.
    pub line: usize,
    pub cells: BTreeMap<String, String>,
}

impl SheetRow {
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Reads a marks sheet from a CSV file or from the first worksheet of a workbook.
pub fn load_sheet(path: &Path) -> Result<Sheet> {
    let bytes = std::fs::read(path).map_err(|err| {
        GradeError::load_with(format!("cannot read {}", path.display()), err)
    })?;
    let workbook_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)));
    if workbook_extension || bytes.starts_with(b"PK\x03\x04") {
        return read_workbook(path, bytes);
    }
    read_sheet(bytes.as_slice())
}

fn read_workbook(path: &Path, bytes: Vec<u8>) -> Result<Sheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|err| {
        GradeError::load(format!("cannot open workbook {}: {err}", path.display()))
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| GradeError::load(format!("{} has no worksheets", path.display())))?
        .map_err(|err| {
            GradeError::load(format!("cannot read first worksheet of {}: {err}", path.display()))
        })?;
    debug!(sheet = %path.display(), "reading first worksheet");
    sheet_from_records(records_from_range(&range))
}

/// Cell text of a worksheet, trimmed, with rows above the used range kept as blanks
/// so line numbers match the workbook's row numbers.
fn records_from_range(range: &Range<Data>) -> Vec<Vec<String>> {
    let (first_row, first_column) = range.start().unwrap_or((0, 0));
    let leading: Vec<Vec<String>> = vec![Vec::new(); first_row as usize];
    let padding = vec![String::new(); first_column as usize];
    leading
        .into_iter()
        .chain(range.rows().map(|row| {
            padding
                .iter()
                .cloned()
                .chain(row.iter().map(|cell| cell.to_string().trim().to_string()))
                .collect::<Vec<String>>()
        }))
        .collect()
}

pub fn read_sheet<R: Read>(reader: R) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result
            .map_err(|err| GradeError::load_with(format!("malformed row {}", index + 1), err))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    sheet_from_records(records)
}

/// Locates the two-row header in raw rows and flattens it into column names.
fn sheet_from_records(records: Vec<Vec<String>>) -> Result<Sheet> {
    let (header_index, anchor_column) = records
        .iter()
        .enumerate()
        .find_map(|(row, cells)| {
            cells
                .iter()
                .position(|cell| is_anchor(cell))
                .map(|column| (row, column))
        })
        .ok_or_else(|| GradeError::schema(format!("no `{ANCHOR}` header cell found")))?;

    let subjects = &records[header_index];
    let components = records.get(header_index + 1).ok_or_else(|| {
        GradeError::load(format!(
            "header row {} has no second header row below it",
            header_index + 1
        ))
    })?;

    let width = records[header_index..]
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    let mut names: Vec<(usize, String)> = Vec::new();
    let mut seen = HashSet::new();
    let mut current_subject = String::new();
    for column in anchor_column..width {
        let top = cell(subjects, column);
        let bottom = cell(components, column);
        let name = match (top.is_empty(), bottom.is_empty()) {
            (true, true) => {
                debug!(column, "dropping column with empty header");
                continue;
            }
            (false, true) => {
                // identity columns end any merged subject to their left
                current_subject.clear();
                top.to_string()
            }
            (false, false) => {
                current_subject = top.to_string();
                format!("{current_subject}{COLUMN_SEPARATOR}{bottom}")
            }
            (true, false) if current_subject.is_empty() => {
                return Err(GradeError::schema(format!(
                    "component `{bottom}` in column {} has no subject above it",
                    column + 1
                )));
            }
            (true, false) => format!("{current_subject}{COLUMN_SEPARATOR}{bottom}"),
        };
        if !seen.insert(name.clone()) {
            return Err(GradeError::schema(format!("duplicate column `{name}`")));
        }
        names.push((column, name));
    }

    let anchor = names
        .first()
        .map(|(_, name)| name.clone())
        .ok_or_else(|| GradeError::schema("anchor column has no name"))?;

    let rows = records
        .iter()
        .enumerate()
        .skip(header_index + 2)
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .map(|(index, cells)| SheetRow {
            line: index + 1,
            cells: names
                .iter()
                .map(|(column, name)| (name.clone(), cell(cells, *column).to_string()))
                .collect(),
        })
        .collect::<Vec<_>>();

    debug!(columns = names.len(), rows = rows.len(), "sheet loaded");

    Ok(Sheet {
        anchor,
        columns: names.into_iter().map(|(_, name)| name).collect(),
        rows,
    })
}

fn cell(cells: &[String], column: usize) -> &str {
    cells.get(column).map(String::as_str).unwrap_or("")
}

/// Header text reduced to upper-case letters and digits.
pub fn header_key(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

pub fn is_anchor(text: &str) -> bool {
    header_key(text) == header_key(ANCHOR)
}
