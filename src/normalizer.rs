use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use crate::config::MarkScheme;
use crate::error::{GradeError, Result};
use crate::loader::{header_key, Sheet, SheetRow, COLUMN_SEPARATOR};
use crate::models::{Component, Roster, StudentId, StudentRecord, SubjectMarks};

const NAME_HEADERS: [&str; 3] = ["NAME", "STUDENTNAME", "NAMEOFSTUDENT"];
const ROLL_HEADERS: [&str; 3] = ["ROLLNO", "ROLLNUMBER", "ROLL"];
const ABSENT_MARKERS: [&str; 6] = ["AB", "ABSENT", "-", "NA", "N/A", "--"];

#[derive(Debug)]
struct SubjectColumn {
    column: String,
    subject: String,
    component: Component,
}

/// Groups the flattened subject columns of a sheet into per-student marks.
pub fn normalize(sheet: &Sheet, scheme: &MarkScheme) -> Result<Roster> {
    let name_column = find_identity(sheet, &NAME_HEADERS)
        .ok_or_else(|| GradeError::schema("no `Name` column in the header"))?;
    let roll_column = find_identity(sheet, &ROLL_HEADERS);

    let identity = [Some(sheet.anchor.as_str()), Some(name_column), roll_column];

    let mut layout: BTreeMap<String, BTreeSet<Component>> = BTreeMap::new();
    let mut columns = Vec::new();
    for column in &sheet.columns {
        let Some((subject, label)) = column.split_once(COLUMN_SEPARATOR) else {
            if !identity.contains(&Some(column.as_str())) {
                debug!(column = %column, "ignoring non-subject column");
            }
            continue;
        };
        let component = Component::parse(label).ok_or_else(|| {
            GradeError::schema(format!(
                "unrecognized component `{label}` in column `{column}`; expected ISE, MSE, ESE or Practical"
            ))
        })?;
        let subject = subject.trim().to_string();
        if !layout.entry(subject.clone()).or_default().insert(component) {
            return Err(GradeError::schema(format!(
                "subject `{subject}` has more than one {component} column"
            )));
        }
        columns.push(SubjectColumn {
            column: column.clone(),
            subject,
            component,
        });
    }

    if columns.is_empty() {
        return Err(GradeError::schema(format!(
            "no subject columns shaped like `<Subject>{COLUMN_SEPARATOR}<Component>`"
        )));
    }

    let mut seen_ids = HashSet::new();
    let mut students = Vec::with_capacity(sheet.rows.len());
    for row in &sheet.rows {
        let raw_id = row.get(&sheet.anchor);
        if raw_id.is_empty() {
            return Err(GradeError::load(format!(
                "line {}: missing `{}` value",
                row.line, sheet.anchor
            )));
        }
        let id = StudentId::new(raw_id);
        if !seen_ids.insert(id.clone()) {
            return Err(GradeError::load(format!(
                "line {}: duplicate student id `{id}`",
                row.line
            )));
        }

        let mut subjects: BTreeMap<String, SubjectMarks> = BTreeMap::new();
        for column in &columns {
            let Some(mark) = parse_mark(row, column, scheme)? else {
                continue;
            };
            subjects
                .entry(column.subject.clone())
                .or_insert_with(|| SubjectMarks {
                    offered: layout[&column.subject].clone(),
                    marks: BTreeMap::new(),
                })
                .marks
                .insert(column.component, mark);
        }

        let roll_no = roll_column
            .map(|column| row.get(column))
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        students.push(StudentRecord {
            id,
            roll_no,
            name: row.get(name_column).to_string(),
            subjects,
        });
    }

    info!(
        students = students.len(),
        subjects = layout.len(),
        "sheet normalized"
    );

    Ok(Roster {
        subjects: layout,
        students,
    })
}

fn find_identity<'a>(sheet: &'a Sheet, accepted: &[&str]) -> Option<&'a str> {
    sheet
        .columns
        .iter()
        .filter(|column| !column.contains(COLUMN_SEPARATOR))
        .find(|column| accepted.contains(&header_key(column).as_str()))
        .map(String::as_str)
}

fn parse_mark(row: &SheetRow, column: &SubjectColumn, scheme: &MarkScheme) -> Result<Option<f64>> {
    let raw = row.get(&column.column);
    if raw.is_empty() || ABSENT_MARKERS.iter().any(|m| raw.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|_| {
        GradeError::load(format!(
            "line {}: `{}` is not a mark in column `{}`",
            row.line, raw, column.column
        ))
    })?;
    let max = scheme.max_mark(column.component);
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(GradeError::load(format!(
            "line {}: mark {} in column `{}` is outside 0..={}",
            row.line, raw, column.column, max
        )));
    }
    Ok(Some(value))
}
