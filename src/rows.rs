//! Row normalization.
//!
//! Spreadsheet and pasted rows arrive with whatever headers the author typed. This
//! pass folds header case and whitespace, maps known aliases onto canonical fields,
//! and renders scalar cells as trimmed strings so the resolver never sees raw
//! headers.

use serde_json::Value;
use std::collections::HashMap;

/// Number of spreadsheet lines above the first data row.
pub const HEADER_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Identity,
    Class,
    RollNo,
    Name,
    Subject,
    Marks,
    TotalMarks,
    Outcome,
    Remarks,
    Date,
    Period,
}

impl Field {
    const ALL: [Field; 11] = [
        Field::Identity,
        Field::Class,
        Field::RollNo,
        Field::Name,
        Field::Subject,
        Field::Marks,
        Field::TotalMarks,
        Field::Outcome,
        Field::Remarks,
        Field::Date,
        Field::Period,
    ];

    /// Accepted normalized headers, highest priority first.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Identity => &["admissionno", "identity", "id"],
            Field::Class => &["class", "classlabel", "grade"],
            Field::RollNo => &["rollno"],
            Field::Name => &["name", "studentname", "student"],
            Field::Subject => &["subject", "subjectname"],
            Field::Marks => &["marks", "mark", "obtainedmarks", "marksobtained"],
            Field::TotalMarks => &["totalmarks", "total", "outof"],
            Field::Outcome => &["status", "outcome"],
            Field::Remarks => &["remarks"],
            Field::Date => &["date", "examdate"],
            Field::Period => &["month", "period"],
        }
    }
}

pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// Zero-based position among the data rows.
    pub index: usize,
    fields: HashMap<Field, String>,
}

impl RawRow {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        let value = value.into().trim().to_string();
        if !value.is_empty() {
            self.fields.insert(field, value);
        }
        self
    }

    /// Builds a row from a string-keyed object. Unknown headers are dropped.
    pub fn from_object(index: usize, obj: &serde_json::Map<String, Value>) -> Self {
        let by_header: HashMap<String, String> = obj
            .iter()
            .filter_map(|(k, v)| cell_text(v).map(|t| (normalize_header(k), t)))
            .collect();

        let mut row = RawRow::new(index);
        for field in Field::ALL {
            if let Some(v) = field.aliases().iter().find_map(|a| by_header.get(*a)) {
                row.fields.insert(field, v.clone());
            }
        }
        row
    }

    pub fn get_field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Spreadsheet line number of this row for error reports.
    pub fn line_number(&self) -> usize {
        self.index + HEADER_OFFSET
    }
}

/// Normalizes a parsed sheet; non-object entries become empty rows so that line
/// numbers stay aligned with the source.
pub fn rows_from_json(values: &[Value]) -> Vec<RawRow> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match v.as_object() {
            Some(obj) => RawRow::from_object(i, obj),
            None => RawRow::new(i),
        })
        .collect()
}
