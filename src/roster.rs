use crate::error::{CoreError, CoreResult};
use crate::identity::{next_identities, next_identity};
use crate::model::{NewStudent, Student, STUDENTS};
use crate::rows::{normalize_header, HEADER_OFFSET};
use crate::store::{load_students, DocumentStore, FieldPath};
use serde_json::Value;

/// Fields an admin edit may change; the identity is fixed at registration.
const EDITABLE_FIELDS: [&str; 7] = [
    "firstName",
    "lastName",
    "classLabel",
    "rollNo",
    "parentName",
    "phone",
    "email",
];

/// Must stay non-empty for the whole life of the record.
const REQUIRED_FIELDS: [&str; 2] = ["firstName", "classLabel"];

fn check_new(s: &NewStudent) -> Result<(), &'static str> {
    if s.first_name.trim().is_empty() {
        return Err("firstName is required");
    }
    if s.class_label.trim().is_empty() {
        return Err("classLabel is required");
    }
    Ok(())
}

/// Reads a registration sheet row, folding header case and spaces the same way the
/// marks importer does ("First Name" and "firstName" both land on `first_name`).
pub fn new_student_from_row(row: &serde_json::Map<String, Value>) -> NewStudent {
    let mut out = NewStudent::default();
    for (header, cell) in row {
        let text = match cell {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        let slot = match normalize_header(header).as_str() {
            "firstname" => &mut out.first_name,
            "lastname" | "surname" => &mut out.last_name,
            "class" | "classlabel" | "grade" => &mut out.class_label,
            "rollno" => &mut out.roll_no,
            "parentname" | "guardian" => &mut out.parent_name,
            "phone" | "phoneno" | "mobile" => &mut out.phone,
            "email" => &mut out.email,
            _ => continue,
        };
        *slot = text;
    }
    out
}

fn encode(student: &Student) -> CoreResult<(String, Value)> {
    Ok((student.identity.clone(), serde_json::to_value(student)?))
}

pub fn register_student(store: &dyn DocumentStore, year: i32, new: NewStudent) -> CoreResult<Student> {
    check_new(&new).map_err(CoreError::validation)?;
    let existing = load_students(store)?;
    let student = new.into_student(next_identity(&existing, year)?);
    store.batch_create(STUDENTS, &[encode(&student)?])?;
    log::info!("student registered: {}", student.identity);
    Ok(student)
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegistration {
    pub created: Vec<Student>,
    /// 1-based sheet lines skipped for missing first name or class.
    pub skipped_rows: Vec<usize>,
}

/// Registers every usable row in one batch. Identities are assigned in row order.
pub fn register_students_bulk(
    store: &dyn DocumentStore,
    year: i32,
    rows: Vec<NewStudent>,
) -> CoreResult<BulkRegistration> {
    let mut out = BulkRegistration::default();
    let mut accepted = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        match check_new(&row) {
            Ok(()) => accepted.push(row),
            Err(_) => out.skipped_rows.push(i + HEADER_OFFSET),
        }
    }
    if accepted.is_empty() {
        return Err(CoreError::validation(
            "no valid student records found; check column names",
        ));
    }

    let existing = load_students(store)?;
    let ids = next_identities(&existing, year, accepted.len())?;
    out.created = accepted
        .into_iter()
        .zip(ids)
        .map(|(row, id)| row.into_student(id))
        .collect();
    let entries = out
        .created
        .iter()
        .map(encode)
        .collect::<CoreResult<Vec<_>>>()?;
    store.batch_create(STUDENTS, &entries)?;
    log::info!(
        "students bulk registered: created={} skipped={}",
        out.created.len(),
        out.skipped_rows.len()
    );
    Ok(out)
}

pub fn update_student(
    store: &dyn DocumentStore,
    identity: &str,
    patch: &serde_json::Map<String, Value>,
) -> CoreResult<Student> {
    if store.get_document(STUDENTS, identity)?.is_none() {
        return Err(CoreError::NotFound(format!("student {}", identity)));
    }
    let mut updates: Vec<(FieldPath, Value)> = Vec::new();
    for (k, v) in patch {
        let field = if k == "class" { "classLabel" } else { k.as_str() };
        if !EDITABLE_FIELDS.contains(&field) {
            return Err(CoreError::validation(format!("field {} is not editable", k)));
        }
        let Some(text) = v.as_str() else {
            return Err(CoreError::validation(format!("field {} must be a string", k)));
        };
        if REQUIRED_FIELDS.contains(&field) && text.trim().is_empty() {
            return Err(CoreError::validation(format!("{} is required", field)));
        }
        updates.push((vec![field.to_string()], Value::String(text.to_string())));
    }
    if !updates.is_empty() {
        store.merge_or_create(STUDENTS, identity, &updates)?;
    }
    let doc = store
        .get_document(STUDENTS, identity)?
        .ok_or_else(|| CoreError::NotFound(format!("student {}", identity)))?;
    Ok(serde_json::from_value(doc)?)
}

/// Removes the roster record only; marks, attendance and outpasses stay behind.
pub fn delete_student(store: &dyn DocumentStore, identity: &str) -> CoreResult<()> {
    if !store.delete_document(STUDENTS, identity)? {
        return Err(CoreError::NotFound(format!("student {}", identity)));
    }
    log::info!("student deleted: {}", identity);
    Ok(())
}

pub fn delete_students(store: &dyn DocumentStore, identities: &[String]) -> CoreResult<usize> {
    let mut deleted = 0;
    for id in identities {
        if store.delete_document(STUDENTS, id)? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Distinct class labels with natural numeric ordering ("2A" before "10A").
pub fn class_labels(students: &[Student]) -> Vec<String> {
    let mut labels: Vec<String> = students.iter().map(|s| s.class_label.clone()).collect();
    labels.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
    labels.dedup();
    labels
}

fn natural_key(s: &str) -> (u64, String) {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    (digits.parse().unwrap_or(u64::MAX), s.to_lowercase())
}
