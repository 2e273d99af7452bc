//! Document store seam.
//!
//! Collections hold JSON documents addressed by `(collection, key)`. Writers never
//! replace a whole document implicitly: nested paths are merged in, removed, or the
//! document is created with exactly the shape the paths imply.

use crate::error::{CoreError, CoreResult};
use crate::model::{
    AttendanceEntry, ExamSchedule, MarkEntry, Student, ATTENDANCE, EXAM_SCHEDULES, MARKS,
    STUDENTS,
};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type FieldPath = Vec<String>;

/// `period -> subject -> entry` for one student.
pub type StudentMarks = BTreeMap<String, BTreeMap<String, MarkEntry>>;
/// `identity -> entry` for one day.
pub type DayAttendance = BTreeMap<String, AttendanceEntry>;

pub trait DocumentStore {
    fn get_document(&self, collection: &str, key: &str) -> CoreResult<Option<Value>>;

    /// All documents of a collection in creation order.
    fn list_documents(&self, collection: &str) -> CoreResult<Vec<(String, Value)>>;

    /// Patches each path into the existing document, or creates the document with
    /// only those paths when it does not exist yet.
    fn merge_or_create(
        &self,
        collection: &str,
        key: &str,
        updates: &[(FieldPath, Value)],
    ) -> CoreResult<()>;

    /// Removes the given fields and returns how many were actually present.
    fn delete_fields(&self, collection: &str, key: &str, paths: &[FieldPath]) -> CoreResult<usize>;

    fn delete_document(&self, collection: &str, key: &str) -> CoreResult<bool>;

    /// Inserts new documents all-or-nothing; an existing key fails the batch.
    fn batch_create(&self, collection: &str, entries: &[(String, Value)]) -> CoreResult<usize>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn read_body(&self, collection: &str, key: &str) -> CoreResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ? AND doc_key = ?",
                (collection, key),
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl DocumentStore for SqliteStore<'_> {
    fn get_document(&self, collection: &str, key: &str) -> CoreResult<Option<Value>> {
        self.read_body(collection, key)
    }

    fn list_documents(&self, collection: &str) -> CoreResult<Vec<(String, Value)>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_key, body FROM documents WHERE collection = ? ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, body) in rows {
            out.push((key, serde_json::from_str(&body)?));
        }
        Ok(out)
    }

    fn merge_or_create(
        &self,
        collection: &str,
        key: &str,
        updates: &[(FieldPath, Value)],
    ) -> CoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = self.read_body(collection, key)?;
        let exists = existing.is_some();
        let mut doc = match existing {
            Some(Value::Object(m)) => Value::Object(m),
            _ => Value::Object(Map::new()),
        };
        for (path, value) in updates {
            set_path(&mut doc, path, value.clone())?;
        }
        let body = serde_json::to_string(&doc)?;
        if exists {
            tx.execute(
                "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND doc_key = ?",
                (&body, now_stamp(), collection, key),
            )?;
        } else {
            tx.execute(
                "INSERT INTO documents(collection, doc_key, body, updated_at) VALUES(?, ?, ?, ?)",
                (collection, key, &body, now_stamp()),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_fields(&self, collection: &str, key: &str, paths: &[FieldPath]) -> CoreResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(mut doc) = self.read_body(collection, key)? else {
            return Ok(0);
        };
        let mut removed = 0;
        for path in paths {
            if remove_path(&mut doc, path) {
                removed += 1;
            }
        }
        if removed > 0 {
            tx.execute(
                "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND doc_key = ?",
                (serde_json::to_string(&doc)?, now_stamp(), collection, key),
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn delete_document(&self, collection: &str, key: &str) -> CoreResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND doc_key = ?",
            (collection, key),
        )?;
        Ok(n > 0)
    }

    fn batch_create(&self, collection: &str, entries: &[(String, Value)]) -> CoreResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents(collection, doc_key, body, updated_at) VALUES(?, ?, ?, ?)",
            )?;
            let stamp = now_stamp();
            for (key, body) in entries {
                stmt.execute((collection, key, serde_json::to_string(body)?, &stamp))?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }
}

pub fn get_path<'v>(doc: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut cur = doc;
    for seg in path {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

/// Assigns `value` at `path`, creating intermediate objects. A non-object found on
/// the way is replaced by an object.
pub fn set_path(doc: &mut Value, path: &[String], value: Value) -> CoreResult<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(CoreError::validation("field path must not be empty"));
    };
    let mut cur = doc;
    for seg in parents {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        cur = match cur {
            Value::Object(obj) => obj
                .entry(seg.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return Err(CoreError::validation("field path crosses a non-object")),
        };
    }
    if !cur.is_object() {
        *cur = Value::Object(Map::new());
    }
    if let Some(obj) = cur.as_object_mut() {
        obj.insert(last.clone(), value);
    }
    Ok(())
}

/// Removes the field at `path`; intermediate objects left empty are pruned, the
/// document root is kept.
pub fn remove_path(doc: &mut Value, path: &[String]) -> bool {
    fn walk(cur: &mut Value, path: &[String]) -> bool {
        let Some(obj) = cur.as_object_mut() else {
            return false;
        };
        match path {
            [] => false,
            [leaf] => obj.remove(leaf).is_some(),
            [head, rest @ ..] => {
                let Some(child) = obj.get_mut(head) else {
                    return false;
                };
                let removed = walk(child, rest);
                if removed && child.as_object().map(|m| m.is_empty()).unwrap_or(false) {
                    obj.remove(head);
                }
                removed
            }
        }
    }
    walk(doc, path)
}

/// Read-only view of the collections the import engine consults.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub marks: BTreeMap<String, StudentMarks>,
    pub attendance: BTreeMap<String, DayAttendance>,
}

impl Snapshot {
    pub fn load(store: &dyn DocumentStore) -> CoreResult<Snapshot> {
        Ok(Snapshot {
            students: load_students(store)?,
            marks: store
                .list_documents(MARKS)?
                .into_iter()
                .map(|(k, v)| (k, parse_student_marks(&v)))
                .collect(),
            attendance: store
                .list_documents(ATTENDANCE)?
                .into_iter()
                .map(|(k, v)| (k, parse_day_attendance(&v)))
                .collect(),
        })
    }

    pub fn student(&self, identity: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.identity == identity)
    }
}

pub fn load_students(store: &dyn DocumentStore) -> CoreResult<Vec<Student>> {
    store
        .list_documents(STUDENTS)?
        .into_iter()
        .map(|(_, v)| serde_json::from_value(v).map_err(CoreError::from))
        .collect()
}

pub fn load_schedules(store: &dyn DocumentStore) -> CoreResult<Vec<ExamSchedule>> {
    store
        .list_documents(EXAM_SCHEDULES)?
        .into_iter()
        .map(|(_, v)| serde_json::from_value(v).map_err(CoreError::from))
        .collect()
}

/// Entries that do not decode as marks are skipped.
pub fn parse_student_marks(doc: &Value) -> StudentMarks {
    let mut out = StudentMarks::new();
    let Some(periods) = doc.as_object() else {
        return out;
    };
    for (period, subjects) in periods {
        let Some(subjects) = subjects.as_object() else {
            continue;
        };
        let mut parsed = BTreeMap::new();
        for (subject, raw) in subjects {
            match serde_json::from_value::<MarkEntry>(raw.clone()) {
                Ok(entry) => {
                    parsed.insert(subject.clone(), entry);
                }
                Err(e) => log::warn!("skipping undecodable mark entry in {}: {}", period, e),
            }
        }
        if !parsed.is_empty() {
            out.insert(period.clone(), parsed);
        }
    }
    out
}

pub fn parse_day_attendance(doc: &Value) -> DayAttendance {
    let mut out = DayAttendance::new();
    let Some(entries) = doc.as_object() else {
        return out;
    };
    for (identity, raw) in entries {
        if let Ok(entry) = serde_json::from_value::<AttendanceEntry>(raw.clone()) {
            out.insert(identity.clone(), entry);
        }
    }
    out
}
