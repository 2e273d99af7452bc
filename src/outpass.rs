use crate::attendance::canonical_date;
use crate::error::{CoreError, CoreResult};
use crate::model::{Actor, OutpassRequest, OutpassStatus, Student, OUTPASSES, STUDENTS};
use crate::store::DocumentStore;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutpassInput {
    pub identity: String,
    pub date: String,
    pub time_out: String,
    pub time_in: String,
    pub reason: String,
}

fn require(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn create_outpass(store: &dyn DocumentStore, input: OutpassInput) -> CoreResult<OutpassRequest> {
    require("identity", &input.identity)?;
    require("date", &input.date)?;
    require("timeOut", &input.time_out)?;
    require("timeIn", &input.time_in)?;
    require("reason", &input.reason)?;
    let date = canonical_date(&input.date)?;

    let student: Student = match store.get_document(STUDENTS, &input.identity)? {
        Some(doc) => serde_json::from_value(doc)?,
        None => return Err(CoreError::NotFound(format!("student {}", input.identity))),
    };

    let request = OutpassRequest {
        id: Uuid::new_v4().to_string(),
        identity: input.identity,
        status: OutpassStatus::Pending,
        requested_at: chrono::Utc::now().to_rfc3339(),
        date,
        time_out: input.time_out,
        time_in: input.time_in,
        reason: input.reason,
        student_name: student.full_name(),
        class_label: student.class_label,
    };
    store.batch_create(
        OUTPASSES,
        &[(request.id.clone(), serde_json::to_value(&request)?)],
    )?;
    log::info!("outpass requested: {}", request.id);
    Ok(request)
}

/// Status is the only mutable field, and only an admin may change it.
pub fn set_outpass_status(
    store: &dyn DocumentStore,
    actor: Actor,
    id: &str,
    status: OutpassStatus,
) -> CoreResult<OutpassRequest> {
    if !actor.can_approve() {
        return Err(CoreError::Forbidden(
            "only an admin can change outpass status".to_string(),
        ));
    }
    if store.get_document(OUTPASSES, id)?.is_none() {
        return Err(CoreError::NotFound(format!("outpass {}", id)));
    }
    store.merge_or_create(
        OUTPASSES,
        id,
        &[(vec!["status".to_string()], serde_json::to_value(status)?)],
    )?;
    let doc = store
        .get_document(OUTPASSES, id)?
        .ok_or_else(|| CoreError::NotFound(format!("outpass {}", id)))?;
    log::info!("outpass {} -> {:?}", id, status);
    Ok(serde_json::from_value(doc)?)
}

/// Newest first, optionally for one student.
pub fn list_outpasses(store: &dyn DocumentStore, identity: Option<&str>) -> CoreResult<Vec<OutpassRequest>> {
    let mut out: Vec<OutpassRequest> = store
        .list_documents(OUTPASSES)?
        .into_iter()
        .map(|(_, v): (String, Value)| serde_json::from_value(v))
        .collect::<Result<_, _>>()?;
    if let Some(id) = identity {
        out.retain(|o| o.identity == id);
    }
    out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    Ok(out)
}
