use crate::db;
use crate::error::{CoreError, CoreResult};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const CORE_SETTINGS_KEY: &str = "core";

/// Workspace-scoped knobs for mark derivation and overview queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub default_total_marks: f64,
    pub pass_ratio: f64,
    pub recent_absence_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_total_marks: 100.0,
            pass_ratio: 0.35,
            recent_absence_limit: 5,
        }
    }
}

impl CoreConfig {
    /// Smallest mark that still passes out of `total`.
    pub fn pass_threshold(&self, total: f64) -> f64 {
        (total * self.pass_ratio).ceil()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.default_total_marks.is_finite() && self.default_total_marks > 0.0) {
            return Err(CoreError::validation("defaultTotalMarks must be > 0"));
        }
        if !(self.pass_ratio > 0.0 && self.pass_ratio <= 1.0) {
            return Err(CoreError::validation("passRatio must be in (0, 1]"));
        }
        Ok(())
    }
}

pub fn load(conn: &Connection) -> CoreResult<CoreConfig> {
    let raw = db::settings_get_json(conn, CORE_SETTINGS_KEY)
        .map_err(CoreError::Settings)?;
    match raw {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(CoreConfig::default()),
    }
}

/// Merges `patch` over the stored config, validates, and persists the result.
pub fn update(conn: &Connection, patch: &serde_json::Value) -> CoreResult<CoreConfig> {
    let Some(patch_obj) = patch.as_object() else {
        return Err(CoreError::validation("settings patch must be an object"));
    };
    let mut current = serde_json::to_value(load(conn)?)?;
    if let Some(obj) = current.as_object_mut() {
        for (k, v) in patch_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    let next: CoreConfig = serde_json::from_value(current)
        .map_err(|e| CoreError::validation(format!("invalid settings: {}", e)))?;
    next.validate()?;
    db::settings_set_json(conn, CORE_SETTINGS_KEY, &serde_json::to_value(next)?)
        .map_err(CoreError::Settings)?;
    log::info!(
        "core settings updated: defaultTotalMarks={} passRatio={}",
        next.default_total_marks,
        next.pass_ratio
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pass_threshold_rounds_up() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.pass_threshold(100.0), 35.0);
        assert_eq!(cfg.pass_threshold(50.0), 18.0);
        assert_eq!(cfg.pass_threshold(25.0), 9.0);
    }

    #[test]
    fn update_merges_and_rejects_bad_ratio() {
        let conn = db::open_memory();
        let cfg = update(&conn, &json!({ "defaultTotalMarks": 50 })).expect("update");
        assert_eq!(cfg.default_total_marks, 50.0);
        assert_eq!(cfg.pass_ratio, 0.35);

        let e = update(&conn, &json!({ "passRatio": 1.5 })).expect_err("ratio > 1");
        assert_eq!(e.code(), "bad_params");
        assert_eq!(load(&conn).expect("load").default_total_marks, 50.0);
    }

    #[test]
    fn settings_table_failure_is_a_store_error() {
        let conn = db::open_memory();
        conn.execute_batch("DROP TABLE settings").expect("drop");
        assert_eq!(load(&conn).expect_err("no table").code(), "db_query_failed");
        let e = update(&conn, &json!({ "passRatio": 0.4 })).expect_err("no table");
        assert_eq!(e.code(), "db_query_failed");
    }
}
