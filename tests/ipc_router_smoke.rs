mod common;

use common::Sidecar;
use serde_json::json;

const METHODS: &[&str] = &[
    "health",
    "settings.get",
    "settings.update",
    "students.list",
    "students.create",
    "students.bulkCreate",
    "students.update",
    "students.delete",
    "students.bulkDelete",
    "marks.get",
    "marks.setOne",
    "marks.import",
    "marks.undoLastImport",
    "marks.lastImport",
    "attendance.get",
    "attendance.set",
    "attendance.setClass",
    "outpass.list",
    "outpass.create",
    "outpass.setStatus",
    "schedules.list",
    "schedules.create",
    "schedules.update",
    "schedules.delete",
    "overview.student",
    "backup.exportBundle",
    "backup.importBundle",
];

#[test]
fn every_method_is_routed() {
    let mut sidecar = Sidecar::with_workspace();
    for method in METHODS {
        let resp = sidecar.request(method, json!({}));
        let code = resp
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        assert_ne!(code, "not_implemented", "{} is not routed", method);
    }

    let unknown = sidecar.fail("marks.frobnicate", json!({}));
    assert_eq!(unknown["code"], "not_implemented");
}

#[test]
fn workspace_methods_require_a_workspace() {
    let mut sidecar = Sidecar::spawn();
    let health = sidecar.ok("health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["hasUndoableImport"], false);

    for method in ["students.list", "marks.import", "marks.undoLastImport", "settings.get"] {
        let e = sidecar.fail(method, json!({ "rows": [] }));
        assert_eq!(e["code"], "no_workspace", "{}", method);
    }
    let e = sidecar.fail("workspace.select", json!({}));
    assert_eq!(e["code"], "bad_params");
}

#[test]
fn malformed_json_gets_an_error_line_and_loop_continues() {
    let mut sidecar = Sidecar::spawn();
    let resp = sidecar.send_line("{not json");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");
    let health = sidecar.ok("health", json!({}));
    assert!(health["version"].is_string());
}

#[test]
fn settings_roundtrip_and_validation() {
    let mut sidecar = Sidecar::with_workspace();
    let cfg = sidecar.ok("settings.get", json!({}));
    assert_eq!(cfg["defaultTotalMarks"], 100.0);
    assert_eq!(cfg["passRatio"], 0.35);

    let updated = sidecar.ok("settings.update", json!({ "patch": { "passRatio": 0.5 } }));
    assert_eq!(updated["passRatio"], 0.5);
    assert_eq!(updated["defaultTotalMarks"], 100.0);

    let e = sidecar.fail("settings.update", json!({ "patch": { "passRatio": 1.5 } }));
    assert_eq!(e["code"], "bad_params");
    assert_eq!(sidecar.ok("settings.get", json!({}))["passRatio"], 0.5);
}
