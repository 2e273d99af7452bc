use crate::db::DB_FILE_NAME;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/recordbook.sqlite3";
pub const BUNDLE_FORMAT: &str = "recordbook-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "sqlite3";

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub db_sha256: String,
    pub db_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    /// Only known for zip bundles.
    pub db_sha256: Option<String>,
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn export_workspace_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let db_path = workspace.join(DB_FILE_NAME);
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("workspace database not found: {}", db_path.to_string_lossy()))?;
    let checksum = hex(&Sha256::digest(&db_bytes));

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbEntry": DB_ENTRY,
        "dbSha256": checksum,
        "dbBytes": db_bytes.len(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    log::info!("workspace exported: bytes={}", db_bytes.len());
    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        db_sha256: checksum,
        db_bytes: db_bytes.len() as u64,
    })
}

/// Restores the workspace database from a bundle, or from a bare SQLite file.
/// The database is only replaced after the extracted bytes match the manifest
/// checksum.
pub fn import_workspace_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let dst = workspace.join(DB_FILE_NAME);

    let signature = read_signature(in_path)?;
    if signature.starts_with(SQLITE_MAGIC) {
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy sqlite backup from {} to {}",
                in_path.to_string_lossy(),
                dst.to_string_lossy()
            )
        })?;
        log::info!("workspace restored from raw sqlite file");
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
            db_sha256: None,
        });
    }
    if !signature.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Err(anyhow!("not a workspace bundle or sqlite database"));
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest missing dbSha256"))?
        .to_ascii_lowercase();

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let actual = hex(&Sha256::digest(&db_bytes));
    if actual != expected {
        log::warn!("workspace import rejected: checksum mismatch");
        return Err(anyhow!(
            "database checksum mismatch: manifest {} but entry hashes to {}",
            expected,
            actual
        ));
    }

    let tmp_dst = workspace.join(format!("{}.importing", DB_FILE_NAME));
    {
        let mut db_out = File::create(&tmp_dst).with_context(|| {
            format!("failed to create temp database {}", tmp_dst.to_string_lossy())
        })?;
        db_out
            .write_all(&db_bytes)
            .context("failed to write extracted database")?;
        db_out.flush().context("failed to flush extracted database")?;
    }
    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!("failed to remove existing database {}", dst.to_string_lossy())
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!("failed to move extracted database to {}", dst.to_string_lossy())
    })?;

    log::info!("workspace restored from bundle: bytes={}", db_bytes.len());
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT.to_string(),
        db_sha256: Some(actual),
    })
}

fn read_signature(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = Vec::with_capacity(16);
    Read::by_ref(&mut f)
        .take(16)
        .read_to_end(&mut sig)
        .context("failed to read file signature")?;
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::STUDENTS;
    use crate::store::{DocumentStore, SqliteStore};

    fn seeded_workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(dir.path()).expect("open");
        SqliteStore::new(&conn)
            .batch_create(STUDENTS, &[("2025-001".into(), json!({ "firstName": "Asha" }))])
            .expect("seed");
        dir
    }

    #[test]
    fn bundle_roundtrip_restores_database() {
        let src = seeded_workspace();
        let dst = tempfile::tempdir().expect("tempdir");
        let bundle = src.path().join("out").join("backup.zip");

        let export = export_workspace_bundle(src.path(), &bundle).expect("export");
        assert_eq!(export.bundle_format, BUNDLE_FORMAT);
        assert_eq!(export.db_sha256.len(), 64);

        let import = import_workspace_bundle(&bundle, dst.path()).expect("import");
        assert_eq!(import.db_sha256.as_deref(), Some(export.db_sha256.as_str()));

        let conn = db::open_db(dst.path()).expect("reopen");
        let doc = SqliteStore::new(&conn)
            .get_document(STUDENTS, "2025-001")
            .expect("get");
        assert_eq!(doc, Some(json!({ "firstName": "Asha" })));
    }

    #[test]
    fn tampered_bundle_is_rejected_and_workspace_untouched() {
        let src = seeded_workspace();
        let dst = tempfile::tempdir().expect("tempdir");
        let bundle = dst.path().join("bad.zip");
        {
            let mut zip = ZipWriter::new(File::create(&bundle).expect("create"));
            let opts = FileOptions::default();
            zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
            zip.write_all(
                json!({ "format": BUNDLE_FORMAT, "dbSha256": "00".repeat(32) })
                    .to_string()
                    .as_bytes(),
            )
            .expect("write");
            zip.start_file(DB_ENTRY, opts).expect("db");
            zip.write_all(&std::fs::read(src.path().join(DB_FILE_NAME)).expect("read"))
                .expect("write");
            zip.finish().expect("finish");
        }

        let e = import_workspace_bundle(&bundle, dst.path()).expect_err("mismatch");
        assert!(e.to_string().contains("checksum mismatch"));
        assert!(!dst.path().join(DB_FILE_NAME).exists());
    }

    #[test]
    fn raw_sqlite_file_is_accepted() {
        let src = seeded_workspace();
        let dst = tempfile::tempdir().expect("tempdir");
        let import =
            import_workspace_bundle(&src.path().join(DB_FILE_NAME), dst.path()).expect("import");
        assert_eq!(import.bundle_format_detected, RAW_SQLITE_FORMAT);
        assert!(dst.path().join(DB_FILE_NAME).is_file());
    }

    #[test]
    fn unknown_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let junk = dir.path().join("junk.bin");
        std::fs::write(&junk, b"hello").expect("write");
        assert!(import_workspace_bundle(&junk, dir.path()).is_err());
    }
}
