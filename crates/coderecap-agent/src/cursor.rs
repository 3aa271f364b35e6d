use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Value};

use crate::reader::SourceReader;
use crate::{AgentKind, RawUnit, ScanWindow, SourceError, SourceScan};

/// Cursor keeps composer state in a SQLite key-value table
/// (`cursorDiskKV`) inside its global-storage `state.vscdb`. Each
/// `composerData:<id>` row is one unit; message volume comes from counting
/// that composer's `bubbleId:` keys.
pub struct CursorReader;

impl SourceReader for CursorReader {
    fn agent(&self) -> AgentKind {
        AgentKind::Cursor
    }

    fn default_root(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|config| {
            config
                .join("Cursor")
                .join("User")
                .join("globalStorage")
                .join("state.vscdb")
        })
    }

    fn scan(&self, root: &Path, _window: Option<&ScanWindow>) -> Result<SourceScan, SourceError> {
        if !root.is_file() {
            return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
        }

        // Another application's live database: read-only, and any failure to
        // open or query it counts as source absence, not a fatal error.
        let conn = match Connection::open_with_flags(root, OpenFlags::SQLITE_OPEN_READ_ONLY) {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(db = %root.display(), error = %err, "cursor database unreadable");
                return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
            }
        };
        let units = match composer_units(&conn, root) {
            Ok(units) => units,
            Err(err) => {
                tracing::warn!(db = %root.display(), error = %err, "cursor database not queryable");
                return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
            }
        };
        Ok(SourceScan {
            agent: self.agent(),
            root: root.to_path_buf(),
            available: true,
            units,
        })
    }
}

fn bubble_counts(conn: &Connection) -> Result<HashMap<String, u64>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key FROM cursorDiskKV WHERE key LIKE 'bubbleId:%'")?;
    let keys = stmt.query_map([], |row| row.get::<_, String>(0))?;

    // Keys look like bubbleId:<composerId>:<bubbleId>.
    let mut counts: HashMap<String, u64> = HashMap::new();
    for key in keys {
        let key = key?;
        if let Some(composer_id) = key.split(':').nth(1) {
            *counts.entry(composer_id.to_string()).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn composer_units(conn: &Connection, db_path: &Path) -> Result<Vec<RawUnit>, rusqlite::Error> {
    let counts = bubble_counts(conn)?;

    let mut stmt = conn.prepare("SELECT key, value FROM cursorDiskKV WHERE key LIKE 'composerData:%'")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    // BTreeMap keyed by composer id keeps unit order independent of row order.
    let mut units: BTreeMap<String, RawUnit> = BTreeMap::new();
    for row in rows {
        let (key, blob) = row?;
        let composer_id = match key.split(':').nth(1) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };
        let unit_id = format!("{}#composerData:{}", db_path.display(), composer_id);
        let unit = match serde_json::from_slice::<Value>(&blob) {
            Ok(data) => RawUnit::Records {
                unit_id,
                records: vec![json!({
                    "composerId": composer_id,
                    "bubbleCount": counts.get(&composer_id).copied().unwrap_or(0),
                    "data": data,
                })],
            },
            Err(_) => RawUnit::Broken {
                unit_id,
                reason: "parse failure".to_string(),
            },
        };
        units.insert(composer_id, unit);
    }
    Ok(units.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_db(path: &Path, rows: &[(&str, &str)]) {
        let conn = Connection::open(path).expect("open db");
        conn.execute_batch(
            r#"
            CREATE TABLE cursorDiskKV (
                key TEXT PRIMARY KEY,
                value BLOB
            );
            "#,
        )
        .expect("create schema");
        for (key, value) in rows {
            conn.execute(
                "INSERT INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
                (key, value.as_bytes()),
            )
            .expect("insert row");
        }
    }

    #[test]
    fn composer_rows_become_units_with_bubble_counts() {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("state.vscdb");
        seed_db(
            &db,
            &[
                ("composerData:c1", r#"{"createdAt": 1743500000000, "unifiedMode": "agent"}"#),
                ("bubbleId:c1:b1", "{}"),
                ("bubbleId:c1:b2", "{}"),
                ("bubbleId:c1:b3", "{}"),
            ],
        );

        let scan = CursorReader.scan(&db, None).expect("scan");
        assert!(scan.available);
        assert_eq!(scan.units.len(), 1);
        match &scan.units[0] {
            RawUnit::Records { unit_id, records } => {
                assert!(unit_id.ends_with("#composerData:c1"));
                assert_eq!(records[0]["bubbleCount"], 3);
                assert_eq!(records[0]["data"]["unifiedMode"], "agent");
            }
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[test]
    fn undecodable_blob_is_one_broken_unit() {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("state.vscdb");
        seed_db(&db, &[("composerData:c9", "{nope")]);

        let scan = CursorReader.scan(&db, None).expect("scan");
        assert_eq!(scan.units.len(), 1);
        assert!(matches!(&scan.units[0], RawUnit::Broken { reason, .. } if reason == "parse failure"));
    }

    #[test]
    fn missing_database_is_unavailable() {
        let dir = TempDir::new().expect("tempdir");
        let scan = CursorReader
            .scan(&dir.path().join("state.vscdb"), None)
            .expect("scan");
        assert!(!scan.available);
    }

    #[test]
    fn database_without_expected_table_is_unavailable() {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("state.vscdb");
        Connection::open(&db)
            .expect("open db")
            .execute_batch("CREATE TABLE other (id INTEGER);")
            .expect("create schema");

        let scan = CursorReader.scan(&db, None).expect("scan");
        assert!(!scan.available);
        assert!(scan.units.is_empty());
    }
}
