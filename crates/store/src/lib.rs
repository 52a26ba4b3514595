use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use timeline::{load_or_seed, History, SnapshotItem, SnapshotSink, Timeline};
use tracing::warn;

pub const DEFAULT_KEY: &str = "default";

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("dayplan")
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("schedule.db")
}

/// Local SQLite store for day schedules, one row per key.
pub struct ScheduleDb {
    conn: Connection,
    path: PathBuf,
}

impl ScheduleDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw snapshot JSON as last saved under `key`.
    pub fn load_snapshot(&self, key: &str) -> Result<Option<String>> {
        let json = self
            .conn
            .query_row(
                "SELECT snapshot_json FROM schedules WHERE key = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json)
    }

    pub fn save_snapshot(&self, key: &str, json: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO schedules(key, snapshot_json, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET snapshot_json = excluded.snapshot_json, updated_at = excluded.updated_at",
            params![key, json, now],
        )?;
        Ok(())
    }

    /// Undo history saved under `key`. A row that no longer parses, or whose
    /// present state is not a valid day, is ignored.
    pub fn load_history(&self, key: &str) -> Result<Option<History<Timeline>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT history_json FROM schedule_history WHERE key = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<History<Timeline>>(&raw) {
            Ok(history) if history.present().is_normalized() => Ok(Some(history)),
            Ok(_) => {
                warn!(key, "discarding history with an invalid present state");
                Ok(None)
            }
            Err(err) => {
                warn!(key, "discarding unreadable history: {}", err);
                Ok(None)
            }
        }
    }

    pub fn save_history(&self, key: &str, history: &History<Timeline>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let json = serde_json::to_string(history)?;
        self.conn.execute(
            "INSERT INTO schedule_history(key, history_json, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET history_json = excluded.history_json, updated_at = excluded.updated_at",
            params![key, json, now],
        )?;
        Ok(())
    }

    /// History to resume editing from: the saved one, or a fresh history
    /// over the saved snapshot (or the seed day when there is none).
    pub fn load_or_init(&self, key: &str) -> Result<History<Timeline>> {
        if let Some(history) = self.load_history(key)? {
            return Ok(history);
        }
        let snapshot = self.load_snapshot(key)?;
        Ok(History::new(load_or_seed(snapshot.as_deref())))
    }

    /// Forget everything stored under `key`.
    pub fn clear(&self, key: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM schedules WHERE key = ?1", params![key])?;
        tx.execute("DELETE FROM schedule_history WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM schedules ORDER BY updated_at DESC, key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

/// Writes committed snapshots of one schedule key.
#[derive(Clone)]
pub struct ScheduleSink {
    db: Rc<ScheduleDb>,
    key: String,
}

impl ScheduleSink {
    pub fn new(db: Rc<ScheduleDb>, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
        }
    }
}

impl SnapshotSink for ScheduleSink {
    fn persist(&self, snapshot: &[SnapshotItem]) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.db.save_snapshot(&self.key, &json)
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__init"],
    )?;
    // Undo history (V0002)
    conn.execute_batch(include_str!("../migrations/V0002__history.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0002__history"],
    )?;
    Ok(())
}
