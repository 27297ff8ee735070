// Shared helpers for unit tests

use crate::db::setup_database;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// In-memory database with the schema in place and foreign keys enforced.
pub(crate) fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    setup_database(&conn).unwrap();
    conn
}

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Unique database file under the system temp dir, removed (with WAL files) on drop.
pub(crate) struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub(crate) fn new(label: &str) -> Self {
        let n = NEXT_DB.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "casino-ledger-{}-{}-{}.db",
            label,
            std::process::id(),
            n
        ));
        let temp = Self { path };
        temp.cleanup();
        temp
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(&self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(file));
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        self.cleanup();
    }
}
