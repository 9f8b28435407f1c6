//! Persisted campaign data: the number queue, the DNC list and the call event log.
//!
//! Lists live as JSON arrays in the data directory; the event log is an
//! append-only SQLite table. Every operation is serialized by one lock.

use crate::error::StorageError;
use crate::model::{CallEvent, PhoneNumber};
use rusqlite::{params, Connection};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const NUMBERS_FILE: &str = "numbers.json";
const DNC_FILE: &str = "dnc.json";

/// What the dialing engine needs from storage.
pub trait CampaignStore: Send + Sync {
    /// The queue in dialing order.
    fn list_numbers(&self) -> Result<Vec<PhoneNumber>, StorageError>;

    fn is_dnc(&self, number: &PhoneNumber) -> Result<bool, StorageError>;

    /// Append one entry to the call event log.
    fn log_event(
        &self,
        call_id: &str,
        number: &PhoneNumber,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), StorageError>;
}

/// File-backed store rooted at the dialer data directory.
pub struct FileStore {
    numbers_file: PathBuf,
    dnc_file: PathBuf,
    db_path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) the list files and the event log schema.
    pub fn open(data_dir: &Path, db_path: &Path) -> Result<Self, StorageError> {
        let store = Self {
            numbers_file: data_dir.join(NUMBERS_FILE),
            dnc_file: data_dir.join(DNC_FILE),
            db_path: db_path.to_path_buf(),
            lock: Mutex::new(()),
        };
        for path in [&store.numbers_file, &store.dnc_file] {
            if !path.exists() {
                write_list(path, &[])?;
            }
        }
        store.connection()?;
        Ok(store)
    }

    /// Replace the queue, dropping duplicates while keeping first-seen order.
    pub fn save_numbers(
        &self,
        numbers: impl IntoIterator<Item = PhoneNumber>,
    ) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        write_list(&self.numbers_file, &dedup(numbers))
    }

    /// Append unseen numbers to the end of the queue and return the result.
    pub fn append_numbers(
        &self,
        numbers: impl IntoIterator<Item = PhoneNumber>,
    ) -> Result<Vec<PhoneNumber>, StorageError> {
        let _guard = self.guard()?;
        let existing = read_list(&self.numbers_file)?;
        let merged = dedup(existing.into_iter().chain(numbers));
        write_list(&self.numbers_file, &merged)?;
        Ok(merged)
    }

    pub fn clear_numbers(&self) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        write_list(&self.numbers_file, &[])
    }

    pub fn list_dnc(&self) -> Result<Vec<PhoneNumber>, StorageError> {
        let _guard = self.guard()?;
        read_list(&self.dnc_file)
    }

    pub fn add_to_dnc(&self, number: &PhoneNumber) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        let mut entries: BTreeSet<PhoneNumber> = read_list(&self.dnc_file)?.into_iter().collect();
        if entries.insert(number.clone()) {
            let sorted: Vec<PhoneNumber> = entries.into_iter().collect();
            write_list(&self.dnc_file, &sorted)?;
        }
        Ok(())
    }

    /// Newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<CallEvent>, StorageError> {
        let _guard = self.guard()?;
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT call_sid, number, event, ts, payload_json
             FROM call_events
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let payload: String = row.get(4)?;
            Ok(CallEvent {
                call_sid: row.get(0)?,
                number: row.get(1)?,
                event: row.get(2)?,
                ts: row.get(3)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            })
        })?;
        let events = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.lock.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn connection(&self) -> Result<Connection, StorageError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS call_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                call_sid TEXT NOT NULL,
                number TEXT NOT NULL,
                event TEXT NOT NULL,
                ts TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );
            ",
        )?;
        Ok(conn)
    }
}

impl CampaignStore for FileStore {
    fn list_numbers(&self) -> Result<Vec<PhoneNumber>, StorageError> {
        let _guard = self.guard()?;
        read_list(&self.numbers_file)
    }

    fn is_dnc(&self, number: &PhoneNumber) -> Result<bool, StorageError> {
        Ok(self.list_dnc()?.contains(number))
    }

    fn log_event(
        &self,
        call_id: &str,
        number: &PhoneNumber,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), StorageError> {
        let payload_json = serde_json::to_string(&payload).map_err(StorageError::Payload)?;
        let _guard = self.guard()?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO call_events (call_sid, number, event, ts, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![call_id, number.as_str(), event, now_rfc3339(), payload_json],
        )?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

fn dedup(numbers: impl IntoIterator<Item = PhoneNumber>) -> Vec<PhoneNumber> {
    let mut seen = HashSet::new();
    numbers
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

fn read_list(path: &Path) -> Result<Vec<PhoneNumber>, StorageError> {
    let raw = std::fs::read(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_list(path: &Path, numbers: &[PhoneNumber]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let body = serde_json::to_vec_pretty(numbers).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, body).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), &dir.path().join("logs.sqlite")).unwrap();
        (dir, store)
    }

    fn nums(values: &[&str]) -> Vec<PhoneNumber> {
        values.iter().map(|v| PhoneNumber::from(*v)).collect()
    }

    #[test]
    fn open_creates_empty_lists() {
        let (dir, store) = open_store();
        assert!(dir.path().join(NUMBERS_FILE).exists());
        assert!(dir.path().join(DNC_FILE).exists());
        assert!(store.list_numbers().unwrap().is_empty());
        assert!(store.list_dnc().unwrap().is_empty());
    }

    #[test]
    fn save_numbers_dedups_preserving_order() {
        let (_dir, store) = open_store();
        store
            .save_numbers(nums(&["+3582", "+3581", "+3582", "+3583"]))
            .unwrap();
        assert_eq!(store.list_numbers().unwrap(), nums(&["+3582", "+3581", "+3583"]));
    }

    #[test]
    fn append_numbers_keeps_existing_and_skips_seen() {
        let (_dir, store) = open_store();
        store.save_numbers(nums(&["+3581", "+3582"])).unwrap();
        let merged = store.append_numbers(nums(&["+3582", "+3584"])).unwrap();
        assert_eq!(merged, nums(&["+3581", "+3582", "+3584"]));
        assert_eq!(store.list_numbers().unwrap(), merged);

        store.clear_numbers().unwrap();
        assert!(store.list_numbers().unwrap().is_empty());
    }

    #[test]
    fn dnc_entries_are_sorted_and_unique() {
        let (_dir, store) = open_store();
        store.add_to_dnc(&"+3589".into()).unwrap();
        store.add_to_dnc(&"+3581".into()).unwrap();
        store.add_to_dnc(&"+3589".into()).unwrap();
        assert_eq!(store.list_dnc().unwrap(), nums(&["+3581", "+3589"]));
        assert!(store.is_dnc(&"+3581".into()).unwrap());
        assert!(!store.is_dnc(&"+3582".into()).unwrap());
    }

    #[test]
    fn event_log_returns_newest_first() {
        let (_dir, store) = open_store();
        store
            .log_event("CA1", &"+3581".into(), "initiated", serde_json::json!({}))
            .unwrap();
        store
            .log_event(
                "error",
                &"+3582".into(),
                "error",
                serde_json::json!({"error": "boom"}),
            )
            .unwrap();

        let events = store.recent_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].call_sid, "error");
        assert_eq!(events[0].payload["error"], "boom");
        assert_eq!(events[1].event, "initiated");

        assert_eq!(store.recent_events(1).unwrap().len(), 1);
    }

    #[test]
    fn malformed_list_file_is_reported() {
        let (dir, store) = open_store();
        std::fs::write(dir.path().join(NUMBERS_FILE), "not json").unwrap();
        assert!(matches!(
            store.list_numbers(),
            Err(StorageError::Json { .. })
        ));
    }
}
