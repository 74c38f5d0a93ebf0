use crate::error::StoreError;
use crate::samples::Timestamp;
use crate::store::{from_millis, to_millis, Database};
use rusqlite::{params, Row};
use serde::Serialize;

/// One previously shown notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub message: String,
    pub timestamp: Timestamp,
    pub category: Option<String>,
}

impl HistoryEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message: row.get(1)?,
            timestamp: from_millis(row.get(2)?),
            category: row.get(3)?,
        })
    }
}

impl Database {
    /// Append a history row
    pub fn record_notification(
        &self,
        message: &str,
        category: Option<&str>,
        timestamp: Timestamp,
    ) -> Result<HistoryEntry, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_history (message, timestamp, category) VALUES (?1, ?2, ?3)",
                params![message, to_millis(timestamp), category],
            )?;
            Ok(HistoryEntry {
                id: conn.last_insert_rowid(),
                message: message.to_string(),
                timestamp: from_millis(to_millis(timestamp)),
                category: category.map(str::to_string),
            })
        })
    }

    /// Most recent entries first
    pub fn notification_history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message, timestamp, category FROM notification_history
                 ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let entries = stmt
                .query_map([limit as i64], HistoryEntry::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Delete one entry; returns whether it existed
    pub fn delete_notification(&self, id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notification_history WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Delete entries strictly older than `cutoff`; returns the number removed
    pub fn delete_notifications_older_than(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM notification_history WHERE timestamp < ?1",
                [to_millis(cutoff)],
            )?;
            Ok(removed)
        })
    }

    pub fn clear_notification_history(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM notification_history", [])?))
    }

    pub fn notification_count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM notification_history", [], |row| {
                row.get(0)
            })?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.record_notification("Old reminder", None, at(1, 9)).unwrap();
        db.record_notification("Drink water", Some("health_check"), at(15, 10))
            .unwrap();
        db.record_notification("Time for a walk", Some("health_check"), at(16, 14))
            .unwrap();
        db
    }

    #[test]
    fn test_record_returns_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .record_notification("Drink water", Some("health_check"), at(15, 10))
            .unwrap();
        assert!(entry.id > 0);
        assert_eq!(entry.message, "Drink water");
        assert_eq!(entry.category.as_deref(), Some("health_check"));
        assert_eq!(entry.timestamp, at(15, 10));
    }

    #[test]
    fn test_history_is_newest_first() {
        let db = seeded();
        let entries = db.notification_history(10).unwrap();
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Time for a walk", "Drink water", "Old reminder"]);
        assert_eq!(entries[2].category, None);

        assert_eq!(db.notification_history(1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_single_entry() {
        let db = seeded();
        let id = db.notification_history(1).unwrap()[0].id;
        assert!(db.delete_notification(id).unwrap());
        assert!(!db.delete_notification(id).unwrap());
        assert_eq!(db.notification_count().unwrap(), 2);
    }

    #[test]
    fn test_delete_older_than() {
        let db = seeded();
        let removed = db
            .delete_notifications_older_than(at(16, 14) - Duration::days(7))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.notification_count().unwrap(), 2);
    }

    #[test]
    fn test_clear_history() {
        let db = seeded();
        assert_eq!(db.clear_notification_history().unwrap(), 3);
        assert_eq!(db.notification_count().unwrap(), 0);
    }

    #[test]
    fn test_timestamp_index_exists() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'index' AND name = 'idx_notification_history_timestamp'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
