//! Sqlite catalog of stored events and alerts
//!
//! The catalog indexes what the data lake holds so the CLI can answer
//! recent-event queries without walking the partition tree, and so the
//! retention prune knows which object keys to delete. Stored objects
//! themselves are never mutated.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::StorageError;
use crate::models::{AlertMessage, EnrichedEvent};

/// Catalog row for a stored event
#[derive(Debug, Clone)]
pub struct StoredEventRow {
    pub event_id: String,
    pub event_type: String,
    pub risk_score: u8,
    pub source_ip: Option<String>,
    pub object_key: String,
    pub processed_at: i64,
}

/// Catalog row for a dispatched alert
#[derive(Debug, Clone)]
pub struct StoredAlertRow {
    pub alert_id: String,
    pub event_id: String,
    pub severity: String,
    pub risk_score: u8,
    pub created_at: i64,
}

/// Sqlite-backed event catalog
pub struct EventCatalog {
    conn: Mutex<Connection>,
}

impl EventCatalog {
    /// Open (or create) the catalog at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        let catalog = EventCatalog {
            conn: Mutex::new(conn),
        };
        catalog.initialize_schema()?;
        Ok(catalog)
    }

    /// Create an in-memory catalog (useful for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let catalog = EventCatalog {
            conn: Mutex::new(conn),
        };
        catalog.initialize_schema()?;
        Ok(catalog)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Record a stored event and the object key it was written under
    pub fn record_event(&self, event: &EnrichedEvent, object_key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events
             (event_id, event_type, risk_score, source_ip, object_key, event_time, processed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                event.event.event_id.to_string(),
                event.event.event_type.to_string(),
                event.risk_score,
                event.event.source_ip,
                object_key,
                event.event.event_time.map(|t| t.timestamp()),
                event.processed_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Record a dispatched alert
    pub fn record_alert(&self, alert: &AlertMessage) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (alert_id, event_id, severity, risk_score, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                alert.alert_id.to_string(),
                alert.event_summary.event_id.to_string(),
                alert.severity.to_string(),
                alert.event_summary.risk_score,
                alert.timestamp.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Most recently processed events, newest first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEventRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT event_id, event_type, risk_score, source_ip, object_key, processed_at
             FROM events ORDER BY processed_at DESC, event_id LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(StoredEventRow {
                event_id: row.get(0)?,
                event_type: row.get(1)?,
                risk_score: row.get(2)?,
                source_ip: row.get(3)?,
                object_key: row.get(4)?,
                processed_at: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Most recently generated alerts, newest first
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<StoredAlertRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT alert_id, event_id, severity, risk_score, created_at
             FROM alerts ORDER BY created_at DESC, alert_id LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(StoredAlertRow {
                alert_id: row.get(0)?,
                event_id: row.get(1)?,
                severity: row.get(2)?,
                risk_score: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Number of cataloged events
    pub fn event_count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove catalog entries processed before the cutoff timestamp.
    ///
    /// Returns the object keys of the pruned events so the caller can
    /// delete them from the data lake as well.
    pub fn prune_before(&self, cutoff: i64) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT object_key FROM events WHERE processed_at < ?")?;
        let keys = stmt
            .query_map(params![cutoff], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        conn.execute("DELETE FROM events WHERE processed_at < ?", params![cutoff])?;
        conn.execute("DELETE FROM alerts WHERE created_at < ?", params![cutoff])?;

        Ok(keys)
    }
}
