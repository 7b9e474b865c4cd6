//! Recurring job registry in the `jobs` table.
//!
//! The registry only records jobs; firing them is left to whatever runs
//! `cmsheets offline-sync` (cron, a systemd timer). Handles are random UUIDs.

use chrono::{DateTime, Utc};
use cmsheets_core::{JobHandle, JobScheduler, Recurrence, StoreError, SyncError};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::backend;

/// A registered job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRecord {
    pub handle: JobHandle,
    pub handler: String,
    pub recurrence: Recurrence,
    pub created_at: DateTime<Utc>,
}

pub struct SqliteJobScheduler<'a> {
    conn: &'a Connection,
    document: String,
}

impl<'a> SqliteJobScheduler<'a> {
    pub fn new(conn: &'a Connection, document: &str) -> Self {
        Self {
            conn,
            document: document.to_string(),
        }
    }

    /// Jobs of this document, oldest first
    pub fn jobs(&self) -> Result<Vec<JobRecord>, SyncError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT handle, handler, recurrence, created_at FROM jobs
                 WHERE document = ?1 ORDER BY created_at, handle",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![self.document], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        rows.into_iter()
            .map(|(handle, handler, recurrence, created_at)| {
                let recurrence: Recurrence =
                    serde_json::from_str(&recurrence).map_err(|e| invalid(&handle, e))?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| invalid(&handle, e))?
                    .with_timezone(&Utc);
                Ok(JobRecord {
                    handle,
                    handler,
                    recurrence,
                    created_at,
                })
            })
            .collect()
    }
}

fn invalid(handle: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::Store(StoreError::InvalidValue {
        key: format!("job {handle}"),
        message: err.to_string(),
    })
}

impl JobScheduler for SqliteJobScheduler<'_> {
    fn create(&self, handler: &str, recurrence: &Recurrence) -> Result<JobHandle, SyncError> {
        let handle = Uuid::new_v4().to_string();
        let recurrence = serde_json::to_string(recurrence)
            .map_err(|e| SyncError::Store(StoreError::Backend(e.to_string())))?;
        self.conn
            .execute(
                "INSERT INTO jobs (handle, document, handler, recurrence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    handle,
                    self.document,
                    handler,
                    recurrence,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(backend)?;
        Ok(handle)
    }

    fn delete(&self, handle: &str) -> Result<(), SyncError> {
        self.conn
            .execute(
                "DELETE FROM jobs WHERE handle = ?1 AND document = ?2",
                params![handle, self.document],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn list_active_for_document(&self) -> Result<Vec<JobHandle>, SyncError> {
        Ok(self.jobs()?.into_iter().map(|j| j.handle).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use cmsheets_core::{HourInterval, HourOfDay};
    use pretty_assertions::assert_eq;

    #[test]
    fn create_list_delete() {
        let db = Database::open_in_memory().unwrap();
        let jobs = db.jobs("doc");
        let weekly = Recurrence::Weekly {
            on: chrono::Weekday::Wed,
            at_hour: HourOfDay::new(7).unwrap(),
        };

        let handle = jobs.create("DCM_offlineReportSync", &weekly).unwrap();

        let records = jobs.jobs().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle, handle);
        assert_eq!(records[0].recurrence, weekly);

        jobs.delete(&handle).unwrap();
        assert!(jobs.list_active_for_document().unwrap().is_empty());
    }

    #[test]
    fn jobs_are_scoped_to_their_document() {
        let db = Database::open_in_memory().unwrap();
        let a = db.jobs("doc-a");
        let b = db.jobs("doc-b");
        let handle = a.create("h", &Recurrence::Hourly { every_hours: HourInterval::new(1).unwrap() }).unwrap();

        b.delete(&handle).unwrap();

        assert!(b.list_active_for_document().unwrap().is_empty());
        assert_eq!(a.list_active_for_document().unwrap(), vec![handle]);
    }
}
