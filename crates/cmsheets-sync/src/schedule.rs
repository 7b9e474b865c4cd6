//! Recurring sync schedule of a document.
//!
//! A document has at most one recurring job. Its handle and parameters are
//! recorded in document properties; `ScheduleManager` keeps the record and the
//! job registry in step. Replacing a schedule always deletes the recorded job
//! before creating the new one.

use cmsheets_core::keys::{
    OFFLINE_SYNC_HANDLER, SCHEDULE_FREQUENCY, SCHEDULE_KEYS, SCHEDULE_TIME, SCHEDULE_TIME2,
    TRIGGER_CREATED_BY, TRIGGER_ID,
};
use cmsheets_core::{
    JobScheduler, PropertyStore, Recurrence, ScheduleRecord, Scope, Session, SyncError,
};
use tracing::{error, info, warn};

pub struct ScheduleManager<'a> {
    store: &'a dyn PropertyStore,
    scheduler: &'a dyn JobScheduler,
    session: &'a dyn Session,
}

impl<'a> ScheduleManager<'a> {
    pub fn new(
        store: &'a dyn PropertyStore,
        scheduler: &'a dyn JobScheduler,
        session: &'a dyn Session,
    ) -> Self {
        Self {
            store,
            scheduler,
            session,
        }
    }

    /// Replace the document's schedule; `None` disables it.
    ///
    /// Returns the description of the schedule now in effect, empty when
    /// disabled.
    pub fn set(&self, recurrence: Option<Recurrence>) -> Result<String, SyncError> {
        self.cancel_recorded()?;

        let Some(recurrence) = recurrence else {
            self.clear()?;
            info!("recurring sync disabled");
            return Ok(String::new());
        };

        let handle = match self.scheduler.create(OFFLINE_SYNC_HANDLER, &recurrence) {
            Ok(handle) => handle,
            Err(err) => {
                // The recorded job is already gone
                self.clear()?;
                return Err(err);
            }
        };

        if let Err(err) = self.write_record(&recurrence, &handle) {
            // Every live job must be recorded
            if let Err(cancel) = self.scheduler.delete(&handle) {
                error!(handle = %handle, error = %cancel, "unrecorded sync job left behind");
            }
            return Err(err);
        }
        info!(handle = %handle, schedule = %recurrence.describe(), "recurring sync scheduled");

        self.describe()
    }

    /// `set` from the raw dialog fields.
    ///
    /// The fields are validated before the current job is touched, so an
    /// invalid request leaves the existing schedule in place.
    pub fn set_from_parts(
        &self,
        enabled: bool,
        frequency: &str,
        time: &str,
        time2: Option<&str>,
    ) -> Result<String, SyncError> {
        let recurrence = if enabled {
            Some(Recurrence::from_parts(frequency, time, time2)?)
        } else {
            None
        };
        self.set(recurrence)
    }

    /// Human-readable schedule, e.g.
    /// "Current Sync Schedule: Every 4 Hours. Created by: ana@example.com".
    ///
    /// When the current user created the schedule and its job no longer
    /// exists, the record is cleared and an empty string returned.
    pub fn describe(&self) -> Result<String, SyncError> {
        let record = self.record()?;
        let user = self.session.active_user_email();

        if record.created_by.as_deref() == Some(user.as_str()) {
            let active = self.scheduler.list_active_for_document()?;
            let exists = record
                .trigger_id
                .as_ref()
                .is_some_and(|id| active.contains(id));
            if !exists {
                warn!(
                    trigger_id = record.trigger_id.as_deref().unwrap_or("-"),
                    "recorded sync job no longer exists; clearing schedule"
                );
                self.clear()?;
                return Ok(String::new());
            }
        }

        let Some(frequency) = record.frequency.as_deref() else {
            return Ok(String::new());
        };
        let recurrence = Recurrence::from_parts(
            frequency,
            record.time.as_deref().unwrap_or_default(),
            record.time2.as_deref(),
        )?;

        let mut text = format!("Current Sync Schedule: {}", recurrence.describe());
        if let Some(created_by) = &record.created_by {
            text.push_str(&format!(". Created by: {created_by}"));
        }
        Ok(text)
    }

    /// The stored schedule fields
    pub fn record(&self) -> Result<ScheduleRecord, SyncError> {
        let get = |key: &str| -> Result<Option<String>, SyncError> {
            Ok(self
                .store
                .get(Scope::Document, key)?
                .filter(|v| !v.is_empty()))
        };
        Ok(ScheduleRecord {
            frequency: get(SCHEDULE_FREQUENCY)?,
            time: get(SCHEDULE_TIME)?,
            time2: get(SCHEDULE_TIME2)?,
            created_by: get(TRIGGER_CREATED_BY)?,
            trigger_id: get(TRIGGER_ID)?,
        })
    }

    /// Delete the schedule fields; the job registry is not touched
    pub fn clear(&self) -> Result<(), SyncError> {
        let keys: Vec<String> = SCHEDULE_KEYS.iter().map(|k| k.to_string()).collect();
        self.store.delete_many(Scope::Document, &keys)?;
        Ok(())
    }

    /// Delete every job active for the document, recorded or not
    pub fn remove_document_jobs(&self) -> Result<usize, SyncError> {
        let handles = self.scheduler.list_active_for_document()?;
        for handle in &handles {
            self.scheduler.delete(handle)?;
        }
        Ok(handles.len())
    }

    fn write_record(&self, recurrence: &Recurrence, handle: &str) -> Result<(), SyncError> {
        let mut entries = vec![
            (SCHEDULE_FREQUENCY.to_string(), recurrence.frequency().to_string()),
            (SCHEDULE_TIME.to_string(), recurrence.time_value()),
            (TRIGGER_CREATED_BY.to_string(), self.session.active_user_email()),
            (TRIGGER_ID.to_string(), handle.to_string()),
        ];
        match recurrence.time2_value() {
            Some(time2) => entries.push((SCHEDULE_TIME2.to_string(), time2)),
            None => self.store.delete(Scope::Document, SCHEDULE_TIME2)?,
        }
        self.store.set_many(Scope::Document, &entries)?;
        Ok(())
    }

    fn cancel_recorded(&self) -> Result<(), SyncError> {
        let Some(handle) = self.store.get(Scope::Document, TRIGGER_ID)? else {
            return Ok(());
        };
        if self.scheduler.list_active_for_document()?.contains(&handle) {
            self.scheduler.delete(&handle)?;
            info!(handle = %handle, "previous sync job deleted");
        }
        Ok(())
    }
}
