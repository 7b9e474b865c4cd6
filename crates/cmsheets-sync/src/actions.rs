//! Menu actions.
//!
//! Each method is one user-facing command. Actions that sync report progress
//! through `SheetHost::notify` and still return the error, so callers can
//! choose their own exit path.

use cmsheets_core::{Linkage, ReportSummary, Scope, SyncError};
use tracing::info;

use crate::offline::{OfflineRun, OfflineSync};
use crate::orchestrator::{SyncOutcome, SyncReport};
use crate::services::Services;

pub const MSG_PULLING: &str = "Pulling new data";
pub const MSG_COMPLETE: &str = "Refresh Complete";
pub const MSG_LINKED: &str =
    "CM report data added. You can now manually refresh or setup a scheduled sync";

/// Report to link a tab to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRequest {
    pub profile_id: String,
    pub report_id: String,
    pub report_name: String,
    pub network_id: Option<String>,
}

/// Report name and last sync time of a tab
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastSyncDetails {
    pub report_name: Option<String>,
    pub last_sync: Option<String>,
}

pub struct Addon<'a> {
    services: Services<'a>,
}

impl<'a> Addon<'a> {
    pub fn new(services: Services<'a>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services<'a> {
        &self.services
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    pub fn refresh_current(&self, tab: &str) -> Result<SyncOutcome, SyncError> {
        let sheets = self.services.sheets;
        sheets.notify(MSG_PULLING);
        match self.services.orchestrator().sync_one(tab) {
            Ok(outcome) => {
                sheets.notify(MSG_COMPLETE);
                Ok(outcome)
            }
            Err(err) => {
                sheets.notify(&format!("Error: {err}"));
                Err(err)
            }
        }
    }

    /// Refresh every tab. Failures of single tabs are notified one by one
    /// and the run goes on.
    pub fn refresh_all(&self) -> Result<SyncReport, SyncError> {
        let sheets = self.services.sheets;
        sheets.notify(MSG_PULLING);
        let report = match self.services.orchestrator().sync_all() {
            Ok(report) => report,
            Err(err) => {
                sheets.notify(&format!("Error: {err}"));
                return Err(err);
            }
        };
        if report.has_failures() {
            for (tab, err) in report.failures() {
                let name = sheets.tab_name(tab).unwrap_or_else(|| tab.to_string());
                sheets.notify(&format!("Error: {name}: {err}"));
            }
        } else {
            sheets.notify(MSG_COMPLETE);
        }
        Ok(report)
    }

    // ========================================================================
    // Linkage
    // ========================================================================

    /// Pull the requested report into `tab`, then link the tab to it.
    ///
    /// Nothing is linked when the pull fails. Returns the linkage summary.
    pub fn pull_report(&self, tab: &str, request: &LinkRequest) -> Result<String, SyncError> {
        let outcome =
            self.services
                .orchestrator()
                .pull(tab, &request.profile_id, &request.report_id)?;

        let linkage = self.services.linkage();
        linkage.clear_legacy(tab)?;
        let mut record = Linkage::new(&request.profile_id, &request.report_id)
            .report_name(&request.report_name)
            .setup_user(self.services.session.active_user_email());
        if let Some(network_id) = request.network_id.as_deref().filter(|n| !n.is_empty()) {
            record = record.network_id(network_id);
        }
        if let SyncOutcome::Written { at, .. } = outcome {
            record = record.last_sync(at);
        }
        linkage.replace(tab, &record)?;
        info!(tab, report_id = %request.report_id, "tab linked");

        self.services.sheets.notify(MSG_LINKED);
        Ok(linkage.describe(tab))
    }

    pub fn linked_report(&self, tab: &str) -> String {
        self.services.linkage().describe(tab)
    }

    /// Unlink `tab` and return its (now empty) summary
    pub fn unlink_report(&self, tab: &str) -> Result<String, SyncError> {
        let linkage = self.services.linkage();
        linkage.unlink(tab)?;
        Ok(linkage.describe(tab))
    }

    pub fn unlink_all(&self) -> Result<(), SyncError> {
        let tabs = self.services.sheets.tab_ids()?;
        self.services.linkage().unlink_all(&tabs)
    }

    pub fn last_sync_details(&self, tab: &str) -> LastSyncDetails {
        let linkage = self.services.linkage().load(tab);
        LastSyncDetails {
            report_name: linkage.report_name,
            last_sync: linkage
                .last_sync
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        }
    }

    pub fn report_list(
        &self,
        profile_id: &str,
    ) -> Result<(Vec<ReportSummary>, Option<String>), SyncError> {
        self.services.catalog().list(profile_id)
    }

    // ========================================================================
    // Schedule
    // ========================================================================

    pub fn set_schedule(
        &self,
        enabled: bool,
        frequency: &str,
        time: &str,
        time2: Option<&str>,
    ) -> Result<String, SyncError> {
        self.services
            .schedule()
            .set_from_parts(enabled, frequency, time, time2)
    }

    pub fn current_schedule(&self) -> Result<String, SyncError> {
        self.services.schedule().describe()
    }

    pub fn offline_sync(&self) -> Result<OfflineRun, SyncError> {
        OfflineSync::new(self.services).run()
    }

    /// Remove every trace of the add-on from the document: jobs, schedule,
    /// linkages, the stored token and finally all properties.
    pub fn purge(&self) -> Result<(), SyncError> {
        let schedule = self.services.schedule();
        let removed = schedule.remove_document_jobs()?;
        schedule.clear()?;
        self.unlink_all()?;
        self.services.oauth.reset()?;
        self.services.store.delete_all(Scope::Document)?;
        self.services.store.delete_all(Scope::User)?;
        info!(jobs_removed = removed, "add-on data purged");
        Ok(())
    }
}
