//! Sync orchestration.
//!
//! One sync of a tab runs: linkage lookup, latest file lookup, download,
//! grid transform, sheet write, and finally the `lastSync` update. The
//! linkage is only touched after the sheet write succeeded, so a failed sync
//! leaves both the tab content and the linkage as they were.
//!
//! ## Example
//!
//! ```rust
//! use cmsheets_core::memory::{MemoryPropertyStore, MemoryReportingApi, MemorySheets, StaticOAuth};
//! use cmsheets_core::SystemClock;
//! use cmsheets_sync::{LinkageStore, ReportFileFetcher, SyncOrchestrator, SyncOutcome};
//!
//! let props = MemoryPropertyStore::new();
//! let api = MemoryReportingApi::new();
//! let oauth = StaticOAuth::authorized("token");
//! let sheets = MemorySheets::new().with_tab("0", "Sheet1");
//! let clock = SystemClock;
//!
//! let orchestrator = SyncOrchestrator::new(
//!     LinkageStore::new(&props),
//!     ReportFileFetcher::new(&api, &oauth),
//!     &sheets,
//!     &clock,
//! );
//! // Unlinked tabs are skipped without error
//! assert_eq!(orchestrator.sync_one("0").unwrap(), SyncOutcome::Unlinked);
//! ```

use chrono::{DateTime, Utc};
use cmsheets_core::{Clock, ReportFormat, SheetHost, SyncError, TabId};
use tracing::{debug, error, info, warn};

use crate::fetcher::ReportFileFetcher;
use crate::grid;
use crate::linkage::LinkageStore;

// ============================================================================
// Outcomes
// ============================================================================

/// What a single tab sync did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The tab has no complete linkage; nothing was fetched
    Unlinked,
    /// The report had nothing to show; the tab was left untouched
    Empty,
    /// The tab was overwritten and `lastSync` recorded
    Written {
        rows: usize,
        columns: usize,
        at: DateTime<Utc>,
    },
}

/// Result of syncing one tab within a `sync_all` run
#[derive(Debug)]
pub struct TabSync {
    pub tab: TabId,
    pub result: Result<SyncOutcome, SyncError>,
}

/// Per-tab results of a `sync_all` run, in document order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub tabs: Vec<TabSync>,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.tabs
            .iter()
            .filter_map(|t| t.result.as_ref().err().map(|e| (t.tab.as_str(), e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Tabs that received new content
    pub fn written(&self) -> usize {
        self.tabs
            .iter()
            .filter(|t| matches!(t.result, Ok(SyncOutcome::Written { .. })))
            .count()
    }

    /// The run stopped early at the execution time limit
    pub fn timed_out(&self) -> bool {
        self.tabs
            .last()
            .is_some_and(|t| matches!(t.result, Err(SyncError::Timeout(_))))
    }

    /// The run stopped early because the reporting API refused the token
    pub fn auth_required(&self) -> bool {
        self.tabs
            .last()
            .is_some_and(|t| matches!(t.result, Err(SyncError::AuthRequired { .. })))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives report syncs for the tabs of one document
pub struct SyncOrchestrator<'a> {
    linkage: LinkageStore<'a>,
    fetcher: ReportFileFetcher<'a>,
    sheets: &'a dyn SheetHost,
    clock: &'a dyn Clock,
    deadline: Option<DateTime<Utc>>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        linkage: LinkageStore<'a>,
        fetcher: ReportFileFetcher<'a>,
        sheets: &'a dyn SheetHost,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            linkage,
            fetcher,
            sheets,
            clock,
            deadline: None,
        }
    }

    /// Stop with `SyncError::Timeout` once the clock passes `at`
    pub fn deadline(mut self, at: DateTime<Utc>) -> Self {
        self.deadline = Some(at);
        self
    }

    pub fn linkage(&self) -> &LinkageStore<'a> {
        &self.linkage
    }

    /// Sync one tab from its linked report.
    ///
    /// Errors from any collaborator propagate unchanged.
    pub fn sync_one(&self, tab: &str) -> Result<SyncOutcome, SyncError> {
        let Some(linkage) = self.linkage.read(tab) else {
            debug!(tab, "tab not linked, skipping");
            return Ok(SyncOutcome::Unlinked);
        };
        let (Some(profile_id), Some(report_id)) =
            (linkage.profile_id.as_deref(), linkage.report_id.as_deref())
        else {
            return Ok(SyncOutcome::Unlinked);
        };
        self.pull(tab, profile_id, report_id)
    }

    /// Fetch the latest file of a report into `tab`, whatever the tab is
    /// linked to. Linking a tab uses this before the linkage is written.
    pub fn pull(&self, tab: &str, profile_id: &str, report_id: &str) -> Result<SyncOutcome, SyncError> {
        self.check_deadline()?;

        let file = self.fetcher.latest_file(profile_id, report_id)?;
        if file.format != ReportFormat::Csv {
            return Err(SyncError::UnsupportedFormat(format!(
                "report file {} is {:?}; only CSV files can be placed in a sheet",
                file.file_name, file.format
            )));
        }

        let raw = self.fetcher.download(&file)?;
        let grid = grid::transform(&raw)?;
        if grid.is_empty() {
            warn!(tab, report_id, file_id = %file.id, "report file has no rows to write");
            return Ok(SyncOutcome::Empty);
        }

        self.check_deadline()?;
        self.sheets.replace_contents(tab, &grid)?;
        let at = self.clock.now();
        self.linkage.touch(tab, at)?;

        let columns = grid.first().map_or(0, Vec::len);
        info!(tab, report_id, rows = grid.len(), columns, "tab synced");
        Ok(SyncOutcome::Written {
            rows: grid.len(),
            columns,
            at,
        })
    }

    /// Sync every tab of the document in order.
    ///
    /// A failing tab is recorded and the run moves on to the next tab. A
    /// timeout or a refused token is recorded and ends the run.
    pub fn sync_all(&self) -> Result<SyncReport, SyncError> {
        let tabs = self.sheets.tab_ids()?;
        info!(
            document = %self.sheets.document_name(),
            tabs = tabs.len(),
            "sync started"
        );

        let mut report = SyncReport::default();
        for tab in tabs {
            let result = self.sync_one(&tab);
            let stop = matches!(
                result,
                Err(SyncError::Timeout(_) | SyncError::AuthRequired { .. })
            );
            if let Err(err) = &result {
                error!(tab = %tab, error = %err, "tab sync failed");
            }
            report.tabs.push(TabSync { tab, result });
            if stop {
                break;
            }
        }

        info!(
            document = %self.sheets.document_name(),
            written = report.written(),
            failed = report.failures().count(),
            "sync finished"
        );
        Ok(report)
    }

    fn check_deadline(&self) -> Result<(), SyncError> {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => Err(SyncError::Timeout(format!(
                "execution time limit reached at {deadline}"
            ))),
            _ => Ok(()),
        }
    }
}
