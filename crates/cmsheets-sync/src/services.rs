//! Collaborator bundle for one document.

use chrono::Duration;
use cmsheets_core::{
    Clock, JobScheduler, MailNotifier, OAuthDelegate, PropertyStore, ReportingApi, Session,
    SheetHost,
};

use crate::catalog::ReportCatalogPager;
use crate::fetcher::ReportFileFetcher;
use crate::linkage::LinkageStore;
use crate::orchestrator::SyncOrchestrator;
use crate::schedule::ScheduleManager;

/// Every host service an entry point may need, borrowed for one invocation
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub store: &'a dyn PropertyStore,
    pub api: &'a dyn ReportingApi,
    pub oauth: &'a dyn OAuthDelegate,
    pub scheduler: &'a dyn JobScheduler,
    pub sheets: &'a dyn SheetHost,
    pub mailer: &'a dyn MailNotifier,
    pub session: &'a dyn Session,
    pub clock: &'a dyn Clock,
    /// Execution budget of one invocation; `None` runs unbounded
    pub time_limit: Option<Duration>,
}

impl<'a> Services<'a> {
    pub fn linkage(&self) -> LinkageStore<'a> {
        LinkageStore::new(self.store)
    }

    pub fn fetcher(&self) -> ReportFileFetcher<'a> {
        ReportFileFetcher::new(self.api, self.oauth)
    }

    /// Orchestrator whose deadline, if any, starts now
    pub fn orchestrator(&self) -> SyncOrchestrator<'a> {
        let orchestrator =
            SyncOrchestrator::new(self.linkage(), self.fetcher(), self.sheets, self.clock);
        match self
            .time_limit
            .and_then(|limit| self.clock.now().checked_add_signed(limit))
        {
            Some(deadline) => orchestrator.deadline(deadline),
            None => orchestrator,
        }
    }

    pub fn schedule(&self) -> ScheduleManager<'a> {
        ScheduleManager::new(self.store, self.scheduler, self.session)
    }

    pub fn catalog(&self) -> ReportCatalogPager<'a> {
        ReportCatalogPager::new(self.api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cmsheets_core::memory::{
        FixedSession, MemoryMailer, MemoryPropertyStore, MemoryReportingApi, MemoryScheduler,
        MemorySheets, StaticOAuth, StepClock,
    };
    use cmsheets_core::Linkage;

    #[test]
    fn limit_past_the_calendar_runs_unbounded() {
        let props = MemoryPropertyStore::new();
        let api = MemoryReportingApi::new();
        let oauth = StaticOAuth::authorized("t");
        let jobs = MemoryScheduler::new();
        let sheets = MemorySheets::new().with_tab("1", "Spend");
        let mailer = MemoryMailer::with_quota(1);
        let session = FixedSession("ana@example.com".into());
        let clock = StepClock::starting_at(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Duration::seconds(1),
        );
        LinkageStore::new(&props).write("1", &Linkage::new("p1", "r1")).unwrap();
        let services = Services {
            store: &props,
            api: &api,
            oauth: &oauth,
            scheduler: &jobs,
            sheets: &sheets,
            mailer: &mailer,
            session: &session,
            clock: &clock,
            time_limit: Some(Duration::days(100_000_000)),
        };

        let report = services.orchestrator().sync_all().unwrap();

        assert!(!report.timed_out());
        assert!(matches!(report.tabs[0].result, Err(cmsheets_core::SyncError::Upstream(_))));
    }
}
