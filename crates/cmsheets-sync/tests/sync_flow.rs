//! End-to-end sync flows over in-memory collaborators

use chrono::{DateTime, Duration, TimeZone, Utc};
use cmsheets_core::memory::{
    FixedSession, MemoryMailer, MemoryPropertyStore, MemoryReportingApi, MemoryScheduler,
    MemorySheets, StaticOAuth, StepClock,
};
use cmsheets_core::{
    Clock, ReportFile, ReportFileStatus, ReportFormat, ReportPage, ReportSummary, SyncError,
};
use cmsheets_sync::{
    Addon, LinkRequest, OfflineRun, ReportCatalogPager, Services, SyncOutcome,
};
use pretty_assertions::assert_eq;

const SPEND_CSV: &str = "CM Report\n\
                         Date Range,2026-05-01 - 2026-05-31\n\
                         Report Fields\n\
                         Date,Campaign,Cost\n\
                         2026-05-01,Spring,10.50\n\
                         2026-05-02,Spring,12.00\n\
                         Grand Total:,,22.50\n";

fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 3, hour, min, 0).unwrap()
}

fn ready(id: &str) -> ReportFile {
    ReportFile::new(id, ReportFileStatus::ReportAvailable).api_url(format!("https://files/{id}"))
}

struct Host {
    props: MemoryPropertyStore,
    api: MemoryReportingApi,
    oauth: StaticOAuth,
    jobs: MemoryScheduler,
    sheets: MemorySheets,
    mailer: MemoryMailer,
    session: FixedSession,
    clock: StepClock,
}

impl Host {
    fn new(api: MemoryReportingApi, sheets: MemorySheets, oauth: StaticOAuth) -> Self {
        Self {
            props: MemoryPropertyStore::new(),
            api,
            oauth,
            jobs: MemoryScheduler::new(),
            sheets,
            mailer: MemoryMailer::with_quota(20),
            session: FixedSession("ana@example.com".into()),
            clock: StepClock::starting_at(at(9, 0), Duration::seconds(2)),
        }
    }

    fn services(&self) -> Services<'_> {
        Services {
            store: &self.props,
            api: &self.api,
            oauth: &self.oauth,
            scheduler: &self.jobs,
            sheets: &self.sheets,
            mailer: &self.mailer,
            session: &self.session,
            clock: &self.clock,
            time_limit: None,
        }
    }

    fn addon(&self) -> Addon<'_> {
        Addon::new(self.services())
    }
}

fn link(profile: &str, report: &str) -> LinkRequest {
    LinkRequest {
        profile_id: profile.into(),
        report_id: report.into(),
        report_name: format!("Report {report}"),
        network_id: None,
    }
}

// ============================================================================
// Linking and syncing
// ============================================================================

#[test]
fn link_then_sync_advances_last_sync() {
    let api = MemoryReportingApi::new()
        .with_files("p1", "r1", vec![ready("f1")])
        .with_content("https://files/f1", SPEND_CSV);
    let host = Host::new(api, MemorySheets::new().with_tab("11", "Spend"), StaticOAuth::authorized("t"));
    let addon = host.addon();
    addon.pull_report("11", &link("p1", "r1")).unwrap();

    let before = host.clock.now();
    let outcome = host.services().orchestrator().sync_one("11").unwrap();

    let SyncOutcome::Written { rows, columns, at } = outcome else {
        panic!("expected a write, got {outcome:?}");
    };
    assert_eq!((rows, columns), (3, 3));
    let stored = host.services().linkage().load("11").last_sync.unwrap();
    assert_eq!(stored, at);
    assert!(stored > before);
}

#[test]
fn processing_head_file_syncs_previous_file() {
    let api = MemoryReportingApi::new()
        .with_files(
            "p1",
            "r1",
            vec![ReportFile::new("f2", ReportFileStatus::Processing), ready("f1")],
        )
        .with_content("https://files/f1", SPEND_CSV);
    let host = Host::new(api, MemorySheets::new().with_tab("1", "Spend"), StaticOAuth::authorized("t"));

    host.addon().pull_report("1", &link("p1", "r1")).unwrap();

    assert!(host
        .api
        .requests()
        .contains(&"download https://files/f1".to_string()));
    assert_eq!(host.sheets.contents("1").unwrap()[0], vec!["Date", "Campaign", "Cost"]);
}

#[test]
fn unauthorized_sync_fails_before_download() {
    let api = MemoryReportingApi::new()
        .with_files("p1", "r1", vec![ready("f1")])
        .with_content("https://files/f1", SPEND_CSV);
    let host = Host::new(api, MemorySheets::new().with_tab("1", "Spend"), StaticOAuth::unauthorized());

    let err = host.addon().pull_report("1", &link("p1", "r1")).unwrap_err();

    assert!(err.is_auth_required());
    assert!(!host.api.requests().iter().any(|r| r.starts_with("download")));
    assert_eq!(host.sheets.contents("1"), None);
}

#[test]
fn sync_all_isolates_tab_failures() {
    let api = MemoryReportingApi::new()
        .with_files("p1", "r1", vec![ready("f1")])
        .with_content("https://files/f1", SPEND_CSV);
    let sheets = MemorySheets::new()
        .with_tab("1", "Locked")
        .with_tab("2", "Unlinked")
        .with_tab("3", "Spend")
        .failing_writes("1");
    let host = Host::new(api, sheets, StaticOAuth::authorized("t"));
    let linkage = host.services().linkage();
    linkage.write("1", &cmsheets_core::Linkage::new("p1", "r1")).unwrap();
    linkage.write("3", &cmsheets_core::Linkage::new("p1", "r1")).unwrap();

    let report = host.services().orchestrator().sync_all().unwrap();

    assert_eq!(report.tabs.len(), 3);
    assert!(matches!(report.tabs[0].result, Err(SyncError::Host(_))));
    assert_eq!(report.tabs[1].result.as_ref().unwrap(), &SyncOutcome::Unlinked);
    assert_eq!(report.written(), 1);
    assert!(host.sheets.contents("3").is_some());
    assert_eq!(linkage.load("1").last_sync, None);
}

// ============================================================================
// Schedule
// ============================================================================

#[test]
fn setting_schedule_twice_leaves_one_job() {
    let host = Host::new(MemoryReportingApi::new(), MemorySheets::new(), StaticOAuth::authorized("t"));
    let addon = host.addon();

    addon.set_schedule(true, "hourly", "2", None).unwrap();
    addon.set_schedule(true, "weekly", "MONDAY", Some("2")).unwrap();

    let jobs = host.jobs.jobs();
    assert_eq!(jobs.len(), 1);
    let record = host.services().schedule().record().unwrap();
    assert_eq!(record.trigger_id.as_deref(), Some(jobs[0].handle.as_str()));
    assert_eq!(
        addon.current_schedule().unwrap(),
        "Current Sync Schedule: Weekly on MONDAY between 2am to 3am. Created by: ana@example.com"
    );
}

// ============================================================================
// Catalog
// ============================================================================

fn csv_page(first_id: usize, count: usize, token: Option<&str>) -> ReportPage {
    ReportPage {
        items: (first_id..first_id + count)
            .map(|id| ReportSummary::new(id.to_string(), format!("Report {id}"), ReportFormat::Csv))
            .collect(),
        next_page_token: token.map(str::to_string),
    }
}

#[test]
fn catalog_stops_at_forty_reports() {
    let api = MemoryReportingApi::new()
        .with_page("p1", None, csv_page(0, 20, Some("page-1")))
        .with_page("p1", Some("page-1"), csv_page(20, 20, Some("page-2")))
        .with_page("p1", Some("page-2"), csv_page(40, 5, None));

    let (reports, token) = ReportCatalogPager::new(&api).list("p1").unwrap();

    assert_eq!(reports.len(), 40);
    assert_eq!(token.as_deref(), Some("page-2"));
    assert_eq!(api.requests().len(), 2);
}

#[test]
fn catalog_keeps_paging_past_filtered_pages() {
    let mut excel_only = csv_page(0, 3, Some("page-1"));
    for item in &mut excel_only.items {
        item.format = ReportFormat::Excel;
    }
    let api = MemoryReportingApi::new()
        .with_page("p1", None, excel_only)
        .with_page("p1", Some("page-1"), csv_page(3, 2, None));

    let (reports, token) = ReportCatalogPager::new(&api).list("p1").unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(token, None);
}

// ============================================================================
// Offline sync
// ============================================================================

#[test]
fn auth_mail_sent_at_most_once_per_day() {
    let host = Host::new(MemoryReportingApi::new(), MemorySheets::new(), StaticOAuth::unauthorized());

    let first = host.addon().offline_sync().unwrap();
    let second = host.addon().offline_sync().unwrap();
    host.clock.set(at(9, 0) + Duration::days(1));
    let next_day = host.addon().offline_sync().unwrap();

    assert!(matches!(first, OfflineRun::AuthRequired { mailed: true }));
    assert!(matches!(second, OfflineRun::AuthRequired { mailed: false }));
    assert!(matches!(next_day, OfflineRun::AuthRequired { mailed: true }));
    assert_eq!(host.mailer.sent().len(), 2);
}

#[test]
fn offline_sync_refreshes_linked_tabs() {
    let api = MemoryReportingApi::new()
        .with_files("p1", "r1", vec![ready("f1")])
        .with_content("https://files/f1", SPEND_CSV);
    let sheets = MemorySheets::new().with_tab("1", "Spend").with_tab("2", "Notes");
    let host = Host::new(api, sheets, StaticOAuth::authorized("t"));
    host.addon().pull_report("1", &link("p1", "r1")).unwrap();

    let run = host.addon().offline_sync().unwrap();

    let OfflineRun::Synced(report) = run else {
        panic!("expected a sync run");
    };
    assert_eq!(report.written(), 1);
    assert!(!report.has_failures());
    assert!(host.mailer.sent().is_empty());
}
