//! In-memory collaborators
//!
//! Map-backed implementations of every collaborator trait, for tests and
//! dry runs. Each one records what was asked of it so callers can assert on
//! the interaction as well as on the resulting state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Clock, FileSortField, Grid, JobHandle, JobScheduler, MailNotifier, OAuthDelegate,
    PropertyStore, Recurrence, ReportFile, ReportListQuery, ReportPage, ReportingApi, Scope,
    Session, SheetHost, StoreError, SyncError, TabId,
};

// ============================================================================
// Property store
// ============================================================================

/// Property store backed by a map per scope
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    props: Mutex<BTreeMap<(Scope, String), String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every property in `scope`
    pub fn snapshot(&self, scope: Scope) -> BTreeMap<String, String> {
        self.props
            .lock()
            .unwrap()
            .iter()
            .filter(|((s, _), _)| *s == scope)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.props.lock().unwrap().get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<(), StoreError> {
        self.props
            .lock()
            .unwrap()
            .insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn delete(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.props.lock().unwrap().remove(&(scope, key.to_string()));
        Ok(())
    }

    fn delete_all(&self, scope: Scope) -> Result<(), StoreError> {
        self.props.lock().unwrap().retain(|(s, _), _| *s != scope);
        Ok(())
    }

    fn set_many(&self, scope: Scope, entries: &[(String, String)]) -> Result<(), StoreError> {
        let mut props = self.props.lock().unwrap();
        for (key, value) in entries {
            props.insert((scope, key.clone()), value.clone());
        }
        Ok(())
    }

    fn delete_many(&self, scope: Scope, keys: &[String]) -> Result<(), StoreError> {
        let mut props = self.props.lock().unwrap();
        for key in keys {
            props.remove(&(scope, key.clone()));
        }
        Ok(())
    }
}

// ============================================================================
// Reporting API
// ============================================================================

/// Scripted reporting API.
///
/// Report pages are keyed by `(profile, page token)`, file listings by
/// `(profile, report)`, and downloadable content by URL. Anything not
/// scripted answers with no result object.
#[derive(Debug, Default)]
pub struct MemoryReportingApi {
    pages: HashMap<(String, Option<String>), ReportPage>,
    files: HashMap<(String, String), Vec<ReportFile>>,
    contents: HashMap<String, String>,
    revoked: bool,
    requests: Mutex<Vec<String>>,
}

impl MemoryReportingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, profile: &str, token: Option<&str>, page: ReportPage) -> Self {
        self.pages
            .insert((profile.to_string(), token.map(str::to_string)), page);
        self
    }

    /// Files as returned by the listing, newest first
    pub fn with_files(mut self, profile: &str, report: &str, files: Vec<ReportFile>) -> Self {
        self.files
            .insert((profile.to_string(), report.to_string()), files);
        self
    }

    pub fn with_content(mut self, url: &str, content: &str) -> Self {
        self.contents.insert(url.to_string(), content.to_string());
        self
    }

    /// Every call answers `AuthRequired`, as the API does once a stored
    /// token has been revoked
    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    /// Every call made so far, e.g. `list_reports p1 t1` or `download u1`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: String) -> Result<(), SyncError> {
        self.requests.lock().unwrap().push(request);
        if self.revoked {
            return Err(SyncError::AuthRequired {
                authorization_url: "https://accounts.example/auth".into(),
            });
        }
        Ok(())
    }
}

impl ReportingApi for MemoryReportingApi {
    fn list_reports(
        &self,
        profile_id: &str,
        query: &ReportListQuery,
    ) -> Result<Option<ReportPage>, SyncError> {
        self.record(format!(
            "list_reports {profile_id} {}",
            query.page_token.as_deref().unwrap_or("-")
        ))?;
        Ok(self
            .pages
            .get(&(profile_id.to_string(), query.page_token.clone()))
            .cloned())
    }

    fn list_files(
        &self,
        profile_id: &str,
        report_id: &str,
        _sort_field: FileSortField,
    ) -> Result<Option<Vec<ReportFile>>, SyncError> {
        self.record(format!("list_files {profile_id} {report_id}"))?;
        Ok(self
            .files
            .get(&(profile_id.to_string(), report_id.to_string()))
            .cloned())
    }

    fn get_file(
        &self,
        profile_id: &str,
        report_id: &str,
        file_id: &str,
    ) -> Result<Option<ReportFile>, SyncError> {
        self.record(format!("get_file {profile_id} {report_id} {file_id}"))?;
        Ok(self
            .files
            .get(&(profile_id.to_string(), report_id.to_string()))
            .and_then(|files| files.iter().find(|f| f.id == file_id))
            .cloned())
    }

    fn download(&self, url: &str, _access_token: &str) -> Result<Vec<u8>, SyncError> {
        self.record(format!("download {url}"))?;
        self.contents
            .get(url)
            .map(|body| body.clone().into_bytes())
            .ok_or_else(|| SyncError::Api(format!("404 fetching {url}")))
    }
}

// ============================================================================
// OAuth
// ============================================================================

/// OAuth delegate holding an optional token
#[derive(Debug)]
pub struct StaticOAuth {
    token: Mutex<Option<String>>,
    authorization_url: String,
}

impl StaticOAuth {
    pub fn authorized(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
            authorization_url: "https://accounts.example/auth".into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            token: Mutex::new(None),
            authorization_url: "https://accounts.example/auth".into(),
        }
    }
}

impl OAuthDelegate for StaticOAuth {
    fn has_access(&self) -> bool {
        self.token.lock().unwrap().is_some()
    }

    fn access_token(&self) -> Result<String, SyncError> {
        self.token
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::AuthRequired {
                authorization_url: self.authorization_url.clone(),
            })
    }

    fn authorization_url(&self) -> String {
        self.authorization_url.clone()
    }

    fn reset(&self) -> Result<(), SyncError> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

// ============================================================================
// Job scheduler
// ============================================================================

/// A job registered with `MemoryScheduler`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryJob {
    pub handle: JobHandle,
    pub handler: String,
    pub recurrence: Recurrence,
}

/// Job registry with sequential handles `job-1`, `job-2`, ...
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    jobs: Mutex<Vec<MemoryJob>>,
    next: Mutex<u64>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<MemoryJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Remove a job behind the registry's back, as a user deleting the
    /// trigger from the platform console would
    pub fn drop_job(&self, handle: &str) {
        self.jobs.lock().unwrap().retain(|j| j.handle != handle);
    }
}

impl JobScheduler for MemoryScheduler {
    fn create(&self, handler: &str, recurrence: &Recurrence) -> Result<JobHandle, SyncError> {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let handle = format!("job-{}", *next);
        self.jobs.lock().unwrap().push(MemoryJob {
            handle: handle.clone(),
            handler: handler.to_string(),
            recurrence: *recurrence,
        });
        Ok(handle)
    }

    fn delete(&self, handle: &str) -> Result<(), SyncError> {
        self.drop_job(handle);
        Ok(())
    }

    fn list_active_for_document(&self) -> Result<Vec<JobHandle>, SyncError> {
        Ok(self.jobs.lock().unwrap().iter().map(|j| j.handle.clone()).collect())
    }
}

// ============================================================================
// Spreadsheet
// ============================================================================

/// Spreadsheet with named tabs held in memory
#[derive(Debug, Default)]
pub struct MemorySheets {
    tabs: Vec<(TabId, String)>,
    contents: Mutex<HashMap<TabId, Grid>>,
    notifications: Mutex<Vec<String>>,
    failing: Vec<TabId>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(mut self, id: &str, name: &str) -> Self {
        self.tabs.push((id.to_string(), name.to_string()));
        self
    }

    /// Writes to `id` fail with a host error
    pub fn failing_writes(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn contents(&self, tab: &str) -> Option<Grid> {
        self.contents.lock().unwrap().get(tab).cloned()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }
}

impl SheetHost for MemorySheets {
    fn tab_ids(&self) -> Result<Vec<TabId>, SyncError> {
        Ok(self.tabs.iter().map(|(id, _)| id.clone()).collect())
    }

    fn tab_name(&self, tab: &str) -> Option<String> {
        self.tabs
            .iter()
            .find(|(id, _)| id == tab)
            .map(|(_, name)| name.clone())
    }

    fn replace_contents(&self, tab: &str, grid: &Grid) -> Result<(), SyncError> {
        if self.failing.iter().any(|t| t == tab) {
            return Err(SyncError::Host(format!("tab {tab} is protected")));
        }
        self.contents
            .lock()
            .unwrap()
            .insert(tab.to_string(), grid.clone());
        Ok(())
    }

    fn notify(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }

    fn document_name(&self) -> String {
        "Campaign dashboard".into()
    }

    fn document_url(&self) -> String {
        "https://sheets.example/d/doc-1".into()
    }

    fn owner_email(&self) -> String {
        "owner@example.com".into()
    }
}

// ============================================================================
// Mail
// ============================================================================

/// A mail accepted by `MemoryMailer`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer with a fixed daily quota
#[derive(Debug)]
pub struct MemoryMailer {
    quota: Mutex<u32>,
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn with_quota(quota: u32) -> Self {
        Self {
            quota: Mutex::new(quota),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailNotifier for MemoryMailer {
    fn remaining_quota(&self) -> u32 {
        *self.quota.lock().unwrap()
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SyncError> {
        let mut quota = self.quota.lock().unwrap();
        if *quota == 0 {
            return Err(SyncError::Mail("daily quota exhausted".into()));
        }
        *quota -= 1;
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Session and clock
// ============================================================================

/// Session for a fixed user
#[derive(Clone, Debug)]
pub struct FixedSession(pub String);

impl Session for FixedSession {
    fn active_user_email(&self) -> String {
        self.0.clone()
    }
}

/// Clock that moves forward by `step` on every reading
#[derive(Debug)]
pub struct StepClock {
    now: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    pub fn starting_at(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }

    /// Jump to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        let current = *now;
        *now = current + self.step;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::HourInterval;

    #[test]
    fn property_scopes_are_independent() {
        let store = MemoryPropertyStore::new();
        store.set(Scope::Document, "k", "doc").unwrap();
        store.set(Scope::User, "k", "user").unwrap();

        store.delete_all(Scope::User).unwrap();

        assert_eq!(store.get(Scope::Document, "k").unwrap().as_deref(), Some("doc"));
        assert_eq!(store.get(Scope::User, "k").unwrap(), None);
    }

    #[test]
    fn scheduler_handles_are_unique() {
        let scheduler = MemoryScheduler::new();
        let rec = Recurrence::Hourly { every_hours: HourInterval::new(1).unwrap() };
        let a = scheduler.create("h", &rec).unwrap();
        let b = scheduler.create("h", &rec).unwrap();
        assert_ne!(a, b);
        scheduler.delete(&a).unwrap();
        assert_eq!(scheduler.list_active_for_document().unwrap(), vec![b]);
    }

    #[test]
    fn step_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let clock = StepClock::starting_at(start, Duration::seconds(5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));
    }

    #[test]
    fn mailer_enforces_quota() {
        let mailer = MemoryMailer::with_quota(1);
        mailer.send("a@example.com", "s", "b").unwrap();
        assert_eq!(mailer.remaining_quota(), 0);
        assert!(mailer.send("a@example.com", "s", "b").is_err());
        assert_eq!(mailer.sent().len(), 1);
    }
}
