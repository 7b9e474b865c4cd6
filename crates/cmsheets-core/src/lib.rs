//! # cmsheets-core
//!
//! Core domain model and collaborator traits for cmsheets.
//!
//! cmsheets links spreadsheet tabs to Campaign Manager reports and pulls the
//! latest generated report file into the tab, on demand or on a recurring
//! schedule. This crate provides:
//! - Domain types: `Linkage`, `ScheduleRecord`, `Recurrence`, `ReportFile`, `ReportSummary`
//! - Collaborator traits: `PropertyStore`, `ReportingApi`, `OAuthDelegate`,
//!   `JobScheduler`, `SheetHost`, `MailNotifier`, `Session`, `Clock`
//! - Property key layout (`keys`)
//! - Error types
//! - In-memory collaborators for tests (`memory`)
//!
//! ## Execution model
//!
//! Every entry point runs to completion before the next one starts for the
//! same document; the host serializes invocations per document. None of the
//! collaborator traits require `Sync`, and the sync components hold no locks.
//! A host that runs invocations concurrently must serialize them per document
//! itself.
//!
//! ## Example
//!
//! ```rust
//! use cmsheets_core::{Linkage, Recurrence, HourOfDay};
//!
//! let linkage = Linkage::new("p1", "r1").report_name("Weekly spend");
//! assert!(linkage.is_complete());
//!
//! let daily = Recurrence::Daily { at_hour: HourOfDay::new(2).unwrap() };
//! assert_eq!(daily.frequency().as_str(), "daily");
//! ```

pub mod keys;
pub mod memory;
pub mod recurrence;

pub use recurrence::{parse_weekday, weekday_name, Frequency, HourInterval, HourOfDay, Recurrence};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Stable identifier of a tab within a spreadsheet document
pub type TabId = String;

/// Opaque identifier of a platform-scheduled recurring invocation
pub type JobHandle = String;

/// Rectangular grid of string cells, row-major
pub type Grid = Vec<Vec<String>>;

// ============================================================================
// Linkage
// ============================================================================

/// Persisted association between a spreadsheet tab and a report.
///
/// A tab counts as linked only when both `profile_id` and `report_id` are
/// present; readers treat a partial linkage as unlinked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    pub profile_id: Option<String>,
    pub report_id: Option<String>,
    pub report_name: Option<String>,
    /// Present only if supplied at link time
    pub network_id: Option<String>,
    /// Email of the user who created the linkage
    pub setup_user: Option<String>,
    /// Updated on every successful content write
    pub last_sync: Option<DateTime<Utc>>,
}

impl Linkage {
    /// Create a linkage for a (profile, report) pair
    pub fn new(profile_id: impl Into<String>, report_id: impl Into<String>) -> Self {
        Self {
            profile_id: Some(profile_id.into()),
            report_id: Some(report_id.into()),
            ..Self::default()
        }
    }

    pub fn report_name(mut self, name: impl Into<String>) -> Self {
        self.report_name = Some(name.into());
        self
    }

    pub fn network_id(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }

    pub fn setup_user(mut self, email: impl Into<String>) -> Self {
        self.setup_user = Some(email.into());
        self
    }

    pub fn last_sync(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync = Some(at);
        self
    }

    /// Both `profile_id` and `report_id` are present and non-empty
    pub fn is_complete(&self) -> bool {
        matches!(
            (&self.profile_id, &self.report_id),
            (Some(p), Some(r)) if !p.is_empty() && !r.is_empty()
        )
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Raw schedule fields as recorded in document properties.
///
/// Fields are kept as stored strings; `Recurrence::from_parts` gives them
/// meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub frequency: Option<String>,
    pub time: Option<String>,
    pub time2: Option<String>,
    pub created_by: Option<String>,
    pub trigger_id: Option<JobHandle>,
}

impl ScheduleRecord {
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none()
            && self.time.is_none()
            && self.time2.is_none()
            && self.created_by.is_none()
            && self.trigger_id.is_none()
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Generation status of a report file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFileStatus {
    Processing,
    ReportAvailable,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Output format of a report or report file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportFormat {
    Csv,
    Excel,
    #[serde(other)]
    Unknown,
}

/// A generated, downloadable snapshot of a report's data. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFile {
    pub id: String,
    pub status: ReportFileStatus,
    pub format: ReportFormat,
    pub file_name: String,
    /// API download URL; absent until the file is available
    pub api_url: Option<String>,
}

impl ReportFile {
    pub fn new(id: impl Into<String>, status: ReportFileStatus) -> Self {
        let id = id.into();
        Self {
            file_name: format!("{id}.csv"),
            id,
            status,
            format: ReportFormat::Csv,
            api_url: None,
        }
    }

    pub fn format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn is_processing(&self) -> bool {
        self.status == ReportFileStatus::Processing
    }
}

/// Report entry shown in the selection list. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub name: String,
    pub format: ReportFormat,
}

impl ReportSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, format: ReportFormat) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            format,
        }
    }
}

/// One page of the report listing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPage {
    pub items: Vec<ReportSummary>,
    pub next_page_token: Option<String>,
}

/// Sort field for report listings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportSortField {
    Id,
}

impl ReportSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSortField::Id => "ID",
        }
    }
}

/// Sort field for report file listings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileSortField {
    LastModifiedTime,
}

impl FileSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSortField::LastModifiedTime => "LAST_MODIFIED_TIME",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Descending => "DESCENDING",
        }
    }
}

/// Query parameters for `ReportingApi::list_reports`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportListQuery {
    pub sort_field: ReportSortField,
    pub sort_order: SortOrder,
    pub page_token: Option<String>,
}

impl ReportListQuery {
    /// Newest reports first
    pub fn newest_first() -> Self {
        Self {
            sort_field: ReportSortField::Id,
            sort_order: SortOrder::Descending,
            page_token: None,
        }
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Scope of a property bag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Shared by everyone working on the document
    Document,
    /// Private to the current user
    User,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Document => "document",
            Scope::User => "user",
        }
    }
}

/// String-valued key-value persistence with document and user scopes
pub trait PropertyStore {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, scope: Scope, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete(&self, scope: Scope, key: &str) -> Result<(), StoreError>;

    /// Remove every property in the scope
    fn delete_all(&self, scope: Scope) -> Result<(), StoreError>;

    /// Write several properties. Implementations should apply them together.
    fn set_many(&self, scope: Scope, entries: &[(String, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(scope, key, value)?;
        }
        Ok(())
    }

    /// Delete several properties. Implementations should apply them together.
    fn delete_many(&self, scope: Scope, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.delete(scope, key)?;
        }
        Ok(())
    }
}

/// Campaign Manager reporting endpoints.
///
/// `Ok(None)` means the API answered without a result object.
pub trait ReportingApi {
    fn list_reports(
        &self,
        profile_id: &str,
        query: &ReportListQuery,
    ) -> Result<Option<ReportPage>, SyncError>;

    fn list_files(
        &self,
        profile_id: &str,
        report_id: &str,
        sort_field: FileSortField,
    ) -> Result<Option<Vec<ReportFile>>, SyncError>;

    fn get_file(
        &self,
        profile_id: &str,
        report_id: &str,
        file_id: &str,
    ) -> Result<Option<ReportFile>, SyncError>;

    /// Fetch raw file content with a bearer token
    fn download(&self, url: &str, access_token: &str) -> Result<Vec<u8>, SyncError>;
}

/// OAuth2 delegate for the reporting scope
pub trait OAuthDelegate {
    fn has_access(&self) -> bool;

    fn access_token(&self) -> Result<String, SyncError>;

    fn authorization_url(&self) -> String;

    /// Forget any stored token
    fn reset(&self) -> Result<(), SyncError>;
}

/// Platform recurring-job registry, scoped to the current document
pub trait JobScheduler {
    fn create(&self, handler: &str, recurrence: &Recurrence) -> Result<JobHandle, SyncError>;

    fn delete(&self, handle: &str) -> Result<(), SyncError>;

    fn list_active_for_document(&self) -> Result<Vec<JobHandle>, SyncError>;
}

/// The spreadsheet document hosting the tabs
pub trait SheetHost {
    /// Tab ids in document order
    fn tab_ids(&self) -> Result<Vec<TabId>, SyncError>;

    fn tab_name(&self, tab: &str) -> Option<String>;

    /// Clear the tab and write `grid` from the top-left cell, truncating the
    /// tab to the grid's size
    fn replace_contents(&self, tab: &str, grid: &Grid) -> Result<(), SyncError>;

    /// Transient user-visible notification
    fn notify(&self, message: &str);

    fn document_name(&self) -> String;

    fn document_url(&self) -> String;

    fn owner_email(&self) -> String;
}

/// Outgoing mail
pub trait MailNotifier {
    /// Mails left for today
    fn remaining_quota(&self) -> u32;

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SyncError>;
}

/// The signed-in user
pub trait Session {
    fn active_user_email(&self) -> String;
}

/// Wall clock
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// System time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Property store failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid stored value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Sync, fetch and scheduling error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Authorization must be completed before retrying
    #[error("Authorization required: {authorization_url}")]
    AuthRequired { authorization_url: String },

    /// No usable report file
    #[error("Not found: {0}")]
    NotFound(String),

    /// The reporting API returned no result
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Execution time limit reached
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Spreadsheet error: {0}")]
    Host(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, SyncError::AuthRequired { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkage_builder() {
        let linkage = Linkage::new("p1", "r1")
            .report_name("Spend")
            .network_id("n9")
            .setup_user("ana@example.com");

        assert_eq!(linkage.profile_id.as_deref(), Some("p1"));
        assert_eq!(linkage.report_id.as_deref(), Some("r1"));
        assert_eq!(linkage.report_name.as_deref(), Some("Spend"));
        assert_eq!(linkage.network_id.as_deref(), Some("n9"));
        assert_eq!(linkage.setup_user.as_deref(), Some("ana@example.com"));
        assert!(linkage.last_sync.is_none());
        assert!(linkage.is_complete());
    }

    #[test]
    fn partial_linkage_is_incomplete() {
        let only_profile = Linkage {
            profile_id: Some("p1".into()),
            ..Linkage::default()
        };
        assert!(!only_profile.is_complete());

        let empty_report = Linkage::new("p1", "");
        assert!(!empty_report.is_complete());

        assert!(!Linkage::default().is_complete());
    }

    #[test]
    fn report_file_status_wire_names() {
        let status: ReportFileStatus = serde_json::from_str("\"REPORT_AVAILABLE\"").unwrap();
        assert_eq!(status, ReportFileStatus::ReportAvailable);
        let status: ReportFileStatus = serde_json::from_str("\"QUEUED\"").unwrap();
        assert_eq!(status, ReportFileStatus::Unknown);
        let format: ReportFormat = serde_json::from_str("\"CSV\"").unwrap();
        assert_eq!(format, ReportFormat::Csv);
    }

    #[test]
    fn query_defaults_to_newest_first() {
        let query = ReportListQuery::newest_first().page_token("t2");
        assert_eq!(query.sort_field.as_str(), "ID");
        assert_eq!(query.sort_order.as_str(), "DESCENDING");
        assert_eq!(query.page_token.as_deref(), Some("t2"));
    }

    #[test]
    fn schedule_record_emptiness() {
        assert!(ScheduleRecord::default().is_empty());
        let record = ScheduleRecord {
            trigger_id: Some("job-1".into()),
            ..ScheduleRecord::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn auth_required_message_carries_url() {
        let err = SyncError::AuthRequired {
            authorization_url: "https://auth.example/start".into(),
        };
        assert!(err.is_auth_required());
        assert!(err.to_string().contains("https://auth.example/start"));
    }
}
