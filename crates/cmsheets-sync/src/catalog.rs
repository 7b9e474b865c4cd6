//! Report catalog for the selection list.
//!
//! The reporting API pages its listing. `ReportPages` walks those pages one
//! request at a time; `ReportCatalogPager::list` consumes it until enough
//! CSV reports are collected or the listing runs out.

use cmsheets_core::{
    ReportFormat, ReportListQuery, ReportPage, ReportSummary, ReportingApi, SyncError,
};
use tracing::debug;

/// Pagination stops once this many CSV reports are collected
pub const MAX_LISTED_REPORTS: usize = 40;

/// Lazy, finite walk over the report listing of one profile.
///
/// Each `next` issues one request. The walk ends after a page without a
/// continuation token, or after the first error. It cannot be restarted.
pub struct ReportPages<'a> {
    api: &'a dyn ReportingApi,
    profile_id: String,
    next_token: Option<String>,
    started: bool,
    finished: bool,
}

impl<'a> ReportPages<'a> {
    pub fn new(api: &'a dyn ReportingApi, profile_id: impl Into<String>) -> Self {
        Self {
            api,
            profile_id: profile_id.into(),
            next_token: None,
            started: false,
            finished: false,
        }
    }

    /// Token of the last page fetched, if it had one
    pub fn last_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }
}

impl Iterator for ReportPages<'_> {
    type Item = Result<ReportPage, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || (self.started && self.next_token.is_none()) {
            return None;
        }
        self.started = true;

        let mut query = ReportListQuery::newest_first();
        query.page_token = self.next_token.clone();

        let page = match self.api.list_reports(&self.profile_id, &query) {
            Ok(Some(page)) => page,
            Ok(None) => {
                self.finished = true;
                return Some(Err(SyncError::Upstream(
                    "unable to fetch reports from Campaign Manager".into(),
                )));
            }
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
        };
        self.next_token = page.next_page_token.clone().filter(|t| !t.is_empty());
        Some(Ok(page))
    }
}

/// Lists the CSV reports of a profile, newest first
pub struct ReportCatalogPager<'a> {
    api: &'a dyn ReportingApi,
}

impl<'a> ReportCatalogPager<'a> {
    pub fn new(api: &'a dyn ReportingApi) -> Self {
        Self { api }
    }

    /// CSV reports plus the token of the last page read.
    ///
    /// The token may be present even though reading stopped at the report
    /// limit; it is not a signal that nothing was returned.
    pub fn list(&self, profile_id: &str) -> Result<(Vec<ReportSummary>, Option<String>), SyncError> {
        let mut pages = ReportPages::new(self.api, profile_id);
        let mut reports = Vec::new();

        while reports.len() < MAX_LISTED_REPORTS {
            let Some(page) = pages.next() else { break };
            let page = page?;
            reports.extend(
                page.items
                    .into_iter()
                    .filter(|r| r.format == ReportFormat::Csv),
            );
            debug!(profile_id, collected = reports.len(), "report page read");
        }

        Ok((reports, pages.last_token().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmsheets_core::memory::MemoryReportingApi;

    fn page(ids: &[&str], format: ReportFormat, token: Option<&str>) -> ReportPage {
        ReportPage {
            items: ids
                .iter()
                .map(|id| ReportSummary::new(*id, format!("Report {id}"), format))
                .collect(),
            next_page_token: token.map(str::to_string),
        }
    }

    #[test]
    fn single_page_without_token() {
        let api = MemoryReportingApi::new().with_page("p", None, page(&["3", "2"], ReportFormat::Csv, None));
        let (reports, token) = ReportCatalogPager::new(&api).list("p").unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(token, None);
    }

    #[test]
    fn non_csv_reports_are_filtered() {
        let mut mixed = page(&["5", "4"], ReportFormat::Csv, None);
        mixed.items.push(ReportSummary::new("3", "Excel one", ReportFormat::Excel));
        let api = MemoryReportingApi::new().with_page("p", None, mixed);

        let (reports, _) = ReportCatalogPager::new(&api).list("p").unwrap();
        assert_eq!(
            reports.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["5", "4"]
        );
    }

    #[test]
    fn missing_page_is_upstream_error() {
        let api = MemoryReportingApi::new()
            .with_page("p", None, page(&["1"], ReportFormat::Csv, Some("t1")));
        let err = ReportCatalogPager::new(&api).list("p").unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));
    }

    #[test]
    fn pages_iterator_is_finite() {
        let api = MemoryReportingApi::new()
            .with_page("p", None, page(&["2"], ReportFormat::Csv, Some("t1")))
            .with_page("p", Some("t1"), page(&["1"], ReportFormat::Csv, None));
        let mut pages = ReportPages::new(&api, "p");
        assert!(pages.next().unwrap().is_ok());
        assert!(pages.next().unwrap().is_ok());
        assert!(pages.next().is_none());
        assert!(pages.next().is_none());
        assert_eq!(api.requests().len(), 2);
    }

    #[test]
    fn empty_token_ends_the_walk() {
        let api = MemoryReportingApi::new()
            .with_page("p", None, page(&["1"], ReportFormat::Csv, Some("")));
        let (reports, token) = ReportCatalogPager::new(&api).list("p").unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(token, None);
    }
}
