//! Latest report file lookup and download.

use cmsheets_core::{FileSortField, OAuthDelegate, ReportFile, ReportingApi, SyncError};
use tracing::debug;

/// Finds the newest usable file of a report and downloads it
pub struct ReportFileFetcher<'a> {
    api: &'a dyn ReportingApi,
    oauth: &'a dyn OAuthDelegate,
}

impl<'a> ReportFileFetcher<'a> {
    pub fn new(api: &'a dyn ReportingApi, oauth: &'a dyn OAuthDelegate) -> Self {
        Self { api, oauth }
    }

    /// The most recently modified file that is not still processing.
    ///
    /// Only one file is generated at a time, so when the newest file is still
    /// processing the next one down is taken; no further files are examined.
    pub fn latest_file(&self, profile_id: &str, report_id: &str) -> Result<ReportFile, SyncError> {
        let files = self
            .api
            .list_files(profile_id, report_id, FileSortField::LastModifiedTime)?
            .ok_or_else(|| {
                SyncError::Upstream(format!(
                    "cannot fetch files of report {report_id}; check that the report has generated files"
                ))
            })?;

        let candidate = match files.first() {
            Some(first) if !first.is_processing() => Some(first),
            _ => files.get(1),
        }
        .ok_or_else(|| {
            SyncError::NotFound(format!("no files found for report {report_id}"))
        })?;
        debug!(report_id, file_id = %candidate.id, "selected report file");

        self.api
            .get_file(profile_id, report_id, &candidate.id)?
            .ok_or_else(|| {
                SyncError::Upstream(format!(
                    "report file {} of report {report_id} could not be fetched",
                    candidate.id
                ))
            })
    }

    /// Raw file content.
    ///
    /// Fails with `AuthRequired` before any request when the user has not
    /// authorized access.
    pub fn download(&self, file: &ReportFile) -> Result<Vec<u8>, SyncError> {
        if !self.oauth.has_access() {
            return Err(SyncError::AuthRequired {
                authorization_url: self.oauth.authorization_url(),
            });
        }
        let url = file.api_url.as_deref().ok_or_else(|| {
            SyncError::NotFound(format!("report file {} has no download url", file.id))
        })?;
        let token = self.oauth.access_token()?;
        self.api.download(url, &token)
    }
}
