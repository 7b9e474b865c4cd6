//! Campaign Manager reporting API over HTTPS.

use std::time::Duration;

use cmsheets_core::{
    FileSortField, OAuthDelegate, ReportFile, ReportFileStatus, ReportFormat, ReportListQuery,
    ReportPage, ReportSummary, ReportingApi, SyncError,
};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::ApiConfig;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportListWire {
    #[serde(default)]
    items: Vec<ReportWire>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportWire {
    id: String,
    #[serde(default)]
    name: String,
    format: Option<ReportFormat>,
}

#[derive(Debug, Deserialize)]
struct FileListWire {
    #[serde(default)]
    items: Vec<FileWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileWire {
    id: String,
    status: Option<ReportFileStatus>,
    format: Option<ReportFormat>,
    file_name: Option<String>,
    urls: Option<FileUrlsWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUrlsWire {
    api_url: Option<String>,
}

impl From<ReportWire> for ReportSummary {
    fn from(wire: ReportWire) -> Self {
        ReportSummary::new(wire.id, wire.name, wire.format.unwrap_or(ReportFormat::Unknown))
    }
}

impl From<FileWire> for ReportFile {
    fn from(wire: FileWire) -> Self {
        let mut file = ReportFile::new(wire.id, wire.status.unwrap_or(ReportFileStatus::Unknown))
            .format(wire.format.unwrap_or(ReportFormat::Unknown));
        if let Some(name) = wire.file_name {
            file = file.file_name(name);
        }
        if let Some(url) = wire.urls.and_then(|u| u.api_url) {
            file = file.api_url(url);
        }
        file
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct HttpReportingApi<'a> {
    client: Client,
    base_url: String,
    oauth: &'a dyn OAuthDelegate,
}

impl<'a> HttpReportingApi<'a> {
    pub fn new(config: &ApiConfig, oauth: &'a dyn OAuthDelegate) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cmsheets/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Api(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            oauth,
        })
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, SyncError> {
        let token = self.oauth.access_token()?;
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .map_err(|e| SyncError::Api(e.to_string()))?;

        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(response),
            status => {
                let body = response.text().unwrap_or_default();
                Err(self.status_error(status, url, &body))
            }
        }
    }

    /// 401 means the token was refused; anything else is an API failure
    fn status_error(&self, status: StatusCode, url: &str, body: &str) -> SyncError {
        if status == StatusCode::UNAUTHORIZED {
            SyncError::AuthRequired {
                authorization_url: self.oauth.authorization_url(),
            }
        } else {
            SyncError::Api(format!("{status} from {url}: {}", body.trim()))
        }
    }

    /// JSON body, or `None` when the resource does not exist
    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, SyncError> {
        let response = self.get(url, query)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response
            .json()
            .map(Some)
            .map_err(|e| SyncError::Api(format!("unexpected response from {url}: {e}")))
    }
}

impl ReportingApi for HttpReportingApi<'_> {
    fn list_reports(
        &self,
        profile_id: &str,
        query: &ReportListQuery,
    ) -> Result<Option<ReportPage>, SyncError> {
        let url = format!("{}/userprofiles/{profile_id}/reports", self.base_url);
        let mut params = vec![
            ("sortField", query.sort_field.as_str()),
            ("sortOrder", query.sort_order.as_str()),
        ];
        if let Some(token) = query.page_token.as_deref() {
            params.push(("pageToken", token));
        }
        let page: Option<ReportListWire> = self.get_json(&url, &params)?;
        Ok(page.map(|p| ReportPage {
            items: p.items.into_iter().map(ReportSummary::from).collect(),
            next_page_token: p.next_page_token,
        }))
    }

    fn list_files(
        &self,
        profile_id: &str,
        report_id: &str,
        sort_field: FileSortField,
    ) -> Result<Option<Vec<ReportFile>>, SyncError> {
        let url = format!(
            "{}/userprofiles/{profile_id}/reports/{report_id}/files",
            self.base_url
        );
        let params = [("sortField", sort_field.as_str()), ("sortOrder", "DESCENDING")];
        let list: Option<FileListWire> = self.get_json(&url, &params)?;
        Ok(list.map(|l| l.items.into_iter().map(ReportFile::from).collect()))
    }

    fn get_file(
        &self,
        profile_id: &str,
        report_id: &str,
        file_id: &str,
    ) -> Result<Option<ReportFile>, SyncError> {
        let url = format!(
            "{}/userprofiles/{profile_id}/reports/{report_id}/files/{file_id}",
            self.base_url
        );
        let file: Option<FileWire> = self.get_json(&url, &[])?;
        Ok(file.map(ReportFile::from))
    }

    fn download(&self, url: &str, access_token: &str) -> Result<Vec<u8>, SyncError> {
        debug!(url, "downloading report file");
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .map_err(|e| SyncError::Api(format!("download failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.status_error(status, url, &body));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| SyncError::Api(format!("download failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::oauth::PropertyOAuth;
    use cmsheets_core::memory::MemoryPropertyStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_wire_maps_to_report_file() {
        let wire: FileWire = serde_json::from_str(
            r#"{
                "id": "9001",
                "status": "REPORT_AVAILABLE",
                "format": "CSV",
                "fileName": "spend_2026.csv",
                "urls": { "apiUrl": "https://files.example/9001?alt=media" }
            }"#,
        )
        .unwrap();

        let file = ReportFile::from(wire);

        assert_eq!(file.id, "9001");
        assert_eq!(file.status, ReportFileStatus::ReportAvailable);
        assert_eq!(file.format, ReportFormat::Csv);
        assert_eq!(file.file_name, "spend_2026.csv");
        assert_eq!(file.api_url.as_deref(), Some("https://files.example/9001?alt=media"));
    }

    #[test]
    fn processing_file_has_no_url() {
        let wire: FileWire =
            serde_json::from_str(r#"{ "id": "1", "status": "PROCESSING" }"#).unwrap();
        let file = ReportFile::from(wire);
        assert!(file.is_processing());
        assert_eq!(file.api_url, None);
    }

    #[test]
    fn report_list_page() {
        let wire: ReportListWire = serde_json::from_str(
            r#"{
                "kind": "dfareporting#reportList",
                "items": [
                    { "id": "12", "name": "Spend", "format": "CSV" },
                    { "id": "11", "name": "Reach", "format": "EXCEL" }
                ],
                "nextPageToken": "abc"
            }"#,
        )
        .unwrap();

        assert_eq!(wire.next_page_token.as_deref(), Some("abc"));
        let items: Vec<ReportSummary> = wire.items.into_iter().map(ReportSummary::from).collect();
        assert_eq!(items[1].format, ReportFormat::Excel);
    }

    #[test]
    fn refused_token_maps_to_auth_required() {
        let props = MemoryPropertyStore::new();
        let oauth = PropertyOAuth::new(&props, OAuthConfig::default());
        let api = HttpReportingApi::new(&ApiConfig::default(), &oauth).unwrap();

        let refused = api.status_error(StatusCode::UNAUTHORIZED, "https://files/1", "");
        let forbidden = api.status_error(StatusCode::FORBIDDEN, "https://files/1", " denied ");

        assert!(refused.is_auth_required());
        assert_eq!(forbidden.to_string(), "API error: 403 Forbidden from https://files/1: denied");
    }

    #[test]
    fn empty_list_has_no_items() {
        let wire: FileListWire = serde_json::from_str(r#"{ "kind": "x" }"#).unwrap();
        assert!(wire.items.is_empty());
    }
}
