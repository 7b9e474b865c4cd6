//! Timer entry point.
//!
//! Runs when the document's recurring job fires. Without authorization, or
//! when the reporting API refuses the stored token mid-run, the run stops
//! and the owner is mailed at most once per calendar day. Otherwise every
//! linked tab is synced, and a summary mail is sent if any tab failed.

use cmsheets_core::keys::LAST_AUTH_EMAIL_DATE;
use cmsheets_core::{Scope, SyncError};
use tracing::{error, info, warn};

use crate::orchestrator::SyncReport;
use crate::services::Services;

/// Product name used in mail subjects
pub const ADDON_TITLE: &str = "CM Report - Google Sheets Addon";

/// What an offline run did
#[derive(Debug)]
pub enum OfflineRun {
    /// Sync skipped for lack of authorization
    AuthRequired {
        /// An "Authorization Required" mail went out during this run
        mailed: bool,
    },
    Synced(SyncReport),
}

pub struct OfflineSync<'a> {
    services: Services<'a>,
}

impl<'a> OfflineSync<'a> {
    pub fn new(services: Services<'a>) -> Self {
        Self { services }
    }

    pub fn run(&self) -> Result<OfflineRun, SyncError> {
        let s = &self.services;
        let document = s.sheets.document_name();
        let url = s.sheets.document_url();

        if !s.oauth.has_access() {
            warn!(document = %document, url = %url, "offline sync needs authorization");
            let mailed = self.notify_auth_required()?;
            return Ok(OfflineRun::AuthRequired { mailed });
        }

        info!(document = %document, url = %url, "offline sync started");
        let report = s.orchestrator().sync_all()?;
        if report.auth_required() {
            warn!(document = %document, url = %url, "stored token refused; offline sync stopped");
            let mailed = self.notify_auth_required()?;
            return Ok(OfflineRun::AuthRequired { mailed });
        }
        if report.has_failures() {
            self.notify_failures(&report);
        }
        info!(document = %document, written = report.written(), "offline sync finished");
        Ok(OfflineRun::Synced(report))
    }

    /// Mail the owner unless already done today. The date is recorded even
    /// when the quota is spent, so an exhausted quota does not cause retries
    /// later the same day.
    fn notify_auth_required(&self) -> Result<bool, SyncError> {
        let s = &self.services;
        let today = s.clock.now().date_naive().to_string();
        let last = s.store.get(Scope::Document, LAST_AUTH_EMAIL_DATE)?;
        if last.as_deref() == Some(today.as_str()) {
            return Ok(false);
        }

        let mut mailed = false;
        if s.mailer.remaining_quota() > 0 {
            let body = format!(
                "The scheduled report sync for \"{}\" ({}) could not run because \
                 {ADDON_TITLE} is no longer authorized.\n\n\
                 Authorize it again here: {}\n",
                s.sheets.document_name(),
                s.sheets.document_url(),
                s.oauth.authorization_url()
            );
            match s.mailer.send(
                &s.sheets.owner_email(),
                &format!("{ADDON_TITLE} - Authorization Required"),
                &body,
            ) {
                Ok(()) => mailed = true,
                Err(err) => error!(error = %err, "authorization mail not sent"),
            }
        }
        s.store.set(Scope::Document, LAST_AUTH_EMAIL_DATE, &today)?;
        Ok(mailed)
    }

    fn notify_failures(&self, report: &SyncReport) {
        let s = &self.services;
        if s.mailer.remaining_quota() == 0 {
            warn!("mail quota exhausted; offline sync failures not mailed");
            return;
        }

        let url = s.sheets.document_url();
        let mut body = String::new();
        for (tab, err) in report.failures() {
            let name = s.sheets.tab_name(tab).unwrap_or_else(|| tab.to_string());
            body.push_str(&format!("Sheet: {name}\nSheet URL: {url}#gid={tab}\nError: {err}\n\n"));
        }
        if let Err(err) = s.mailer.send(
            &s.sheets.owner_email(),
            &format!("{ADDON_TITLE} - Offline Sync Failed"),
            &body,
        ) {
            error!(error = %err, "failure summary mail not sent");
        }
    }
}
