//! Outgoing mail appended to a JSON-lines outbox.
//!
//! A relay (or a human) picks mails up from the outbox. The daily quota
//! counts the mails written on the current UTC day.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use cmsheets_core::{MailNotifier, SyncError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

pub struct OutboxMailer {
    path: PathBuf,
    daily_quota: u32,
}

impl OutboxMailer {
    pub fn new(path: PathBuf, daily_quota: u32) -> Self {
        Self { path, daily_quota }
    }

    pub fn mails(&self) -> Result<Vec<OutboxMail>, SyncError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        let mut mails = Vec::new();
        for (n, line) in text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(mail) => mails.push(mail),
                Err(err) => warn!(line = n + 1, error = %err, "skipping unreadable outbox line"),
            }
        }
        Ok(mails)
    }

    fn error(&self, err: impl std::fmt::Display) -> SyncError {
        SyncError::Mail(format!("{}: {err}", self.path.display()))
    }
}

impl MailNotifier for OutboxMailer {
    fn remaining_quota(&self) -> u32 {
        let today = Utc::now().date_naive();
        let sent_today = match self.mails() {
            Ok(mails) => mails
                .iter()
                .filter(|m| m.queued_at.date_naive() == today)
                .count() as u32,
            Err(err) => {
                warn!(error = %err, "outbox unreadable; treating quota as spent");
                return 0;
            }
        };
        self.daily_quota.saturating_sub(sent_today)
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SyncError> {
        if to.is_empty() {
            return Err(SyncError::Mail("no recipient configured".into()));
        }
        let mail = OutboxMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            queued_at: Utc::now(),
        };
        let line = serde_json::to_string(&mail).map_err(|e| self.error(e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error(e))?;
        writeln!(file, "{line}").map_err(|e| self.error(e))?;
        info!(to, subject, "mail queued");
        Ok(())
    }
}
