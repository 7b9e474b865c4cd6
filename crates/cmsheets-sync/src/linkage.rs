//! Tab-to-report linkage persisted in document properties.

use chrono::{DateTime, SecondsFormat, Utc};
use cmsheets_core::keys::{self, tab_key};
use cmsheets_core::{Linkage, PropertyStore, Scope, SyncError, TabId};
use tracing::warn;

/// Reads and writes `Linkage` records for the tabs of one document
pub struct LinkageStore<'a> {
    store: &'a dyn PropertyStore,
}

impl<'a> LinkageStore<'a> {
    pub fn new(store: &'a dyn PropertyStore) -> Self {
        Self { store }
    }

    /// The tab's linkage, or `None` when the tab is not linked.
    ///
    /// A tab missing either the profile id or the report id is reported as
    /// unlinked whatever else is stored. Store failures are logged and also
    /// reported as unlinked.
    pub fn read(&self, tab: &str) -> Option<Linkage> {
        let linkage = self.load(tab);
        linkage.is_complete().then_some(linkage)
    }

    /// Every stored field, including those of a partial linkage
    pub fn load(&self, tab: &str) -> Linkage {
        Linkage {
            profile_id: self.field(tab, keys::SUFFIX_PROFILE_ID),
            report_id: self.field(tab, keys::SUFFIX_REPORT_ID),
            report_name: self.field(tab, keys::SUFFIX_REPORT_NAME),
            network_id: self.field(tab, keys::SUFFIX_NETWORK_ID),
            setup_user: self.field(tab, keys::SUFFIX_SETUP_USER),
            last_sync: self
                .field(tab, keys::SUFFIX_LAST_SYNC)
                .and_then(|raw| parse_timestamp(tab, &raw)),
        }
    }

    /// Merge the present fields of `linkage` into the tab's record.
    ///
    /// Absent fields are left as they are; only `unlink` removes fields.
    pub fn write(&self, tab: &str, linkage: &Linkage) -> Result<(), SyncError> {
        let fields = [
            (keys::SUFFIX_PROFILE_ID, linkage.profile_id.clone()),
            (keys::SUFFIX_REPORT_ID, linkage.report_id.clone()),
            (keys::SUFFIX_REPORT_NAME, linkage.report_name.clone()),
            (keys::SUFFIX_NETWORK_ID, linkage.network_id.clone()),
            (keys::SUFFIX_SETUP_USER, linkage.setup_user.clone()),
            (
                keys::SUFFIX_LAST_SYNC,
                linkage.last_sync.map(format_timestamp),
            ),
        ];
        let entries: Vec<(String, String)> = fields
            .into_iter()
            .filter_map(|(suffix, value)| value.map(|v| (tab_key(tab, suffix), v)))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        self.store.set_many(Scope::Document, &entries)?;
        Ok(())
    }

    /// Make `linkage` the tab's whole record. Fields absent from `linkage`
    /// are removed.
    pub fn replace(&self, tab: &str, linkage: &Linkage) -> Result<(), SyncError> {
        self.unlink(tab)?;
        self.write(tab, linkage)
    }

    /// Record a successful content write
    pub fn touch(&self, tab: &str, at: DateTime<Utc>) -> Result<(), SyncError> {
        self.write(
            tab,
            &Linkage {
                last_sync: Some(at),
                ..Linkage::default()
            },
        )
    }

    /// Remove every linkage field of the tab in one store operation
    pub fn unlink(&self, tab: &str) -> Result<(), SyncError> {
        self.store
            .delete_many(Scope::Document, &keys::linkage_keys(tab))?;
        Ok(())
    }

    pub fn unlink_all(&self, tabs: &[TabId]) -> Result<(), SyncError> {
        for tab in tabs {
            self.unlink(tab)?;
        }
        Ok(())
    }

    /// Drop keys written by sibling add-ons for this tab
    pub fn clear_legacy(&self, tab: &str) -> Result<(), SyncError> {
        self.store
            .delete_many(Scope::Document, &keys::legacy_keys(tab))?;
        Ok(())
    }

    /// Human-readable summary of the tab's linkage, empty when nothing is stored
    pub fn describe(&self, tab: &str) -> String {
        let linkage = self.load(tab);
        let mut parts = Vec::new();
        if let Some(network) = &linkage.network_id {
            parts.push(format!("Currently Linked Network ID: {network}"));
        }
        if let Some(name) = &linkage.report_name {
            parts.push(format!("Currently Linked Report Name: {name}"));
        }
        if let Some(user) = &linkage.setup_user {
            parts.push(format!("Setup by: {user}"));
        }
        parts.join(". ")
    }

    fn field(&self, tab: &str, suffix: &str) -> Option<String> {
        let key = tab_key(tab, suffix);
        match self.store.get(Scope::Document, &key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(key = %key, error = %err, "linkage field unreadable");
                None
            }
        }
    }
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(tab: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(err) => {
            warn!(tab, value = raw, error = %err, "ignoring unparseable last sync timestamp");
            None
        }
    }
}
