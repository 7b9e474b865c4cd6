//! A spreadsheet document kept as a directory of CSV files.
//!
//! `tabs.json` lists the tabs in document order; each tab's cells live in
//! `<tab id>.csv` next to it.

use std::fs;
use std::path::{Path, PathBuf};

use cmsheets_core::{Grid, SheetHost, SyncError, TabId};
use serde::{Deserialize, Serialize};

use crate::config::DocumentConfig;

const MANIFEST: &str = "tabs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabEntry {
    pub id: TabId,
    pub name: String,
}

pub struct CsvDirSheets {
    dir: PathBuf,
    document: DocumentConfig,
}

impl CsvDirSheets {
    pub fn new(document: &DocumentConfig) -> Self {
        Self {
            dir: document.tabs_dir.clone(),
            document: document.clone(),
        }
    }

    pub fn tabs(&self) -> Result<Vec<TabEntry>, SyncError> {
        let path = self.dir.join(MANIFEST);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| host_error(&path, e))?;
        serde_json::from_str(&text).map_err(|e| host_error(&path, e))
    }

    /// Register a tab; an existing id is renamed
    pub fn add_tab(&self, id: &str, name: &str) -> Result<(), SyncError> {
        let mut tabs = self.tabs()?;
        match tabs.iter_mut().find(|t| t.id == id) {
            Some(tab) => tab.name = name.to_string(),
            None => tabs.push(TabEntry {
                id: id.to_string(),
                name: name.to_string(),
            }),
        }
        let json = serde_json::to_string_pretty(&tabs).map_err(|e| host_error(&self.dir, e))?;
        write_atomically(&self.dir.join(MANIFEST), json.as_bytes())
    }

    pub fn tab_path(&self, tab: &str) -> PathBuf {
        self.dir.join(format!("{tab}.csv"))
    }
}

impl SheetHost for CsvDirSheets {
    fn tab_ids(&self) -> Result<Vec<TabId>, SyncError> {
        Ok(self.tabs()?.into_iter().map(|t| t.id).collect())
    }

    fn tab_name(&self, tab: &str) -> Option<String> {
        self.tabs()
            .ok()?
            .into_iter()
            .find(|t| t.id == tab)
            .map(|t| t.name)
    }

    fn replace_contents(&self, tab: &str, grid: &Grid) -> Result<(), SyncError> {
        if self.tab_name(tab).is_none() {
            return Err(SyncError::Host(format!("no tab with id {tab}")));
        }
        let path = self.tab_path(tab);
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in grid {
            writer.write_record(row).map_err(|e| host_error(&path, e))?;
        }
        let bytes = writer.into_inner().map_err(|e| host_error(&path, e))?;
        write_atomically(&path, &bytes)
    }

    fn notify(&self, message: &str) {
        eprintln!("[{}] {message}", self.document.name);
    }

    fn document_name(&self) -> String {
        self.document.name.clone()
    }

    fn document_url(&self) -> String {
        if self.document.url.is_empty() {
            format!("file://{}", self.dir.display())
        } else {
            self.document.url.clone()
        }
    }

    fn owner_email(&self) -> String {
        self.document.owner.clone()
    }
}

fn host_error(path: &Path, err: impl std::fmt::Display) -> SyncError {
    SyncError::Host(format!("{}: {err}", path.display()))
}

/// Write to a sibling temp file, then rename over the target
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| host_error(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| host_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| host_error(path, e))
}
