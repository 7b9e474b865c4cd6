//! # cmsheets-sync
//!
//! Report sync state machine for cmsheets.
//!
//! This crate provides:
//! - `LinkageStore`: per-tab linkage records in document properties
//! - `ReportFileFetcher`: latest usable report file and its content
//! - `grid::transform`: CSV report to display grid
//! - `SyncOrchestrator`: single-tab and whole-document syncs
//! - `ScheduleManager`: the document's single recurring sync job
//! - `ReportCatalogPager`: CSV reports available to a profile
//! - `OfflineSync` and `Addon`: timer and menu entry points
//!
//! All components borrow their collaborators; see `Services` for the bundle
//! an entry point is given.
//!
//! ## Example
//!
//! ```rust
//! use cmsheets_core::memory::{FixedSession, MemoryPropertyStore, MemoryScheduler};
//! use cmsheets_sync::ScheduleManager;
//!
//! let props = MemoryPropertyStore::new();
//! let jobs = MemoryScheduler::new();
//! let session = FixedSession("ana@example.com".into());
//!
//! let schedule = ScheduleManager::new(&props, &jobs, &session);
//! let text = schedule.set_from_parts(true, "daily", "2", None).unwrap();
//! assert_eq!(text, "Current Sync Schedule: Daily between 2am to 3am. Created by: ana@example.com");
//! ```

pub mod actions;
pub mod catalog;
pub mod fetcher;
pub mod grid;
pub mod linkage;
pub mod offline;
pub mod orchestrator;
pub mod schedule;
pub mod services;

pub use actions::{Addon, LastSyncDetails, LinkRequest};
pub use catalog::{ReportCatalogPager, ReportPages, MAX_LISTED_REPORTS};
pub use fetcher::ReportFileFetcher;
pub use linkage::LinkageStore;
pub use offline::{OfflineRun, OfflineSync};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport, TabSync};
pub use schedule::ScheduleManager;
pub use services::Services;
