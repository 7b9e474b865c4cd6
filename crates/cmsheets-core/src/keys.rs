//! Property key layout.
//!
//! Per-tab linkage fields live in document properties under
//! `{tab_id}{SUFFIX}`; the schedule lives in document properties under fixed
//! names. The layout is shared with documents linked by earlier releases, so
//! the strings must not change.

// Per-tab suffixes
pub const SUFFIX_PROFILE_ID: &str = "_PROFILE_ID";
pub const SUFFIX_REPORT_ID: &str = "_REPORT_ID";
pub const SUFFIX_REPORT_NAME: &str = "_REPORT_NAME";
pub const SUFFIX_NETWORK_ID: &str = "_NETWORK_ID";
pub const SUFFIX_SETUP_USER: &str = "_DCM_REPORT_SETUP_USER";
pub const SUFFIX_LAST_SYNC: &str = "_LAST_SYNC";

// Left behind by sibling add-ons that shared the document
pub const SUFFIX_BUCKET_NAME: &str = "_BUCKET_NAME";
pub const SUFFIX_DBM_REPORT_UPDATED_DATE: &str = "_DBM_REPORT_UPDATED_DATE";
pub const SUFFIX_WEBQUERY_URL: &str = "_WEBQUERY_URL";

// Document-scoped schedule
pub const SCHEDULE_FREQUENCY: &str = "DCM_Schedule_Frequency";
pub const SCHEDULE_TIME: &str = "DCM_Schedule_Time";
pub const SCHEDULE_TIME2: &str = "DCM_Schedule_Time2";
pub const TRIGGER_CREATED_BY: &str = "DCM_Trigger_Created_By";
pub const TRIGGER_ID: &str = "DCM_Trigger_ID";

/// Every schedule property, in deletion order
pub const SCHEDULE_KEYS: [&str; 5] = [
    SCHEDULE_FREQUENCY,
    SCHEDULE_TIME,
    SCHEDULE_TIME2,
    TRIGGER_CREATED_BY,
    TRIGGER_ID,
];

/// Date of the last "authorization required" mail (document scope)
pub const LAST_AUTH_EMAIL_DATE: &str = "lastAuthEmailDate";

/// Handler name registered with the job scheduler for offline sync
pub const OFFLINE_SYNC_HANDLER: &str = "DCM_offlineReportSync";

/// Key for a per-tab field
pub fn tab_key(tab: &str, suffix: &str) -> String {
    format!("{tab}{suffix}")
}

/// Every linkage field of a tab, removed together on unlink
pub fn linkage_keys(tab: &str) -> Vec<String> {
    [
        SUFFIX_NETWORK_ID,
        SUFFIX_REPORT_NAME,
        SUFFIX_SETUP_USER,
        SUFFIX_REPORT_ID,
        SUFFIX_PROFILE_ID,
        SUFFIX_LAST_SYNC,
    ]
    .iter()
    .map(|suffix| tab_key(tab, suffix))
    .collect()
}

/// Legacy keys cleared whenever a tab is (re)linked
pub fn legacy_keys(tab: &str) -> Vec<String> {
    [
        SUFFIX_BUCKET_NAME,
        SUFFIX_DBM_REPORT_UPDATED_DATE,
        SUFFIX_WEBQUERY_URL,
    ]
    .iter()
    .map(|suffix| tab_key(tab, suffix))
    .collect()
}
