use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AdminMetrics {
    #[serde(default)]
    pub total_users: i64,
    #[serde(default)]
    pub total_clubs: i64,
    #[serde(default)]
    pub pending_requests: i64,
    #[serde(default)]
    pub upcoming_events: i64,
    #[serde(default)]
    pub clubs_by_category: BTreeMap<String, i64>,
}
