use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Announcement {
    pub id: i64,
    pub club_id: i64,
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<String>,
}
