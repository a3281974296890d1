use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum AttendanceStatus {
    Present,
    Absent,
    Excused,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::Absent => write!(f, "Absent"),
            AttendanceStatus::Excused => write!(f, "Excused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceRecord {
    pub event_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    /// Count of records per status, in `Present, Absent, Excused` order.
    pub fn tally(records: &[AttendanceRecord]) -> (usize, usize, usize) {
        records.iter().fold((0, 0, 0), |(p, a, e), r| match r.status {
            AttendanceStatus::Present => (p + 1, a, e),
            AttendanceStatus::Absent => (p, a + 1, e),
            AttendanceStatus::Excused => (p, a, e + 1),
        })
    }
}
