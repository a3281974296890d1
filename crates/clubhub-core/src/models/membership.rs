use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum MemberRole {
    Member,
    Officer,
    Adviser,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Member => write!(f, "Member"),
            MemberRole::Officer => write!(f, "Officer"),
            MemberRole::Adviser => write!(f, "Adviser"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Approved => "approved",
            MembershipStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(MembershipStatus::Pending),
            "approved" | "approve" | "accepted" => Some(MembershipStatus::Approved),
            "rejected" | "reject" | "declined" => Some(MembershipStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipStatus::Pending => write!(f, "Pending"),
            MembershipStatus::Approved => write!(f, "Approved"),
            MembershipStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A user's relation to a club. Created pending by a join request, decided by
/// an officer or admin, removed on cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Membership {
    pub club_id: i64,
    pub user_id: i64,
    #[serde(default = "default_role")]
    pub role: MemberRole,
    pub status: MembershipStatus,
    #[serde(default, alias = "position")]
    pub officer_title: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub requested_at: Option<String>,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

impl Membership {
    pub fn is_pending(&self) -> bool {
        self.status == MembershipStatus::Pending
    }

    /// Officers and advisers manage a club's requests, events and tasks.
    pub fn can_manage(&self) -> bool {
        self.status == MembershipStatus::Approved
            && matches!(self.role, MemberRole::Officer | MemberRole::Adviser)
    }

    pub fn display_role(&self) -> String {
        match (&self.role, &self.officer_title) {
            (MemberRole::Officer, Some(title)) if !title.is_empty() => title.clone(),
            (role, _) => role.to_string(),
        }
    }
}
