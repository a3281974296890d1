use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Club {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "logo")]
    pub logo_url: Option<String>,
    #[serde(default, alias = "members_count")]
    pub member_count: Option<i64>,
}

impl Club {
    pub fn display_member_count(&self) -> String {
        match self.member_count {
            Some(1) => "1 member".to_string(),
            Some(count) => format!("{} members", count),
            None => "Unknown".to_string(),
        }
    }
}

/// One named group of the club directory (`academics`, `sports`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ClubCategory {
    pub name: String,
    pub clubs: Vec<Club>,
}

impl ClubCategory {
    /// Category key as shown to users: `student_government` -> `Student Government`.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            return "All Clubs".to_string();
        }
        self.name
            .split(['_', '-', ' '])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Flatten a directory into one list, keeping category order.
    pub fn flatten(categories: &[ClubCategory]) -> Vec<&Club> {
        categories.iter().flat_map(|c| c.clubs.iter()).collect()
    }
}
