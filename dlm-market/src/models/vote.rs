//! Verification votes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Yes,
    No,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Yes => "YES",
            Vote::No => "NO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "YES" => Some(Vote::Yes),
            "NO" => Some(Vote::No),
            _ => None,
        }
    }
}

/// A persisted vote
#[derive(Debug, Clone, Serialize)]
pub struct VoteRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub verifier_id: Uuid,
    pub vote: Vote,
    pub created_at: DateTime<Utc>,
}
