use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Two-player ranked session. Matches accumulate until the session is closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LadderSession {
    pub id: Uuid,
    pub active: bool,
    pub member_ids: Vec<Uuid>,
    pub match_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl LadderSession {
    pub fn new(member_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            active: true,
            member_ids,
            match_ids: vec![],
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLadderRequest {
    #[serde(default)]
    pub discord_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppendLadderMatchRequest {
    #[validate(length(min = 1, max = 128))]
    pub combat_id: String,
}
