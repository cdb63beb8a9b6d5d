use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    /// Unrounded rating movement.
    pub delta: f64,
    pub new_rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingAdjustment {
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub winner: RatingChange,
    pub loser: RatingChange,
}
