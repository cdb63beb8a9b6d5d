use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::match_model::{PlayerColor, MAX_PLAYERS_PER_MATCH};

/// Bracket sizes a tournament may be created with.
pub const SUPPORTED_ROSTER_SIZES: [u32; 5] = [4, 8, 16, 32, 64];

/// Round number of the final. Earlier rounds carry larger numbers.
pub const FINAL_ROUND: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFormat {
    Bo1,
    Bo3,
    Bo5,
}

impl SeriesFormat {
    pub fn games(&self) -> u32 {
        match self {
            SeriesFormat::Bo1 => 1,
            SeriesFormat::Bo3 => 3,
            SeriesFormat::Bo5 => 5,
        }
    }

    /// Wins needed to take the series.
    pub fn wins_required(&self) -> u32 {
        self.games() / 2 + 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesFormat::Bo1 => "bo1",
            SeriesFormat::Bo3 => "bo3",
            SeriesFormat::Bo5 => "bo5",
        }
    }
}

impl std::fmt::Display for SeriesFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SeriesFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bo1" => Ok(SeriesFormat::Bo1),
            "bo3" => Ok(SeriesFormat::Bo3),
            "bo5" => Ok(SeriesFormat::Bo5),
            other => Err(format!("unknown series format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundSlot {
    pub user_id: Uuid,
    pub color: PlayerColor,
    pub win_count: u32,
}

/// One node of the single-elimination tree.
///
/// Nodes are numbered heap style: the final is 1 and the children of `n`
/// are `2n` and `2n + 1`. `stage` is the depth counted from the final, so
/// the first played stage carries the largest value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_number: u32,
    pub stage: u32,
    pub parent_round_number: Option<u32>,
    pub child_round_numbers: Vec<u32>,
    pub players: Vec<RoundSlot>,
    pub match_ids: Vec<String>,
    pub format: SeriesFormat,
    pub winner_id: Option<Uuid>,
}

impl Round {
    pub fn is_final(&self) -> bool {
        self.round_number == FINAL_ROUND
    }

    pub fn is_leaf(&self) -> bool {
        self.child_round_numbers.is_empty()
    }

    /// Both sides of the series are known.
    pub fn is_seated(&self) -> bool {
        self.players.len() == MAX_PLAYERS_PER_MATCH
    }

    pub fn win_threshold(&self) -> u32 {
        self.format.wins_required()
    }

    pub fn slot(&self, user_id: Uuid) -> Option<&RoundSlot> {
        self.players.iter().find(|s| s.user_id == user_id)
    }

    pub fn slot_mut(&mut self, user_id: Uuid) -> Option<&mut RoundSlot> {
        self.players.iter_mut().find(|s| s.user_id == user_id)
    }

    /// Color a winner coming up from `child` takes in this round.
    pub fn color_for_child(&self, child: u32) -> Option<PlayerColor> {
        match self.child_round_numbers.iter().position(|c| *c == child) {
            Some(0) => Some(PlayerColor::Red),
            Some(1) => Some(PlayerColor::Blue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    /// Registration order is seeding order.
    pub registrants: Vec<Uuid>,
    pub started: bool,
    pub maximum_players: u32,
    pub round_format: SeriesFormat,
    pub final_format: SeriesFormat,
    pub grid: Vec<Round>,
    pub winner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn is_full(&self) -> bool {
        self.registrants.len() as u32 >= self.maximum_players
    }

    pub fn needs_grid(&self) -> bool {
        self.is_full() && self.grid.is_empty()
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.grid.iter().find(|r| r.round_number == round_number)
    }

    pub fn round_mut(&mut self, round_number: u32) -> Option<&mut Round> {
        self.grid.iter_mut().find(|r| r.round_number == round_number)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationOutcome {
    Registered,
    AlreadyRegistered,
    BracketBuilt,
}

impl RegistrationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RegistrationOutcome::Registered => "player registered",
            RegistrationOutcome::AlreadyRegistered => "player already registered",
            RegistrationOutcome::BracketBuilt => "player registered, bracket built",
        }
    }
}

// ===== API DTOs =====

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub maximum_players: u32,
    pub round_format: SeriesFormat,
    pub final_format: SeriesFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub tournament_id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}
