//! Persistence seams.
//!
//! Every mutation the engine performs is one call on these traits, and every
//! call is atomic with respect to the record it touches. Implementations
//! must never split a conditional update into a read followed by a write
//! that another request can interleave with.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::{
    LadderSession, Match, MatchPlayer, MatchResolution, Round, RoundSlot, Tournament,
    TournamentContext,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(error.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Consistency,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertMatch {
    Created(Match),
    Exists(Match),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddPlayer {
    Added(Match),
    AlreadyPresent(Match),
    Full(Match),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimResolution {
    /// This caller performed the transition to resolved.
    Claimed(Match),
    AlreadyResolved(Match),
    NotPopulated(Match),
    NotFound,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, combat_id: &str) -> Result<Option<Match>, StoreError>;

    /// Inserts unless a record with the same combat id exists.
    async fn insert_match(&self, game: Match) -> Result<InsertMatch, StoreError>;

    async fn add_player(
        &self,
        combat_id: &str,
        player: MatchPlayer,
        context: Option<TournamentContext>,
    ) -> Result<AddPlayer, StoreError>;

    /// Sets the result only if no result has been recorded yet.
    async fn claim_resolution(
        &self,
        combat_id: &str,
        resolution: &MatchResolution,
    ) -> Result<ClaimResolution, StoreError>;

    async fn mark_bracket_applied(&self, combat_id: &str) -> Result<(), StoreError>;

    /// Stores the flag only while a confirmation is awaited. Returns the
    /// updated record, or `None` when nothing was awaiting.
    async fn confirm_disconnect(
        &self,
        combat_id: &str,
        occurred: bool,
    ) -> Result<Option<Match>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Added(Tournament),
    AlreadyRegistered(Tournament),
    Full(Tournament),
    Closed(Tournament),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WinIncrement {
    /// The win was counted. `completed` is true when this increment reached
    /// the threshold and set the round winner.
    Applied {
        win_count: u32,
        completed: bool,
        round: Round,
    },
    /// The match id was already counted, or the round already has a winner.
    Replayed(Round),
    /// The round does not have both players seated yet.
    RoundNotReady { seated: usize },
    RoundNotFound,
    PlayerNotInRound,
}

#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Returns false when `name_key` is already taken.
    async fn insert_tournament(&self, tournament: &Tournament, name_key: &str) -> Result<bool, StoreError>;

    async fn get_tournament(&self, id: Uuid) -> Result<Option<Tournament>, StoreError>;

    /// Appends only while not started, not yet registered and below capacity.
    async fn add_registrant(&self, id: Uuid, user_id: Uuid) -> Result<Registration, StoreError>;

    /// Writes the grid only if the tournament has none yet.
    async fn save_grid(&self, id: Uuid, grid: &[Round]) -> Result<bool, StoreError>;

    async fn get_round(&self, id: Uuid, round_number: u32) -> Result<Option<Round>, StoreError>;

    /// Counts one win for `user_id` and records `match_id`, as one step.
    async fn increment_win(
        &self,
        id: Uuid,
        round_number: u32,
        user_id: Uuid,
        match_id: &str,
        threshold: u32,
    ) -> Result<WinIncrement, StoreError>;

    /// Adds a slot unless its color or player is already seated.
    async fn push_slot(&self, id: Uuid, round_number: u32, slot: RoundSlot) -> Result<bool, StoreError>;

    /// Sets the tournament winner if none is set.
    async fn set_tournament_winner(&self, id: Uuid, winner_id: Uuid) -> Result<bool, StoreError>;

    /// Flips `started` for every tournament whose start date has passed.
    async fn start_due_tournaments(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait LadderStore: Send + Sync {
    async fn insert_ladder(&self, session: &LadderSession) -> Result<(), StoreError>;

    async fn get_ladder(&self, id: Uuid) -> Result<Option<LadderSession>, StoreError>;

    /// Appends while the session is active and the id is new. Returns the
    /// session as stored after the call.
    async fn append_ladder_match(&self, id: Uuid, match_id: &str) -> Result<Option<LadderSession>, StoreError>;
}

/// Account directory owned by the account service.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_rating(&self, id: Uuid) -> Result<Option<i32>, StoreError>;

    /// Moves the rating by `delta` in one write and returns the new value.
    async fn add_rating(&self, id: Uuid, delta: i32) -> Result<i32, StoreError>;

    /// Maps discord ids to account ids, skipping unknown ids.
    async fn resolve_discord_ids(&self, discord_ids: &[String]) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Store handles shared by the services, all backed by one implementation.
#[derive(Clone)]
pub struct Stores {
    pub matches: Arc<dyn MatchStore>,
    pub tournaments: Arc<dyn TournamentStore>,
    pub ladders: Arc<dyn LadderStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub health: Arc<dyn HealthProbe>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            matches: store.clone(),
            tournaments: store.clone(),
            ladders: store.clone(),
            accounts: store.clone(),
            health: store,
        }
    }

    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            matches: store.clone(),
            tournaments: store.clone(),
            ladders: store.clone(),
            accounts: store.clone(),
            health: store,
        }
    }
}
