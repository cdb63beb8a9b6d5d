use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::{Round, RoundSlot};
use crate::store::{StoreError, TournamentStore, WinIncrement};

#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error("Round {round_number} not found in tournament {tournament_id}")]
    RoundNotFound { tournament_id: Uuid, round_number: u32 },

    #[error("Player {user_id} is not seated in round {round_number}")]
    PlayerNotInRound { user_id: Uuid, round_number: u32 },

    #[error("Round {round_number} has {seated} of 2 players seated")]
    RoundNotReady { round_number: u32, seated: usize },

    #[error("Round {child} is not a child of round {parent}")]
    BrokenTree { parent: u32, child: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for AdvanceError {
    fn kind(&self) -> ErrorKind {
        match self {
            AdvanceError::RoundNotFound { .. }
            | AdvanceError::PlayerNotInRound { .. }
            | AdvanceError::RoundNotReady { .. }
            | AdvanceError::BrokenTree { .. } => ErrorKind::Consistency,
            AdvanceError::Store(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvanceResult {
    WinRecorded {
        round_number: u32,
        win_count: u32,
        threshold: u32,
    },
    RoundCompleted {
        round_number: u32,
        winner_id: Uuid,
        parent_round_number: u32,
    },
    TournamentCompleted {
        winner_id: Uuid,
    },
    /// The match was already counted. Any propagation that was missing has
    /// been re-applied.
    AlreadyApplied {
        round_number: u32,
    },
}

/// Seam between match recording and the bracket, so the recorder can be
/// exercised without a tournament store.
#[async_trait]
pub trait BracketProgress: Send + Sync {
    async fn advance(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        winner_id: Uuid,
        match_id: &str,
    ) -> Result<AdvanceResult, AdvanceError>;
}

pub struct BracketAdvancer {
    tournaments: Arc<dyn TournamentStore>,
}

impl BracketAdvancer {
    pub fn new(tournaments: Arc<dyn TournamentStore>) -> Self {
        Self { tournaments }
    }

    async fn load_round(&self, tournament_id: Uuid, round_number: u32) -> Result<Round, AdvanceError> {
        self.tournaments
            .get_round(tournament_id, round_number)
            .await?
            .ok_or(AdvanceError::RoundNotFound {
                tournament_id,
                round_number,
            })
    }

    /// Moves the winner of a completed round one step up the tree. Every
    /// write here is idempotent, so replaying it is harmless.
    async fn propagate(
        &self,
        tournament_id: Uuid,
        round: &Round,
        winner_id: Uuid,
    ) -> Result<AdvanceResult, AdvanceError> {
        let Some(parent_number) = round.parent_round_number else {
            if self
                .tournaments
                .set_tournament_winner(tournament_id, winner_id)
                .await?
            {
                info!(
                    tournament_id = %tournament_id,
                    winner_id = %winner_id,
                    "Tournament completed"
                );
            }
            return Ok(AdvanceResult::TournamentCompleted { winner_id });
        };

        let parent = self.load_round(tournament_id, parent_number).await?;
        let color = parent
            .color_for_child(round.round_number)
            .ok_or(AdvanceError::BrokenTree {
                parent: parent_number,
                child: round.round_number,
            })?;

        let seated = self
            .tournaments
            .push_slot(
                tournament_id,
                parent_number,
                RoundSlot {
                    user_id: winner_id,
                    color,
                    win_count: 0,
                },
            )
            .await?;

        if seated {
            info!(
                tournament_id = %tournament_id,
                round_number = round.round_number,
                parent_round_number = parent_number,
                winner_id = %winner_id,
                color = %color,
                "Round winner advanced"
            );
        } else {
            debug!(
                tournament_id = %tournament_id,
                parent_round_number = parent_number,
                color = %color,
                "Parent slot already filled"
            );
        }

        Ok(AdvanceResult::RoundCompleted {
            round_number: round.round_number,
            winner_id,
            parent_round_number: parent_number,
        })
    }
}

#[async_trait]
impl BracketProgress for BracketAdvancer {
    async fn advance(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        winner_id: Uuid,
        match_id: &str,
    ) -> Result<AdvanceResult, AdvanceError> {
        let round = self.load_round(tournament_id, round_number).await?;
        let threshold = round.win_threshold();

        let increment = self
            .tournaments
            .increment_win(tournament_id, round_number, winner_id, match_id, threshold)
            .await?;

        match increment {
            WinIncrement::RoundNotFound => Err(AdvanceError::RoundNotFound {
                tournament_id,
                round_number,
            }),
            WinIncrement::RoundNotReady { seated } => {
                error!(
                    tournament_id = %tournament_id,
                    round_number,
                    seated,
                    match_id,
                    "Result reported for a round that is not fully seated"
                );
                Err(AdvanceError::RoundNotReady {
                    round_number,
                    seated,
                })
            }
            WinIncrement::PlayerNotInRound => {
                error!(
                    tournament_id = %tournament_id,
                    round_number,
                    user_id = %winner_id,
                    match_id,
                    "Match winner is not seated in its round"
                );
                Err(AdvanceError::PlayerNotInRound {
                    user_id: winner_id,
                    round_number,
                })
            }
            WinIncrement::Applied {
                win_count,
                completed: false,
                ..
            } => {
                info!(
                    tournament_id = %tournament_id,
                    round_number,
                    user_id = %winner_id,
                    win_count,
                    threshold,
                    "Series win recorded"
                );
                Ok(AdvanceResult::WinRecorded {
                    round_number,
                    win_count,
                    threshold,
                })
            }
            WinIncrement::Applied {
                completed: true,
                round,
                ..
            } => self.propagate(tournament_id, &round, winner_id).await,
            WinIncrement::Replayed(round) => {
                debug!(
                    tournament_id = %tournament_id,
                    round_number,
                    match_id,
                    "Win already counted"
                );
                // A crash between closing the round and seating the winner
                // leaves the parent short; finish the step now.
                if let Some(round_winner) = round.winner_id {
                    self.propagate(tournament_id, &round, round_winner).await?;
                }
                Ok(AdvanceResult::AlreadyApplied { round_number })
            }
        }
    }
}
