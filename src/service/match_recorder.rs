use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::*;
use crate::service::bracket_advancer::{AdvanceError, BracketProgress};
use crate::service::rating_engine::RatingAdjuster;
use crate::store::{AddPlayer, ClaimResolution, InsertMatch, MatchStore, StoreError};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Match {0} not found")]
    NotFound(String),

    #[error("Invalid match state: {0}")]
    InvalidState(String),

    #[error("Match {0} has no free slot for this player")]
    MatchFull(String),

    #[error("User {0} is not a participant of this match")]
    NotAParticipant(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bracket advancement failed: {0}")]
    Bracket(#[from] AdvanceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for MatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            MatchError::NotFound(_) | MatchError::NotAParticipant(_) | MatchError::Validation(_) => {
                ErrorKind::Validation
            }
            MatchError::InvalidState(_) | MatchError::MatchFull(_) => ErrorKind::Conflict,
            MatchError::Bracket(e) => e.kind(),
            MatchError::Store(e) => e.kind(),
        }
    }
}

/// Final result as reported by a client.
#[derive(Debug, Clone)]
pub struct WinnerReport {
    pub winner_color: PlayerColor,
    pub reporter_id: Option<Uuid>,
    pub army_remainder: Option<Vec<ArmyStack>>,
    pub percentage_of_army_left: Option<f64>,
    pub date: Option<DateTime<Utc>>,
    pub was_disconnect: bool,
}

impl From<SaveGameWinnerRequest> for WinnerReport {
    fn from(req: SaveGameWinnerRequest) -> Self {
        Self {
            winner_color: req.winner,
            reporter_id: req.user_id,
            army_remainder: req.army_remainder,
            percentage_of_army_left: req.percentage_of_army_left,
            date: req.date,
            was_disconnect: req.was_disconnect,
        }
    }
}

/// Records per-player submissions and the final result of a match, then
/// hands the result to rating and bracket progression.
pub struct MatchRecorder {
    matches: Arc<dyn MatchStore>,
    ratings: Arc<dyn RatingAdjuster>,
    bracket: Arc<dyn BracketProgress>,
}

impl MatchRecorder {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        ratings: Arc<dyn RatingAdjuster>,
        bracket: Arc<dyn BracketProgress>,
    ) -> Self {
        Self {
            matches,
            ratings,
            bracket,
        }
    }

    // =============================================================================
    // SUBMISSIONS
    // =============================================================================

    /// Creates the match on first submission and merges the second one.
    /// Re-sending a submission for a slot already present changes nothing.
    pub async fn submit_player_data(
        &self,
        combat_id: &str,
        map_version: &str,
        player: MatchPlayer,
        context: Option<TournamentContext>,
    ) -> Result<(Match, SubmitOutcome), MatchError> {
        if context.is_some() && player.user_id.is_none() {
            return Err(MatchError::Validation(
                "userId is required for tournament matches".to_string(),
            ));
        }

        if self.matches.get_match(combat_id).await?.is_none() {
            let game = Match::new(
                combat_id.to_string(),
                map_version.to_string(),
                player.clone(),
                context,
            );
            match self.matches.insert_match(game).await? {
                InsertMatch::Created(game) => {
                    info!(
                        combat_id,
                        color = %player.color,
                        tournament = context.is_some(),
                        "Match record created"
                    );
                    return Ok((game, SubmitOutcome::Created));
                }
                InsertMatch::Exists(_) => {
                    debug!(combat_id, "Match created concurrently, merging submission");
                }
            }
        }

        match self.matches.add_player(combat_id, player, context).await? {
            AddPlayer::Added(game) => {
                info!(combat_id, "Second player joined match");
                Ok((game, SubmitOutcome::Updated))
            }
            AddPlayer::AlreadyPresent(game) => Ok((game, SubmitOutcome::AlreadyRegistered)),
            AddPlayer::Full(_) => Err(MatchError::MatchFull(combat_id.to_string())),
            AddPlayer::NotFound => Err(MatchError::NotFound(combat_id.to_string())),
        }
    }

    // =============================================================================
    // RESOLUTION
    // =============================================================================

    /// Records the winner exactly once. Ratings and bracket progression run
    /// only for the call that performs the transition; a later call only
    /// re-applies a bracket step that did not complete.
    pub async fn record_winner(
        &self,
        combat_id: &str,
        report: WinnerReport,
    ) -> Result<(Match, ResolveOutcome), MatchError> {
        let current = self
            .matches
            .get_match(combat_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(combat_id.to_string()))?;

        if let Some(reporter) = report.reporter_id {
            if !current.is_participant(reporter) {
                warn!(combat_id, reporter = %reporter, "Result reported by non-participant");
                return Err(MatchError::NotAParticipant(reporter));
            }
        } else if current.tournament_context().is_some() {
            return Err(MatchError::Validation(
                "userId is required for tournament matches".to_string(),
            ));
        }

        let resolution = MatchResolution {
            winner_color: report.winner_color,
            army_remainder: report.army_remainder,
            percentage_of_army_left: report.percentage_of_army_left,
            date: report.date.unwrap_or_else(Utc::now),
            awaiting_disconnect_confirmation: report.was_disconnect,
        };

        match self.matches.claim_resolution(combat_id, &resolution).await? {
            ClaimResolution::NotFound => Err(MatchError::NotFound(combat_id.to_string())),
            ClaimResolution::NotPopulated(_) => Err(MatchError::InvalidState(
                "both players must submit before a winner is recorded".to_string(),
            )),
            ClaimResolution::AlreadyResolved(game) => {
                debug!(combat_id, "Match already resolved");
                let game = if game.tournament_context().is_some() && !game.bracket_applied {
                    self.apply_to_bracket(game).await?
                } else {
                    game
                };
                Ok((game, ResolveOutcome::AlreadyResolved))
            }
            ClaimResolution::Claimed(game) => {
                info!(
                    combat_id,
                    winner = %report.winner_color,
                    disconnect = report.was_disconnect,
                    "Match resolved"
                );
                self.settle_ratings(&game).await;
                let game = if game.tournament_context().is_some() {
                    self.apply_to_bracket(game).await?
                } else {
                    game
                };
                Ok((game, ResolveOutcome::Resolved))
            }
        }
    }

    /// Rating updates are best effort; a failure is logged and never undoes
    /// the recorded result.
    async fn settle_ratings(&self, game: &Match) {
        let (Some(winner_id), Some(loser_id)) = (
            game.winner().and_then(|p| p.user_id),
            game.loser().and_then(|p| p.user_id),
        ) else {
            debug!(combat_id = %game.combat_id, "Anonymous player, skipping rating update");
            return;
        };

        match self.ratings.adjust_ratings(winner_id, loser_id).await {
            Ok(adjustment) => debug!(
                combat_id = %game.combat_id,
                delta = adjustment.winner.delta,
                "Rating adjustment applied"
            ),
            Err(e) => match e.kind() {
                ErrorKind::Consistency => error!(
                    combat_id = %game.combat_id,
                    error = %e,
                    "Rating adjustment failed"
                ),
                _ => warn!(
                    combat_id = %game.combat_id,
                    error = %e,
                    "Rating adjustment failed"
                ),
            },
        }
    }

    async fn apply_to_bracket(&self, mut game: Match) -> Result<Match, MatchError> {
        let Some(ctx) = game.tournament_context() else {
            return Ok(game);
        };
        let winner_id = game.winner().and_then(|p| p.user_id).ok_or_else(|| {
            MatchError::InvalidState("tournament match winner has no account".to_string())
        })?;

        let result = self
            .bracket
            .advance(ctx.tournament_id, ctx.round_number, winner_id, &game.combat_id)
            .await?;
        debug!(combat_id = %game.combat_id, result = ?result, "Bracket advanced");

        self.matches.mark_bracket_applied(&game.combat_id).await?;
        game.bracket_applied = true;
        Ok(game)
    }

    // =============================================================================
    // DISCONNECTS
    // =============================================================================

    pub async fn confirm_disconnect_status(
        &self,
        combat_id: &str,
        occurred: bool,
    ) -> Result<Match, MatchError> {
        if let Some(game) = self.matches.confirm_disconnect(combat_id, occurred).await? {
            info!(combat_id, occurred, "Disconnect status confirmed");
            return Ok(game);
        }

        match self.matches.get_match(combat_id).await? {
            None => Err(MatchError::NotFound(combat_id.to_string())),
            Some(_) => Err(MatchError::InvalidState(
                "match is not awaiting a disconnect confirmation".to_string(),
            )),
        }
    }

    pub async fn get_match(&self, combat_id: &str) -> Result<Match, MatchError> {
        self.matches
            .get_match(combat_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(combat_id.to_string()))
    }
}
