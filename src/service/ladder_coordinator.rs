use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::LadderSession;
use crate::store::{AccountDirectory, LadderStore, StoreError};

/// A ladder session is always a head-to-head pairing.
pub const LADDER_SIZE: usize = 2;

#[derive(Debug, Error)]
pub enum LadderError {
    #[error("not_enough_data: {resolved} known player(s)")]
    InsufficientPlayers { resolved: usize },

    #[error("too_many_players: {resolved} known players")]
    TooManyPlayers { resolved: usize },

    #[error("Ladder session {0} not found")]
    NotFound(Uuid),

    #[error("Ladder session {0} is no longer active")]
    Inactive(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for LadderError {
    fn kind(&self) -> ErrorKind {
        match self {
            LadderError::InsufficientPlayers { .. }
            | LadderError::TooManyPlayers { .. }
            | LadderError::NotFound(_) => ErrorKind::Validation,
            LadderError::Inactive(_) => ErrorKind::Conflict,
            LadderError::Store(e) => e.kind(),
        }
    }
}

pub struct LadderCoordinator {
    ladders: Arc<dyn LadderStore>,
    accounts: Arc<dyn AccountDirectory>,
}

impl LadderCoordinator {
    pub fn new(ladders: Arc<dyn LadderStore>, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { ladders, accounts }
    }

    /// Opens a session for exactly two known accounts. Unknown discord ids
    /// are dropped and ids resolving to the same account count once.
    pub async fn create_session(&self, discord_ids: &[String]) -> Result<LadderSession, LadderError> {
        let resolved = self.accounts.resolve_discord_ids(discord_ids).await?;

        let mut members: Vec<Uuid> = Vec::with_capacity(resolved.len());
        for id in resolved {
            if !members.contains(&id) {
                members.push(id);
            }
        }

        if members.len() < LADDER_SIZE {
            warn!(
                requested = discord_ids.len(),
                resolved = members.len(),
                "Ladder session rejected, not enough known players"
            );
            return Err(LadderError::InsufficientPlayers {
                resolved: members.len(),
            });
        }
        if members.len() > LADDER_SIZE {
            warn!(resolved = members.len(), "Ladder session rejected, too many players");
            return Err(LadderError::TooManyPlayers {
                resolved: members.len(),
            });
        }

        let session = LadderSession::new(members);
        self.ladders.insert_ladder(&session).await?;

        info!(session_id = %session.id, "Ladder session created");
        Ok(session)
    }

    /// Records a match against an active session. Appending the same match
    /// twice leaves one entry.
    pub async fn append_match(&self, session_id: Uuid, match_id: &str) -> Result<LadderSession, LadderError> {
        let session = self
            .ladders
            .append_ladder_match(session_id, match_id)
            .await?
            .ok_or(LadderError::NotFound(session_id))?;

        if !session.active {
            return Err(LadderError::Inactive(session_id));
        }
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<LadderSession, LadderError> {
        self.ladders
            .get_ladder(session_id)
            .await?
            .ok_or(LadderError::NotFound(session_id))
    }
}
