use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api_error::{Classify, ErrorKind};
use crate::config::NameMatchPolicy;
use crate::models::{CreateTournamentRequest, RegistrationOutcome, Tournament};
use crate::service::bracket_builder::{build_grid, is_supported_size, BracketError};
use crate::store::{Registration, StoreError, TournamentStore};

#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("A tournament named {0:?} already exists")]
    NameTaken(String),

    #[error("Tournament {0} not found")]
    NotFound(Uuid),

    #[error("Registration for tournament {0} is closed")]
    RegistrationClosed(Uuid),

    #[error("Tournament {0} is full")]
    TournamentFull(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Bracket(#[from] BracketError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for TournamentError {
    fn kind(&self) -> ErrorKind {
        match self {
            TournamentError::NotFound(_) | TournamentError::Validation(_) => ErrorKind::Validation,
            TournamentError::NameTaken(_)
            | TournamentError::RegistrationClosed(_)
            | TournamentError::TournamentFull(_) => ErrorKind::Conflict,
            TournamentError::Bracket(e) => e.kind(),
            TournamentError::Store(e) => e.kind(),
        }
    }
}

/// Tournament creation and registration. The grid is built by whichever
/// registration fills the roster.
pub struct TournamentService {
    tournaments: Arc<dyn TournamentStore>,
    name_policy: NameMatchPolicy,
}

impl TournamentService {
    pub fn new(tournaments: Arc<dyn TournamentStore>, name_policy: NameMatchPolicy) -> Self {
        Self {
            tournaments,
            name_policy,
        }
    }

    pub async fn create_tournament(&self, dto: CreateTournamentRequest) -> Result<Tournament, TournamentError> {
        dto.validate()
            .map_err(|e| TournamentError::Validation(e.to_string()))?;
        if !is_supported_size(dto.maximum_players) {
            return Err(BracketError::InvalidRosterSize(dto.maximum_players).into());
        }

        let name = dto.name.trim().to_string();
        let name_key = self.name_policy.key(&name);
        if name_key.is_empty() {
            return Err(TournamentError::Validation(
                "name must contain letters or digits".to_string(),
            ));
        }

        let tournament = Tournament {
            id: Uuid::new_v4(),
            name,
            start_date: dto.start_date,
            registrants: vec![],
            started: false,
            maximum_players: dto.maximum_players,
            round_format: dto.round_format,
            final_format: dto.final_format,
            grid: vec![],
            winner_id: None,
            created_at: Utc::now(),
        };

        if !self.tournaments.insert_tournament(&tournament, &name_key).await? {
            return Err(TournamentError::NameTaken(tournament.name));
        }

        info!(
            tournament_id = %tournament.id,
            name = %tournament.name,
            maximum_players = tournament.maximum_players,
            "Tournament created"
        );
        Ok(tournament)
    }

    /// Adds a player. The call that fills the roster builds the grid; any
    /// later call for a full tournament without a grid retries the build.
    pub async fn register(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Tournament, RegistrationOutcome), TournamentError> {
        match self.tournaments.add_registrant(tournament_id, user_id).await? {
            Registration::NotFound => Err(TournamentError::NotFound(tournament_id)),
            Registration::Closed(_) => Err(TournamentError::RegistrationClosed(tournament_id)),
            Registration::Full(_) => Err(TournamentError::TournamentFull(tournament_id)),
            Registration::AlreadyRegistered(tournament) => {
                let tournament = if tournament.needs_grid() {
                    self.ensure_grid(tournament).await?
                } else {
                    tournament
                };
                Ok((tournament, RegistrationOutcome::AlreadyRegistered))
            }
            Registration::Added(tournament) => {
                info!(
                    tournament_id = %tournament_id,
                    user_id = %user_id,
                    registered = tournament.registrants.len(),
                    "Player registered"
                );
                if tournament.needs_grid() {
                    let tournament = self.ensure_grid(tournament).await?;
                    Ok((tournament, RegistrationOutcome::BracketBuilt))
                } else {
                    Ok((tournament, RegistrationOutcome::Registered))
                }
            }
        }
    }

    async fn ensure_grid(&self, tournament: Tournament) -> Result<Tournament, TournamentError> {
        let grid = build_grid(
            &tournament.registrants,
            tournament.maximum_players,
            tournament.round_format,
            tournament.final_format,
        )?;

        if self.tournaments.save_grid(tournament.id, &grid).await? {
            info!(
                tournament_id = %tournament.id,
                rounds = grid.len(),
                "Bracket built"
            );
        } else {
            warn!(tournament_id = %tournament.id, "Bracket was already built");
        }

        self.get_tournament(tournament.id).await
    }

    pub async fn get_tournament(&self, tournament_id: Uuid) -> Result<Tournament, TournamentError> {
        self.tournaments
            .get_tournament(tournament_id)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesFormat;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn request(name: &str, maximum_players: u32) -> CreateTournamentRequest {
        CreateTournamentRequest {
            name: name.to_string(),
            start_date: Utc::now() + Duration::days(1),
            maximum_players,
            round_format: SeriesFormat::Bo3,
            final_format: SeriesFormat::Bo5,
        }
    }

    fn service() -> (TournamentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            TournamentService::new(store.clone(), NameMatchPolicy::Normalized),
            store,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_unsupported_size() {
        let (service, _) = service();
        let err = assert_err!(service.create_tournament(request("Odd Cup", 6)).await);
        assert!(matches!(err, TournamentError::Bracket(BracketError::InvalidRosterSize(6))));
    }

    #[tokio::test]
    async fn test_names_collide_after_normalization() {
        let (service, _) = service();
        assert_ok!(service.create_tournament(request("Spring Cup", 4)).await);

        let err = assert_err!(service.create_tournament(request("spring-cup", 8)).await);
        assert!(matches!(err, TournamentError::NameTaken(_)));
    }

    #[tokio::test]
    async fn test_filling_roster_builds_grid() {
        let (service, _) = service();
        let tournament = service.create_tournament(request("Spring Cup", 4)).await.unwrap();

        for _ in 0..3 {
            let (t, outcome) = service.register(tournament.id, Uuid::new_v4()).await.unwrap();
            assert_eq!(outcome, RegistrationOutcome::Registered);
            assert!(t.grid.is_empty());
        }
        let (t, outcome) = service.register(tournament.id, Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::BracketBuilt);
        assert_eq!(t.grid.len(), 3);

        let err = assert_err!(service.register(tournament.id, Uuid::new_v4()).await);
        assert!(matches!(err, TournamentError::TournamentFull(_)));
    }

    #[tokio::test]
    async fn test_repeat_registration_is_noop() {
        let (service, _) = service();
        let tournament = service.create_tournament(request("Spring Cup", 4)).await.unwrap();
        let user = Uuid::new_v4();

        service.register(tournament.id, user).await.unwrap();
        let (t, outcome) = service.register(tournament.id, user).await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(t.registrants, vec![user]);
    }

    #[tokio::test]
    async fn test_started_tournament_rejects_registration() {
        let (service, store) = service();
        let tournament = service.create_tournament(request("Spring Cup", 4)).await.unwrap();
        store
            .start_due_tournaments(tournament.start_date + Duration::seconds(1))
            .await
            .unwrap();

        let err = assert_err!(service.register(tournament.id, Uuid::new_v4()).await);
        assert!(matches!(err, TournamentError::RegistrationClosed(_)));

        let err = assert_err!(service.register(Uuid::new_v4(), Uuid::new_v4()).await);
        assert!(matches!(err, TournamentError::NotFound(_)));
    }
}
