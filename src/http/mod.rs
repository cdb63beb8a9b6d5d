pub mod envelope;
pub mod game_handler;
pub mod health;
pub mod ladder_handler;
pub mod tournament_handler;

use std::sync::Arc;

use crate::config::NameMatchPolicy;
use crate::service::{
    BracketAdvancer, LadderCoordinator, MatchRecorder, RatingEngine, TournamentService,
};
use crate::store::{HealthProbe, Stores};

/// Services shared by every handler.
pub struct AppState {
    pub recorder: Arc<MatchRecorder>,
    pub tournaments: Arc<TournamentService>,
    pub ladder: Arc<LadderCoordinator>,
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    pub fn new(stores: &Stores, name_policy: NameMatchPolicy) -> Self {
        let ratings = Arc::new(RatingEngine::new(stores.accounts.clone()));
        let advancer = Arc::new(BracketAdvancer::new(stores.tournaments.clone()));

        Self {
            recorder: Arc::new(MatchRecorder::new(stores.matches.clone(), ratings, advancer)),
            tournaments: Arc::new(TournamentService::new(stores.tournaments.clone(), name_policy)),
            ladder: Arc::new(LadderCoordinator::new(
                stores.ladders.clone(),
                stores.accounts.clone(),
            )),
            health: stores.health.clone(),
        }
    }
}
