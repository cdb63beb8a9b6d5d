// Service layer for the bracket engine
pub mod bracket_advancer;
pub mod bracket_builder;
pub mod ladder_coordinator;
pub mod match_recorder;
pub mod rating_engine;
pub mod registration_scheduler;
pub mod tournament_service;

#[cfg(test)]
mod bracket_advancer_test;

pub use bracket_advancer::BracketAdvancer;
pub use ladder_coordinator::{LadderCoordinator, LadderError};
pub use match_recorder::{MatchError, MatchRecorder, WinnerReport};
pub use rating_engine::RatingEngine;
pub use registration_scheduler::RegistrationScheduler;
pub use tournament_service::{TournamentError, TournamentService};
