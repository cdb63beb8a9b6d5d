use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::{RatingAdjustment, RatingChange};
use crate::store::{AccountDirectory, StoreError};

/// Fixed scale applied to `1 - expected`.
pub const SOFT_FACTOR: f64 = 5.0;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Winner and loser are the same account: {0}")]
    SameAccount(Uuid),

    #[error("Rating write failed: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for RatingError {
    fn kind(&self) -> ErrorKind {
        match self {
            RatingError::AccountNotFound(_) | RatingError::SameAccount(_) => ErrorKind::Consistency,
            RatingError::WriteFailed(_) => ErrorKind::Unavailable,
            RatingError::Store(e) => e.kind(),
        }
    }
}

/// Probability the winner was expected to win.
pub fn expected_score(winner_rating: i32, loser_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((loser_rating - winner_rating) as f64 / 400.0))
}

pub fn rating_delta(winner_rating: i32, loser_rating: i32) -> f64 {
    SOFT_FACTOR * (1.0 - expected_score(winner_rating, loser_rating))
}

/// Rounds the delta half away from zero so both sides move by the same
/// whole number of points.
pub fn rounded_delta(delta: f64) -> i32 {
    delta.round() as i32
}

#[async_trait]
pub trait RatingAdjuster: Send + Sync {
    async fn adjust_ratings(&self, winner_id: Uuid, loser_id: Uuid) -> Result<RatingAdjustment, RatingError>;
}

pub struct RatingEngine {
    accounts: Arc<dyn AccountDirectory>,
}

impl RatingEngine {
    pub fn new(accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { accounts }
    }

    async fn rating_of(&self, id: Uuid) -> Result<i32, RatingError> {
        self.accounts
            .get_rating(id)
            .await?
            .ok_or(RatingError::AccountNotFound(id))
    }
}

#[async_trait]
impl RatingAdjuster for RatingEngine {
    async fn adjust_ratings(&self, winner_id: Uuid, loser_id: Uuid) -> Result<RatingAdjustment, RatingError> {
        if winner_id == loser_id {
            return Err(RatingError::SameAccount(winner_id));
        }

        let winner_rating = self.rating_of(winner_id).await?;
        let loser_rating = self.rating_of(loser_id).await?;

        let delta = rating_delta(winner_rating, loser_rating);
        let step = rounded_delta(delta);

        // Writes are increments; another result may land in between.
        let new_winner = self
            .accounts
            .add_rating(winner_id, step)
            .await
            .map_err(|e| RatingError::WriteFailed(format!("winner {}: {}", winner_id, e)))?;

        let new_loser = match self.accounts.add_rating(loser_id, -step).await {
            Ok(rating) => rating,
            Err(e) => {
                // Take the winner's points back so the pair never diverges.
                if let Err(restore) = self.accounts.add_rating(winner_id, -step).await {
                    error!(
                        winner_id = %winner_id,
                        error = %restore,
                        "Failed to restore winner rating after loser write failed"
                    );
                }
                return Err(RatingError::WriteFailed(format!("loser {}: {}", loser_id, e)));
            }
        };

        info!(
            winner_id = %winner_id,
            loser_id = %loser_id,
            delta,
            new_winner,
            new_loser,
            "Ratings adjusted"
        );

        Ok(RatingAdjustment {
            winner_id,
            loser_id,
            winner: RatingChange {
                delta,
                new_rating: new_winner,
            },
            loser: RatingChange {
                delta: -delta,
                new_rating: new_loser,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_err;

    #[test]
    fn test_equal_ratings_delta() {
        assert!((expected_score(1200, 1200) - 0.5).abs() < 1e-12);
        assert!((rating_delta(1200, 1200) - 2.5).abs() < 1e-12);
        assert_eq!(rounded_delta(2.5), 3);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let upset = rating_delta(1000, 1400);
        let expected_win = rating_delta(1400, 1000);
        assert!(upset > expected_win);
        assert!(upset < SOFT_FACTOR);
        assert!(expected_win > 0.0);
    }

    #[tokio::test]
    async fn test_adjust_equal_ratings() {
        let store = Arc::new(MemoryStore::new());
        let winner = store.seed_account("winner#1", 1200).await;
        let loser = store.seed_account("loser#1", 1200).await;
        let engine = RatingEngine::new(store.clone());

        let adjustment = engine.adjust_ratings(winner, loser).await.unwrap();

        assert_eq!(adjustment.winner.new_rating, 1203);
        assert_eq!(adjustment.loser.new_rating, 1197);
        assert!((adjustment.winner.delta - 2.5).abs() < 1e-12);
        assert_eq!(store.get_rating(winner).await.unwrap(), Some(1203));
        assert_eq!(store.get_rating(loser).await.unwrap(), Some(1197));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = Arc::new(MemoryStore::new());
        let winner = store.seed_account("winner#1", 1200).await;
        let engine = RatingEngine::new(store.clone());

        let result = engine.adjust_ratings(winner, Uuid::new_v4()).await;
        assert!(matches!(result, Err(RatingError::AccountNotFound(_))));
        assert_eq!(store.get_rating(winner).await.unwrap(), Some(1200));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_results_for_one_player_both_apply() {
        let store = Arc::new(MemoryStore::new());
        let shared = store.seed_account("shared#1", 1200).await;
        let first = store.seed_account("first#1", 1200).await;
        let second = store.seed_account("second#1", 1200).await;
        let engine = Arc::new(RatingEngine::new(store.clone()));

        let tasks = [first, second].map(|loser| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.adjust_ratings(shared, loser).await })
        });
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // every point a loser gave up reached the shared winner
        let shared_rating = store.get_rating(shared).await.unwrap().unwrap();
        let first_rating = store.get_rating(first).await.unwrap().unwrap();
        let second_rating = store.get_rating(second).await.unwrap().unwrap();
        assert!(first_rating < 1200 && second_rating < 1200);
        assert_eq!(shared_rating + first_rating + second_rating, 3600);
    }

    /// Directory whose second write fails.
    struct FlakyDirectory {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl AccountDirectory for FlakyDirectory {
        async fn get_rating(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
            self.inner.get_rating(id).await
        }

        async fn add_rating(&self, id: Uuid, delta: i32) -> Result<i32, StoreError> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.add_rating(id, delta).await
        }

        async fn resolve_discord_ids(&self, discord_ids: &[String]) -> Result<Vec<Uuid>, StoreError> {
            self.inner.resolve_discord_ids(discord_ids).await
        }
    }

    #[tokio::test]
    async fn test_failed_loser_write_restores_winner() {
        let inner = MemoryStore::new();
        let winner = inner.seed_account("winner#1", 1500).await;
        let loser = inner.seed_account("loser#1", 1400).await;
        let directory = Arc::new(FlakyDirectory {
            inner,
            writes: AtomicUsize::new(0),
        });
        let engine = RatingEngine::new(directory.clone());

        let result = engine.adjust_ratings(winner, loser).await;
        let err = assert_err!(result);
        assert!(matches!(err, RatingError::WriteFailed(_)));

        assert_eq!(directory.get_rating(winner).await.unwrap(), Some(1500));
        assert_eq!(directory.get_rating(loser).await.unwrap(), Some(1400));
    }
}
