use chrono::Utc;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use crate::models::*;
use crate::service::bracket_advancer::{AdvanceError, AdvanceResult, BracketAdvancer, BracketProgress};
use crate::service::bracket_builder::build_grid;
use crate::store::{MemoryStore, TournamentStore};

struct Bracket {
    advancer: BracketAdvancer,
    store: Arc<MemoryStore>,
    tournament_id: Uuid,
    players: Vec<Uuid>,
}

async fn four_player_bracket(round_format: SeriesFormat, final_format: SeriesFormat) -> Bracket {
    let store = Arc::new(MemoryStore::new());
    let players: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let tournament = Tournament {
        id: Uuid::new_v4(),
        name: "Bracket Test".to_string(),
        start_date: Utc::now(),
        registrants: players.clone(),
        started: false,
        maximum_players: 4,
        round_format,
        final_format,
        grid: vec![],
        winner_id: None,
        created_at: Utc::now(),
    };
    store.insert_tournament(&tournament, "brackettest").await.unwrap();
    let grid = build_grid(&players, 4, round_format, final_format).unwrap();
    assert!(store.save_grid(tournament.id, &grid).await.unwrap());

    Bracket {
        advancer: BracketAdvancer::new(store.clone()),
        store,
        tournament_id: tournament.id,
        players,
    }
}

impl Bracket {
    async fn round(&self, round_number: u32) -> Round {
        self.store
            .get_round(self.tournament_id, round_number)
            .await
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn test_series_needs_threshold_wins() {
    let b = four_player_bracket(SeriesFormat::Bo3, SeriesFormat::Bo3).await;
    let p0 = b.players[0];

    let first = assert_ok!(b.advancer.advance(b.tournament_id, 2, p0, "c-1").await);
    assert_eq!(
        first,
        AdvanceResult::WinRecorded {
            round_number: 2,
            win_count: 1,
            threshold: 2
        }
    );

    // replaying the same match does not count twice
    let replay = assert_ok!(b.advancer.advance(b.tournament_id, 2, p0, "c-1").await);
    assert_eq!(replay, AdvanceResult::AlreadyApplied { round_number: 2 });
    assert_eq!(b.round(2).await.slot(p0).unwrap().win_count, 1);

    let second = assert_ok!(b.advancer.advance(b.tournament_id, 2, p0, "c-2").await);
    assert_eq!(
        second,
        AdvanceResult::RoundCompleted {
            round_number: 2,
            winner_id: p0,
            parent_round_number: 1
        }
    );

    let round = b.round(2).await;
    assert_eq!(round.winner_id, Some(p0));
    assert_eq!(round.match_ids, vec!["c-1", "c-2"]);

    let parent = b.round(1).await;
    assert_eq!(parent.players.len(), 1);
    assert_eq!(parent.players[0].user_id, p0);
    assert_eq!(parent.players[0].color, PlayerColor::Red);
    assert_eq!(parent.players[0].win_count, 0);
}

#[tokio::test]
async fn test_siblings_fill_parent_once() {
    let b = four_player_bracket(SeriesFormat::Bo1, SeriesFormat::Bo1).await;
    let left = b.players[1];
    let right = b.players[2];

    assert_ok!(b.advancer.advance(b.tournament_id, 3, right, "c-r").await);
    assert_ok!(b.advancer.advance(b.tournament_id, 2, left, "c-l").await);

    // a replayed completion must not seat anyone twice
    let replay = assert_ok!(b.advancer.advance(b.tournament_id, 3, right, "c-r").await);
    assert_eq!(replay, AdvanceResult::AlreadyApplied { round_number: 3 });

    let parent = b.round(1).await;
    assert_eq!(parent.players.len(), 2);
    assert_eq!(parent.slot(left).unwrap().color, PlayerColor::Red);
    assert_eq!(parent.slot(right).unwrap().color, PlayerColor::Blue);
}

#[tokio::test]
async fn test_final_sets_tournament_winner() {
    let b = four_player_bracket(SeriesFormat::Bo1, SeriesFormat::Bo1).await;
    let (p0, p3) = (b.players[0], b.players[3]);

    assert_ok!(b.advancer.advance(b.tournament_id, 2, p0, "c-1").await);
    assert_ok!(b.advancer.advance(b.tournament_id, 3, p3, "c-2").await);

    let result = assert_ok!(b.advancer.advance(b.tournament_id, 1, p3, "c-3").await);
    assert_eq!(result, AdvanceResult::TournamentCompleted { winner_id: p3 });

    let tournament = b.store.get_tournament(b.tournament_id).await.unwrap().unwrap();
    assert_eq!(tournament.winner_id, Some(p3));

    // a late report for the loser changes nothing
    let late = assert_ok!(b.advancer.advance(b.tournament_id, 1, p0, "c-4").await);
    assert_eq!(late, AdvanceResult::AlreadyApplied { round_number: 1 });
    let tournament = b.store.get_tournament(b.tournament_id).await.unwrap().unwrap();
    assert_eq!(tournament.winner_id, Some(p3));
}

#[tokio::test]
async fn test_inconsistent_reports_are_rejected() {
    let b = four_player_bracket(SeriesFormat::Bo3, SeriesFormat::Bo3).await;

    let err = assert_err!(b.advancer.advance(b.tournament_id, 2, b.players[3], "c-1").await);
    assert!(matches!(err, AdvanceError::PlayerNotInRound { round_number: 2, .. }));

    let err = assert_err!(b.advancer.advance(b.tournament_id, 9, b.players[0], "c-1").await);
    assert!(matches!(err, AdvanceError::RoundNotFound { round_number: 9, .. }));

    // the final is empty until a leaf completes
    let err = assert_err!(b.advancer.advance(b.tournament_id, 1, b.players[0], "c-1").await);
    assert!(matches!(err, AdvanceError::RoundNotReady { round_number: 1, seated: 0 }));
}

#[tokio::test]
async fn test_half_seated_final_cannot_be_won() {
    let b = four_player_bracket(SeriesFormat::Bo1, SeriesFormat::Bo1).await;
    let p0 = b.players[0];

    assert_ok!(b.advancer.advance(b.tournament_id, 2, p0, "leaf").await);

    let err = assert_err!(b.advancer.advance(b.tournament_id, 1, p0, "final").await);
    assert!(matches!(err, AdvanceError::RoundNotReady { round_number: 1, seated: 1 }));

    let tournament = b.store.get_tournament(b.tournament_id).await.unwrap().unwrap();
    assert_eq!(tournament.winner_id, None);
    let final_round = b.round(1).await;
    assert_eq!(final_round.players.len(), 1);
    assert_eq!(final_round.slot(p0).unwrap().win_count, 0);
    assert!(final_round.match_ids.is_empty());
    assert_eq!(b.round(3).await.winner_id, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_siblings_both_reach_parent() {
    for _ in 0..25 {
        let b = four_player_bracket(SeriesFormat::Bo1, SeriesFormat::Bo1).await;
        let advancer = Arc::new(BracketAdvancer::new(b.store.clone()));
        let id = b.tournament_id;
        let (left, right) = (b.players[1], b.players[2]);

        let tasks = [
            (2, left, "c-l"),
            (3, right, "c-r"),
            (3, right, "c-r"),
        ]
        .map(|(round_number, winner, match_id)| {
            let advancer = advancer.clone();
            tokio::spawn(async move { advancer.advance(id, round_number, winner, match_id).await })
        });
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let parent = b.round(1).await;
        assert_eq!(parent.players.len(), 2);
        assert_eq!(parent.slot(left).unwrap().color, PlayerColor::Red);
        assert_eq!(parent.slot(right).unwrap().color, PlayerColor::Blue);
    }
}
