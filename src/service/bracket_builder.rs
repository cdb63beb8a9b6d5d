use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::api_error::{Classify, ErrorKind};
use crate::models::{PlayerColor, Round, RoundSlot, SeriesFormat, FINAL_ROUND, SUPPORTED_ROSTER_SIZES};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("Unsupported roster size {0}; expected one of 4, 8, 16, 32, 64")]
    InvalidRosterSize(u32),

    #[error("Roster has {actual} registrants, bracket needs {expected}")]
    RosterMismatch { expected: u32, actual: usize },

    #[error("Player {0} is registered twice")]
    DuplicateRegistrant(Uuid),
}

impl Classify for BracketError {
    fn kind(&self) -> ErrorKind {
        match self {
            BracketError::InvalidRosterSize(_) => ErrorKind::Validation,
            BracketError::RosterMismatch { .. } | BracketError::DuplicateRegistrant(_) => {
                ErrorKind::Consistency
            }
        }
    }
}

pub fn is_supported_size(maximum_players: u32) -> bool {
    SUPPORTED_ROSTER_SIZES.contains(&maximum_players)
}

/// Number of stages a bracket of this size plays.
pub fn stage_count(maximum_players: u32) -> u32 {
    maximum_players.trailing_zeros()
}

/// Depth of a node counted from the final, starting at 1.
pub fn stage_of(round_number: u32) -> u32 {
    u32::BITS - round_number.leading_zeros()
}

pub fn parent_of(round_number: u32) -> Option<u32> {
    (round_number > FINAL_ROUND).then(|| round_number / 2)
}

pub fn children_of(round_number: u32, maximum_players: u32) -> Vec<u32> {
    let left = round_number * 2;
    if left < maximum_players {
        vec![left, left + 1]
    } else {
        vec![]
    }
}

/// Builds the full tree for a complete roster.
///
/// Rounds `max/2 .. max-1` are the first stage. Leaf `k` (counted from the
/// left) seats registrants `2k` as RED and `2k+1` as BLUE, so registration
/// order is seeding order. Every other round starts empty and is filled by
/// winners coming up from its two children.
pub fn build_grid(
    registrants: &[Uuid],
    maximum_players: u32,
    round_format: SeriesFormat,
    final_format: SeriesFormat,
) -> Result<Vec<Round>, BracketError> {
    if !is_supported_size(maximum_players) {
        return Err(BracketError::InvalidRosterSize(maximum_players));
    }
    if registrants.len() != maximum_players as usize {
        return Err(BracketError::RosterMismatch {
            expected: maximum_players,
            actual: registrants.len(),
        });
    }
    let mut seen = HashSet::with_capacity(registrants.len());
    if let Some(dup) = registrants.iter().find(|id| !seen.insert(**id)) {
        return Err(BracketError::DuplicateRegistrant(*dup));
    }

    let first_leaf = maximum_players / 2;
    let grid = (FINAL_ROUND..maximum_players)
        .map(|round_number| {
            let players = if round_number >= first_leaf {
                let pair = ((round_number - first_leaf) * 2) as usize;
                vec![
                    RoundSlot {
                        user_id: registrants[pair],
                        color: PlayerColor::Red,
                        win_count: 0,
                    },
                    RoundSlot {
                        user_id: registrants[pair + 1],
                        color: PlayerColor::Blue,
                        win_count: 0,
                    },
                ]
            } else {
                vec![]
            };

            Round {
                round_number,
                stage: stage_of(round_number),
                parent_round_number: parent_of(round_number),
                child_round_numbers: children_of(round_number, maximum_players),
                players,
                match_ids: vec![],
                format: if round_number == FINAL_ROUND {
                    final_format
                } else {
                    round_format
                },
                winner_id: None,
            }
        })
        .collect();

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(size: u32) -> Vec<Uuid> {
        (0..size).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_tree_shape_for_every_size() {
        for size in SUPPORTED_ROSTER_SIZES {
            let players = roster(size);
            let grid = build_grid(&players, size, SeriesFormat::Bo3, SeriesFormat::Bo5).unwrap();

            assert_eq!(grid.len() as u32, size - 1);

            let leaves: Vec<_> = grid.iter().filter(|r| r.is_leaf()).collect();
            assert_eq!(leaves.len() as u32, size / 2);
            for leaf in &leaves {
                assert_eq!(leaf.players.len(), 2);
                assert_eq!(leaf.stage, stage_count(size));
            }
            for inner in grid.iter().filter(|r| !r.is_leaf()) {
                assert!(inner.players.is_empty());
                assert_eq!(inner.child_round_numbers.len(), 2);
            }

            // every non-final round is listed as a child by exactly its parent
            for round in grid.iter().filter(|r| !r.is_final()) {
                let parent_number = round.parent_round_number.unwrap();
                let listing: Vec<_> = grid
                    .iter()
                    .filter(|r| r.child_round_numbers.contains(&round.round_number))
                    .collect();
                assert_eq!(listing.len(), 1);
                assert_eq!(listing[0].round_number, parent_number);
            }

            // walking up from any leaf reaches the final in R-1 steps
            for leaf in &leaves {
                let mut steps = 0;
                let mut current = leaf.round_number;
                while let Some(parent) = parent_of(current) {
                    current = parent;
                    steps += 1;
                }
                assert_eq!(current, FINAL_ROUND);
                assert_eq!(steps, stage_count(size) - 1);
            }

            let mut seated: Vec<Uuid> = leaves
                .iter()
                .flat_map(|r| r.players.iter().map(|s| s.user_id))
                .collect();
            seated.sort();
            let mut expected = players.clone();
            expected.sort();
            assert_eq!(seated, expected);
        }
    }

    #[test]
    fn test_four_player_grid() {
        let players = roster(4);
        let grid = build_grid(&players, 4, SeriesFormat::Bo3, SeriesFormat::Bo5).unwrap();

        let numbers: Vec<u32> = grid.iter().map(|r| r.round_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let final_round = &grid[0];
        assert_eq!(final_round.child_round_numbers, vec![2, 3]);
        assert_eq!(final_round.format, SeriesFormat::Bo5);
        assert_eq!(final_round.parent_round_number, None);

        assert_eq!(grid[1].players[0].user_id, players[0]);
        assert_eq!(grid[1].players[0].color, PlayerColor::Red);
        assert_eq!(grid[1].players[1].user_id, players[1]);
        assert_eq!(grid[1].players[1].color, PlayerColor::Blue);
        assert_eq!(grid[2].players[0].user_id, players[2]);
        assert_eq!(grid[2].players[1].user_id, players[3]);
        assert_eq!(grid[2].format, SeriesFormat::Bo3);
        assert_eq!(grid[2].parent_round_number, Some(1));
    }

    #[test]
    fn test_rejects_bad_rosters() {
        assert_eq!(
            build_grid(&roster(6), 6, SeriesFormat::Bo1, SeriesFormat::Bo1),
            Err(BracketError::InvalidRosterSize(6))
        );
        assert_eq!(
            build_grid(&roster(3), 4, SeriesFormat::Bo1, SeriesFormat::Bo1),
            Err(BracketError::RosterMismatch {
                expected: 4,
                actual: 3
            })
        );

        let mut players = roster(4);
        players[3] = players[0];
        assert_eq!(
            build_grid(&players, 4, SeriesFormat::Bo1, SeriesFormat::Bo1),
            Err(BracketError::DuplicateRegistrant(players[0]))
        );
    }

    #[test]
    fn test_node_arithmetic() {
        assert_eq!(stage_of(1), 1);
        assert_eq!(stage_of(2), 2);
        assert_eq!(stage_of(3), 2);
        assert_eq!(stage_of(63), 6);
        assert_eq!(parent_of(1), None);
        assert_eq!(parent_of(5), Some(2));
        assert_eq!(children_of(3, 8), vec![6, 7]);
        assert!(children_of(4, 8).is_empty());
        assert_eq!(stage_count(64), 6);
    }
}
