use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccountDirectory, AddPlayer, ClaimResolution, HealthProbe, InsertMatch, LadderStore,
    MatchStore, Registration, StoreError, TournamentStore, WinIncrement,
};
use crate::models::{
    LadderSession, Match, MatchPlayer, MatchResolution, Round, RoundSlot, Tournament,
    TournamentContext,
};

#[derive(Debug, Clone)]
struct Account {
    discord_id: String,
    rating: i32,
}

#[derive(Debug, Default)]
struct MemoryState {
    matches: HashMap<String, Match>,
    tournaments: HashMap<Uuid, Tournament>,
    name_keys: HashSet<String>,
    ladders: HashMap<Uuid, LadderSession>,
    accounts: HashMap<Uuid, Account>,
}

/// Process-local store. Each trait call holds the lock for its whole body,
/// which gives the same atomicity as a single conditional statement.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account and returns its id.
    pub async fn seed_account(&self, discord_id: &str, rating: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.accounts.insert(
            id,
            Account {
                discord_id: discord_id.to_string(),
                rating,
            },
        );
        id
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_match(&self, combat_id: &str) -> Result<Option<Match>, StoreError> {
        Ok(self.state.lock().await.matches.get(combat_id).cloned())
    }

    async fn insert_match(&self, game: Match) -> Result<InsertMatch, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.matches.get(&game.combat_id) {
            return Ok(InsertMatch::Exists(existing.clone()));
        }
        state.matches.insert(game.combat_id.clone(), game.clone());
        Ok(InsertMatch::Created(game))
    }

    async fn add_player(
        &self,
        combat_id: &str,
        player: MatchPlayer,
        context: Option<TournamentContext>,
    ) -> Result<AddPlayer, StoreError> {
        let mut state = self.state.lock().await;
        let Some(game) = state.matches.get_mut(combat_id) else {
            return Ok(AddPlayer::NotFound);
        };
        if game.has_slot_for(&player) {
            return Ok(AddPlayer::AlreadyPresent(game.clone()));
        }
        if !game.try_add_player(player, context) {
            return Ok(AddPlayer::Full(game.clone()));
        }
        Ok(AddPlayer::Added(game.clone()))
    }

    async fn claim_resolution(
        &self,
        combat_id: &str,
        resolution: &MatchResolution,
    ) -> Result<ClaimResolution, StoreError> {
        let mut state = self.state.lock().await;
        let Some(game) = state.matches.get_mut(combat_id) else {
            return Ok(ClaimResolution::NotFound);
        };
        if game.is_resolved() {
            return Ok(ClaimResolution::AlreadyResolved(game.clone()));
        }
        if !game.is_populated() {
            return Ok(ClaimResolution::NotPopulated(game.clone()));
        }
        game.apply_resolution(resolution);
        Ok(ClaimResolution::Claimed(game.clone()))
    }

    async fn mark_bracket_applied(&self, combat_id: &str) -> Result<(), StoreError> {
        if let Some(game) = self.state.lock().await.matches.get_mut(combat_id) {
            game.bracket_applied = true;
        }
        Ok(())
    }

    async fn confirm_disconnect(
        &self,
        combat_id: &str,
        occurred: bool,
    ) -> Result<Option<Match>, StoreError> {
        let mut state = self.state.lock().await;
        match state.matches.get_mut(combat_id) {
            Some(game) if game.awaiting_disconnect_confirmation => {
                game.awaiting_disconnect_confirmation = false;
                game.disconnect_confirmed = true;
                game.disconnect_occurred = occurred;
                Ok(Some(game.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn insert_tournament(&self, tournament: &Tournament, name_key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.name_keys.insert(name_key.to_string()) {
            return Ok(false);
        }
        state.tournaments.insert(tournament.id, tournament.clone());
        Ok(true)
    }

    async fn get_tournament(&self, id: Uuid) -> Result<Option<Tournament>, StoreError> {
        Ok(self.state.lock().await.tournaments.get(&id).cloned())
    }

    async fn add_registrant(&self, id: Uuid, user_id: Uuid) -> Result<Registration, StoreError> {
        let mut state = self.state.lock().await;
        let Some(tournament) = state.tournaments.get_mut(&id) else {
            return Ok(Registration::NotFound);
        };
        if tournament.registrants.contains(&user_id) {
            return Ok(Registration::AlreadyRegistered(tournament.clone()));
        }
        if tournament.started {
            return Ok(Registration::Closed(tournament.clone()));
        }
        if tournament.is_full() {
            return Ok(Registration::Full(tournament.clone()));
        }
        tournament.registrants.push(user_id);
        Ok(Registration::Added(tournament.clone()))
    }

    async fn save_grid(&self, id: Uuid, grid: &[Round]) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.tournaments.get_mut(&id) {
            Some(tournament) if tournament.grid.is_empty() => {
                tournament.grid = grid.to_vec();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_round(&self, id: Uuid, round_number: u32) -> Result<Option<Round>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .get(&id)
            .and_then(|t| t.round(round_number))
            .cloned())
    }

    async fn increment_win(
        &self,
        id: Uuid,
        round_number: u32,
        user_id: Uuid,
        match_id: &str,
        threshold: u32,
    ) -> Result<WinIncrement, StoreError> {
        let mut state = self.state.lock().await;
        let Some(round) = state
            .tournaments
            .get_mut(&id)
            .and_then(|t| t.round_mut(round_number))
        else {
            return Ok(WinIncrement::RoundNotFound);
        };
        if !round.is_seated() {
            return Ok(WinIncrement::RoundNotReady {
                seated: round.players.len(),
            });
        }
        let Some(current) = round.slot(user_id).map(|s| s.win_count) else {
            return Ok(WinIncrement::PlayerNotInRound);
        };
        if round.winner_id.is_some()
            || current >= threshold
            || round.match_ids.iter().any(|m| m == match_id)
        {
            return Ok(WinIncrement::Replayed(round.clone()));
        }

        let win_count = current + 1;
        if let Some(slot) = round.slot_mut(user_id) {
            slot.win_count = win_count;
        }
        round.match_ids.push(match_id.to_string());
        let completed = win_count == threshold;
        if completed {
            round.winner_id = Some(user_id);
        }

        Ok(WinIncrement::Applied {
            win_count,
            completed,
            round: round.clone(),
        })
    }

    async fn push_slot(&self, id: Uuid, round_number: u32, slot: RoundSlot) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(round) = state
            .tournaments
            .get_mut(&id)
            .and_then(|t| t.round_mut(round_number))
        else {
            return Ok(false);
        };
        let seated = round
            .players
            .iter()
            .any(|s| s.color == slot.color || s.user_id == slot.user_id);
        if seated {
            return Ok(false);
        }
        round.players.push(slot);
        Ok(true)
    }

    async fn set_tournament_winner(&self, id: Uuid, winner_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.tournaments.get_mut(&id) {
            Some(tournament) if tournament.winner_id.is_none() => {
                tournament.winner_id = Some(winner_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn start_due_tournaments(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut flipped = 0;
        for tournament in state.tournaments.values_mut() {
            if !tournament.started && tournament.start_date <= now {
                tournament.started = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

#[async_trait]
impl LadderStore for MemoryStore {
    async fn insert_ladder(&self, session: &LadderSession) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .ladders
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_ladder(&self, id: Uuid) -> Result<Option<LadderSession>, StoreError> {
        Ok(self.state.lock().await.ladders.get(&id).cloned())
    }

    async fn append_ladder_match(&self, id: Uuid, match_id: &str) -> Result<Option<LadderSession>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.ladders.get_mut(&id) else {
            return Ok(None);
        };
        if session.active && !session.match_ids.iter().any(|m| m == match_id) {
            session.match_ids.push(match_id.to_string());
        }
        Ok(Some(session.clone()))
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn get_rating(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        Ok(self.state.lock().await.accounts.get(&id).map(|a| a.rating))
    }

    async fn add_rating(&self, id: Uuid, delta: i32) -> Result<i32, StoreError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("account {} does not exist", id)))?;
        account.rating += delta;
        Ok(account.rating)
    }

    async fn resolve_discord_ids(&self, discord_ids: &[String]) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock().await;
        Ok(discord_ids
            .iter()
            .filter_map(|discord_id| {
                state
                    .accounts
                    .iter()
                    .find(|(_, account)| &account.discord_id == discord_id)
                    .map(|(id, _)| *id)
            })
            .collect())
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
