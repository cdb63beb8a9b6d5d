use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A match never holds more than one red and one blue player.
pub const MAX_PLAYERS_PER_MATCH: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerColor {
    Red,
    Blue,
}

impl PlayerColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerColor::Red => "RED",
            PlayerColor::Blue => "BLUE",
        }
    }

    pub fn opponent(&self) -> PlayerColor {
        match self {
            PlayerColor::Red => PlayerColor::Blue,
            PlayerColor::Blue => PlayerColor::Red,
        }
    }
}

impl std::fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlayerColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(PlayerColor::Red),
            "BLUE" => Ok(PlayerColor::Blue),
            other => Err(format!("unknown player color: {}", other)),
        }
    }
}

/// Hero statistics reported by the game client at the start of combat.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatTotals {
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub spell_power: i32,
    #[serde(default)]
    pub knowledge: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmyStack {
    pub creature: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayer {
    pub user_id: Option<Uuid>,
    pub color: PlayerColor,
    pub hero: Option<String>,
    pub stat_totals: StatTotals,
    pub army_remainder: Option<Vec<ArmyStack>>,
    pub winner: bool,
}

impl MatchPlayer {
    pub fn new(user_id: Option<Uuid>, color: PlayerColor, hero: Option<String>, stat_totals: StatTotals) -> Self {
        Self {
            user_id,
            color,
            hero,
            stat_totals,
            army_remainder: None,
            winner: false,
        }
    }

    /// Two entries describe the same participant when both carry the same
    /// account id, or when they share a color and at least one is anonymous.
    pub fn occupies_same_slot(&self, other: &MatchPlayer) -> bool {
        match (self.user_id, other.user_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.color == other.color,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TournamentContext {
    pub tournament_id: Uuid,
    pub round_number: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStage {
    Created,
    Populated,
    Resolved,
    DisconnectConfirmed,
}

/// One played game between two players, keyed by the client-generated combat id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub combat_id: String,
    pub map_version: String,
    pub players: Vec<MatchPlayer>,
    pub tournament_id: Option<Uuid>,
    pub round_number: Option<u32>,
    pub winner_color: Option<PlayerColor>,
    pub percentage_of_army_left: Option<f64>,
    pub date: Option<DateTime<Utc>>,
    pub disconnect_occurred: bool,
    pub awaiting_disconnect_confirmation: bool,
    /// Set once the disconnect question has been answered either way.
    pub disconnect_confirmed: bool,
    pub bracket_applied: bool,
}

impl Match {
    pub fn new(
        combat_id: String,
        map_version: String,
        first_player: MatchPlayer,
        context: Option<TournamentContext>,
    ) -> Self {
        Self {
            combat_id,
            map_version,
            players: vec![first_player],
            tournament_id: context.map(|c| c.tournament_id),
            round_number: context.map(|c| c.round_number),
            winner_color: None,
            percentage_of_army_left: None,
            date: None,
            disconnect_occurred: false,
            awaiting_disconnect_confirmation: false,
            disconnect_confirmed: false,
            bracket_applied: false,
        }
    }

    pub fn stage(&self) -> MatchStage {
        if self.winner_color.is_some() {
            if self.disconnect_confirmed {
                return MatchStage::DisconnectConfirmed;
            }
            return MatchStage::Resolved;
        }
        if self.players.len() >= MAX_PLAYERS_PER_MATCH {
            MatchStage::Populated
        } else {
            MatchStage::Created
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.winner_color.is_some()
    }

    pub fn is_populated(&self) -> bool {
        self.players.len() == MAX_PLAYERS_PER_MATCH
    }

    pub fn tournament_context(&self) -> Option<TournamentContext> {
        match (self.tournament_id, self.round_number) {
            (Some(tournament_id), Some(round_number)) => Some(TournamentContext {
                tournament_id,
                round_number,
            }),
            _ => None,
        }
    }

    pub fn has_slot_for(&self, player: &MatchPlayer) -> bool {
        self.players.iter().any(|p| p.occupies_same_slot(player))
    }

    pub fn player(&self, color: PlayerColor) -> Option<&MatchPlayer> {
        self.players.iter().find(|p| p.color == color)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.players.iter().any(|p| p.user_id == Some(user_id))
    }

    pub fn winner(&self) -> Option<&MatchPlayer> {
        self.winner_color.and_then(|c| self.player(c))
    }

    pub fn loser(&self) -> Option<&MatchPlayer> {
        self.winner_color.and_then(|c| self.player(c.opponent()))
    }

    /// Merges a submission into the record. Returns false when the slot is
    /// already taken or the match is full.
    pub fn try_add_player(&mut self, player: MatchPlayer, context: Option<TournamentContext>) -> bool {
        if self.has_slot_for(&player)
            || self.players.len() >= MAX_PLAYERS_PER_MATCH
            || self.player(player.color).is_some()
        {
            return false;
        }
        self.players.push(player);
        if self.tournament_id.is_none() {
            if let Some(ctx) = context {
                self.tournament_id = Some(ctx.tournament_id);
                self.round_number = Some(ctx.round_number);
            }
        }
        true
    }

    pub fn apply_resolution(&mut self, resolution: &MatchResolution) {
        self.winner_color = Some(resolution.winner_color);
        self.percentage_of_army_left = resolution.percentage_of_army_left;
        self.date = Some(resolution.date);
        self.awaiting_disconnect_confirmation = resolution.awaiting_disconnect_confirmation;
        for player in self.players.iter_mut() {
            player.winner = player.color == resolution.winner_color;
            if player.winner {
                player.army_remainder = resolution.army_remainder.clone();
            }
        }
    }
}

/// Final result reported by one of the clients.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResolution {
    pub winner_color: PlayerColor,
    pub army_remainder: Option<Vec<ArmyStack>>,
    pub percentage_of_army_left: Option<f64>,
    pub date: DateTime<Utc>,
    pub awaiting_disconnect_confirmation: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitOutcome {
    Created,
    Updated,
    AlreadyRegistered,
}

impl SubmitOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SubmitOutcome::Created => "record created",
            SubmitOutcome::Updated => "record updated",
            SubmitOutcome::AlreadyRegistered => "record already has this player",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
}

impl ResolveOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ResolveOutcome::Resolved => "final match data recorded",
            ResolveOutcome::AlreadyResolved => "final match data already recorded",
        }
    }
}

// ===== API DTOs =====

/// Body of `POST /save-game-params`
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SaveGameParamsRequest {
    #[validate(length(min = 1, max = 128))]
    pub combat_id: String,
    #[validate(length(min = 1, max = 64))]
    pub map_version: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<Uuid>,
    pub color: PlayerColor,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub hero: Option<String>,
    #[serde(default)]
    pub stat_totals: StatTotals,
    #[serde(default)]
    pub tournament_id: Option<Uuid>,
    #[serde(default)]
    pub round_number: Option<u32>,
}

impl SaveGameParamsRequest {
    /// Tournament id and round number travel together or not at all.
    pub fn tournament_context(&self) -> Result<Option<TournamentContext>, String> {
        match (self.tournament_id, self.round_number) {
            (Some(tournament_id), Some(round_number)) => Ok(Some(TournamentContext {
                tournament_id,
                round_number,
            })),
            (None, None) => Ok(None),
            _ => Err("tournament_id and round_number must be sent together".to_string()),
        }
    }

    pub fn player(&self) -> MatchPlayer {
        MatchPlayer::new(
            self.user_id,
            self.color,
            self.hero.clone(),
            self.stat_totals.clone(),
        )
    }
}

/// Body of `POST /save-game-winner`
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SaveGameWinnerRequest {
    #[validate(length(min = 1, max = 128))]
    pub combat_id: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<Uuid>,
    pub winner: PlayerColor,
    #[serde(default)]
    pub army_remainder: Option<Vec<ArmyStack>>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub percentage_of_army_left: Option<f64>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "wasDisconnect", default)]
    pub was_disconnect: bool,
}

/// Body of `POST /set-game-disconnect-status`
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SetDisconnectStatusRequest {
    #[validate(length(min = 1, max = 128))]
    pub combat_id: String,
    #[serde(rename = "IsDisconnect")]
    pub is_disconnect: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(color: PlayerColor, user: Option<Uuid>) -> MatchPlayer {
        MatchPlayer::new(user, color, None, StatTotals::default())
    }

    #[test]
    fn test_slot_identity() {
        let a = Uuid::new_v4();
        let red = player(PlayerColor::Red, Some(a));

        assert!(red.occupies_same_slot(&player(PlayerColor::Red, None)));
        assert!(red.occupies_same_slot(&player(PlayerColor::Blue, Some(a))));
        assert!(!red.occupies_same_slot(&player(PlayerColor::Blue, Some(Uuid::new_v4()))));
        assert!(!red.occupies_same_slot(&player(PlayerColor::Blue, None)));
        assert!(!red.occupies_same_slot(&player(PlayerColor::Red, Some(Uuid::new_v4()))));
    }

    #[test]
    fn test_stage_progression() {
        let mut game = Match::new(
            "c-1".to_string(),
            "1.4".to_string(),
            player(PlayerColor::Red, Some(Uuid::new_v4())),
            None,
        );
        assert_eq!(game.stage(), MatchStage::Created);

        assert!(game.try_add_player(player(PlayerColor::Blue, Some(Uuid::new_v4())), None));
        assert_eq!(game.stage(), MatchStage::Populated);
        assert!(!game.try_add_player(player(PlayerColor::Blue, Some(Uuid::new_v4())), None));

        game.apply_resolution(&MatchResolution {
            winner_color: PlayerColor::Blue,
            army_remainder: Some(vec![ArmyStack {
                creature: "pikeman".to_string(),
                count: 12,
            }]),
            percentage_of_army_left: Some(40.0),
            date: Utc::now(),
            awaiting_disconnect_confirmation: false,
        });
        assert_eq!(game.stage(), MatchStage::Resolved);
        assert!(game.player(PlayerColor::Blue).unwrap().winner);
        assert!(!game.player(PlayerColor::Red).unwrap().winner);
        assert!(game.player(PlayerColor::Blue).unwrap().army_remainder.is_some());
        assert_eq!(game.loser().unwrap().color, PlayerColor::Red);
    }

    #[test]
    fn test_tournament_context_requires_both_fields() {
        let json = r#"{"combat_id":"c","map_version":"1","color":"RED","tournament_id":"7f1c7c1e-0a44-4a39-8a3e-3f0b3a7a7a11"}"#;
        let req: SaveGameParamsRequest = serde_json::from_str(json).unwrap();
        assert!(req.tournament_context().is_err());
    }

    #[test]
    fn test_winner_request_field_names() {
        let json = r#"{"combat_id":"c","userId":"7f1c7c1e-0a44-4a39-8a3e-3f0b3a7a7a11","winner":"BLUE","percentage_of_army_left":55.5,"wasDisconnect":true}"#;
        let req: SaveGameWinnerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.winner, PlayerColor::Blue);
        assert!(req.was_disconnect);
        assert!(Validate::validate(&req).is_ok());

        let out_of_range = SaveGameWinnerRequest {
            percentage_of_army_left: Some(140.0),
            ..req
        };
        assert!(Validate::validate(&out_of_range).is_err());
    }

    #[test]
    fn test_color_serialization() {
        assert_eq!(serde_json::to_string(&PlayerColor::Red).unwrap(), "\"RED\"");
        assert_eq!("BLUE".parse::<PlayerColor>().unwrap(), PlayerColor::Blue);
        assert!("GREEN".parse::<PlayerColor>().is_err());
    }
}
