use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    AccountDirectory, AddPlayer, ClaimResolution, HealthProbe, InsertMatch, LadderStore,
    MatchStore, Registration, StoreError, TournamentStore, WinIncrement,
};
use crate::db::DbPool;
use crate::models::{
    ArmyStack, LadderSession, Match, MatchPlayer, MatchResolution, PlayerColor, Round, RoundSlot,
    SeriesFormat, StatTotals, Tournament, TournamentContext,
};

const MATCH_COLUMNS: &str = "combat_id, map_version, tournament_id, round_number, winner_color, \
     percentage_of_army_left, date, disconnect_occurred, awaiting_disconnect_confirmation, \
     disconnect_confirmed, bracket_applied";

const TOURNAMENT_COLUMNS: &str = "id, name, start_date, registrants, started, maximum_players, \
     round_format, final_format, winner_id, created_at";

const ROUND_COLUMNS: &str = "round_number, stage, parent_round_number, child_round_numbers, \
     format, match_ids, winner_id";

/// Postgres-backed store. Every public call is bounded by `timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Unavailable(format!(
                    "{} exceeded {:?}",
                    operation, self.timeout
                )))
            }
        }
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

#[derive(FromRow)]
struct MatchRow {
    combat_id: String,
    map_version: String,
    tournament_id: Option<Uuid>,
    round_number: Option<i32>,
    winner_color: Option<String>,
    percentage_of_army_left: Option<f64>,
    date: Option<DateTime<Utc>>,
    disconnect_occurred: bool,
    awaiting_disconnect_confirmation: bool,
    disconnect_confirmed: bool,
    bracket_applied: bool,
}

#[derive(FromRow)]
struct PlayerRow {
    color: String,
    user_id: Option<Uuid>,
    hero: Option<String>,
    stat_totals: Json<StatTotals>,
    army_remainder: Option<Json<Vec<ArmyStack>>>,
    winner: bool,
}

#[derive(FromRow)]
struct TournamentRow {
    id: Uuid,
    name: String,
    start_date: DateTime<Utc>,
    registrants: Vec<Uuid>,
    started: bool,
    maximum_players: i32,
    round_format: String,
    final_format: String,
    winner_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RoundRow {
    round_number: i32,
    stage: i32,
    parent_round_number: Option<i32>,
    child_round_numbers: Vec<i32>,
    format: String,
    match_ids: Vec<String>,
    winner_id: Option<Uuid>,
}

#[derive(FromRow)]
struct SlotRow {
    round_number: i32,
    user_id: Uuid,
    color: String,
    win_count: i32,
}

#[derive(FromRow)]
struct LadderRow {
    id: Uuid,
    active: bool,
    member_ids: Vec<Uuid>,
    match_ids: Vec<String>,
    created_at: DateTime<Utc>,
}

fn parse_color(value: &str) -> Result<PlayerColor, StoreError> {
    value.parse().map_err(StoreError::Corrupt)
}

fn parse_format(value: &str) -> Result<SeriesFormat, StoreError> {
    value.parse().map_err(StoreError::Corrupt)
}

impl PlayerRow {
    fn into_player(self) -> Result<MatchPlayer, StoreError> {
        Ok(MatchPlayer {
            user_id: self.user_id,
            color: parse_color(&self.color)?,
            hero: self.hero,
            stat_totals: self.stat_totals.0,
            army_remainder: self.army_remainder.map(|a| a.0),
            winner: self.winner,
        })
    }
}

impl MatchRow {
    fn into_match(self, players: Vec<PlayerRow>) -> Result<Match, StoreError> {
        Ok(Match {
            combat_id: self.combat_id,
            map_version: self.map_version,
            players: players
                .into_iter()
                .map(PlayerRow::into_player)
                .collect::<Result<_, _>>()?,
            tournament_id: self.tournament_id,
            round_number: self.round_number.map(|n| n as u32),
            winner_color: self.winner_color.as_deref().map(parse_color).transpose()?,
            percentage_of_army_left: self.percentage_of_army_left,
            date: self.date,
            disconnect_occurred: self.disconnect_occurred,
            awaiting_disconnect_confirmation: self.awaiting_disconnect_confirmation,
            disconnect_confirmed: self.disconnect_confirmed,
            bracket_applied: self.bracket_applied,
        })
    }
}

impl RoundRow {
    fn into_round(self, slots: &[SlotRow]) -> Result<Round, StoreError> {
        let players = slots
            .iter()
            .filter(|s| s.round_number == self.round_number)
            .map(|s| {
                Ok(RoundSlot {
                    user_id: s.user_id,
                    color: parse_color(&s.color)?,
                    win_count: s.win_count as u32,
                })
            })
            .collect::<Result<_, StoreError>>()?;

        Ok(Round {
            round_number: self.round_number as u32,
            stage: self.stage as u32,
            parent_round_number: self.parent_round_number.map(|n| n as u32),
            child_round_numbers: self.child_round_numbers.into_iter().map(|n| n as u32).collect(),
            players,
            match_ids: self.match_ids,
            format: parse_format(&self.format)?,
            winner_id: self.winner_id,
        })
    }
}

impl From<LadderRow> for LadderSession {
    fn from(row: LadderRow) -> Self {
        Self {
            id: row.id,
            active: row.active,
            member_ids: row.member_ids,
            match_ids: row.match_ids,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// LOADERS
// =============================================================================

async fn load_match(conn: &mut PgConnection, combat_id: &str) -> Result<Option<Match>, StoreError> {
    let row: Option<MatchRow> = sqlx::query_as(&format!(
        "SELECT {} FROM matches WHERE combat_id = $1",
        MATCH_COLUMNS
    ))
    .bind(combat_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let players: Vec<PlayerRow> = sqlx::query_as(
        r#"
        SELECT color, user_id, hero, stat_totals, army_remainder, winner
        FROM match_players
        WHERE combat_id = $1
        ORDER BY seat ASC
        "#,
    )
    .bind(combat_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_match(players).map(Some)
}

async fn lock_match(conn: &mut PgConnection, combat_id: &str) -> Result<Option<Match>, StoreError> {
    let locked: Option<String> =
        sqlx::query_scalar("SELECT combat_id FROM matches WHERE combat_id = $1 FOR UPDATE")
            .bind(combat_id)
            .fetch_optional(&mut *conn)
            .await?;
    if locked.is_none() {
        return Ok(None);
    }
    load_match(conn, combat_id).await
}

async fn insert_player(
    conn: &mut PgConnection,
    combat_id: &str,
    seat: usize,
    player: &MatchPlayer,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO match_players (
            combat_id, seat, color, user_id, hero, stat_totals, army_remainder, winner
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(combat_id)
    .bind(seat as i16)
    .bind(player.color.as_str())
    .bind(player.user_id)
    .bind(&player.hero)
    .bind(Json(&player.stat_totals))
    .bind(player.army_remainder.as_ref().map(Json))
    .bind(player.winner)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn load_rounds(
    conn: &mut PgConnection,
    tournament_id: Uuid,
    round_number: Option<u32>,
) -> Result<Vec<Round>, StoreError> {
    let filter = round_number.map(|n| n as i32);

    let rows: Vec<RoundRow> = sqlx::query_as(&format!(
        "SELECT {} FROM tournament_rounds \
         WHERE tournament_id = $1 AND ($2::INTEGER IS NULL OR round_number = $2) \
         ORDER BY round_number ASC",
        ROUND_COLUMNS
    ))
    .bind(tournament_id)
    .bind(filter)
    .fetch_all(&mut *conn)
    .await?;

    let slots: Vec<SlotRow> = sqlx::query_as(
        r#"
        SELECT round_number, user_id, color, win_count
        FROM round_slots
        WHERE tournament_id = $1 AND ($2::INTEGER IS NULL OR round_number = $2)
        ORDER BY round_number ASC, CASE color WHEN 'RED' THEN 0 ELSE 1 END
        "#,
    )
    .bind(tournament_id)
    .bind(filter)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(|r| r.into_round(&slots)).collect()
}

async fn load_tournament(conn: &mut PgConnection, id: Uuid) -> Result<Option<Tournament>, StoreError> {
    let row: Option<TournamentRow> = sqlx::query_as(&format!(
        "SELECT {} FROM tournaments WHERE id = $1",
        TOURNAMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let grid = load_rounds(conn, id, None).await?;

    Ok(Some(Tournament {
        id: row.id,
        name: row.name,
        start_date: row.start_date,
        registrants: row.registrants,
        started: row.started,
        maximum_players: row.maximum_players as u32,
        round_format: parse_format(&row.round_format)?,
        final_format: parse_format(&row.final_format)?,
        grid,
        winner_id: row.winner_id,
        created_at: row.created_at,
    }))
}

// =============================================================================
// MATCHES
// =============================================================================

#[async_trait]
impl MatchStore for PgStore {
    async fn get_match(&self, combat_id: &str) -> Result<Option<Match>, StoreError> {
        self.bounded("get_match", async {
            let mut conn = self.pool.acquire().await?;
            load_match(&mut conn, combat_id).await
        })
        .await
    }

    async fn insert_match(&self, game: Match) -> Result<InsertMatch, StoreError> {
        self.bounded("insert_match", async {
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO matches (combat_id, map_version, tournament_id, round_number)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (combat_id) DO NOTHING
                "#,
            )
            .bind(&game.combat_id)
            .bind(&game.map_version)
            .bind(game.tournament_id)
            .bind(game.round_number.map(|n| n as i32))
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                let existing = load_match(&mut tx, &game.combat_id).await?;
                tx.commit().await?;
                return existing
                    .map(InsertMatch::Exists)
                    .ok_or_else(|| StoreError::Corrupt(format!("match {} vanished", game.combat_id)));
            }

            for (seat, player) in game.players.iter().enumerate() {
                insert_player(&mut tx, &game.combat_id, seat, player).await?;
            }
            tx.commit().await?;

            debug!(combat_id = %game.combat_id, "Match row inserted");
            Ok::<_, StoreError>(InsertMatch::Created(game))
        })
        .await
    }

    async fn add_player(
        &self,
        combat_id: &str,
        player: MatchPlayer,
        context: Option<TournamentContext>,
    ) -> Result<AddPlayer, StoreError> {
        self.bounded("add_player", async {
            let mut tx = self.pool.begin().await?;

            let Some(mut game) = lock_match(&mut tx, combat_id).await? else {
                return Ok(AddPlayer::NotFound);
            };
            if game.has_slot_for(&player) {
                return Ok(AddPlayer::AlreadyPresent(game));
            }
            let seat = game.players.len();
            let had_context = game.tournament_id.is_some();
            if !game.try_add_player(player.clone(), context) {
                return Ok(AddPlayer::Full(game));
            }

            insert_player(&mut tx, combat_id, seat, &player).await?;
            if !had_context && game.tournament_id.is_some() {
                sqlx::query(
                    r#"
                    UPDATE matches
                    SET tournament_id = $2, round_number = $3
                    WHERE combat_id = $1 AND tournament_id IS NULL
                    "#,
                )
                .bind(combat_id)
                .bind(game.tournament_id)
                .bind(game.round_number.map(|n| n as i32))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            Ok::<_, StoreError>(AddPlayer::Added(game))
        })
        .await
    }

    async fn claim_resolution(
        &self,
        combat_id: &str,
        resolution: &MatchResolution,
    ) -> Result<ClaimResolution, StoreError> {
        self.bounded("claim_resolution", async {
            let mut tx = self.pool.begin().await?;

            let Some(mut game) = lock_match(&mut tx, combat_id).await? else {
                return Ok(ClaimResolution::NotFound);
            };
            if game.is_resolved() {
                return Ok(ClaimResolution::AlreadyResolved(game));
            }
            if !game.is_populated() {
                return Ok(ClaimResolution::NotPopulated(game));
            }

            let claimed = sqlx::query(
                r#"
                UPDATE matches
                SET winner_color = $2,
                    percentage_of_army_left = $3,
                    date = $4,
                    awaiting_disconnect_confirmation = $5
                WHERE combat_id = $1 AND winner_color IS NULL
                "#,
            )
            .bind(combat_id)
            .bind(resolution.winner_color.as_str())
            .bind(resolution.percentage_of_army_left)
            .bind(resolution.date)
            .bind(resolution.awaiting_disconnect_confirmation)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if claimed == 0 {
                return Err(StoreError::Corrupt(format!(
                    "match {} resolved while locked",
                    combat_id
                )));
            }

            sqlx::query(
                r#"
                UPDATE match_players
                SET winner = (color = $2),
                    army_remainder = CASE WHEN color = $2 THEN $3 ELSE army_remainder END
                WHERE combat_id = $1
                "#,
            )
            .bind(combat_id)
            .bind(resolution.winner_color.as_str())
            .bind(resolution.army_remainder.as_ref().map(Json))
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            game.apply_resolution(resolution);
            Ok::<_, StoreError>(ClaimResolution::Claimed(game))
        })
        .await
    }

    async fn mark_bracket_applied(&self, combat_id: &str) -> Result<(), StoreError> {
        self.bounded("mark_bracket_applied", async {
            sqlx::query("UPDATE matches SET bracket_applied = TRUE WHERE combat_id = $1")
                .bind(combat_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn confirm_disconnect(
        &self,
        combat_id: &str,
        occurred: bool,
    ) -> Result<Option<Match>, StoreError> {
        self.bounded("confirm_disconnect", async {
            let mut conn = self.pool.acquire().await?;
            let updated = sqlx::query(
                r#"
                UPDATE matches
                SET awaiting_disconnect_confirmation = FALSE,
                    disconnect_confirmed = TRUE,
                    disconnect_occurred = $2
                WHERE combat_id = $1 AND awaiting_disconnect_confirmation = TRUE
                "#,
            )
            .bind(combat_id)
            .bind(occurred)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            if updated == 0 {
                return Ok(None);
            }
            load_match(&mut conn, combat_id).await
        })
        .await
    }
}

// =============================================================================
// TOURNAMENTS
// =============================================================================

#[async_trait]
impl TournamentStore for PgStore {
    async fn insert_tournament(&self, tournament: &Tournament, name_key: &str) -> Result<bool, StoreError> {
        self.bounded("insert_tournament", async {
            let inserted = sqlx::query(
                r#"
                INSERT INTO tournaments (
                    id, name, name_key, start_date, registrants, started,
                    maximum_players, round_format, final_format, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (name_key) DO NOTHING
                "#,
            )
            .bind(tournament.id)
            .bind(&tournament.name)
            .bind(name_key)
            .bind(tournament.start_date)
            .bind(&tournament.registrants)
            .bind(tournament.started)
            .bind(tournament.maximum_players as i32)
            .bind(tournament.round_format.as_str())
            .bind(tournament.final_format.as_str())
            .bind(tournament.created_at)
            .execute(&self.pool)
            .await?
            .rows_affected();

            Ok::<_, StoreError>(inserted == 1)
        })
        .await
    }

    async fn get_tournament(&self, id: Uuid) -> Result<Option<Tournament>, StoreError> {
        self.bounded("get_tournament", async {
            let mut conn = self.pool.acquire().await?;
            load_tournament(&mut conn, id).await
        })
        .await
    }

    async fn add_registrant(&self, id: Uuid, user_id: Uuid) -> Result<Registration, StoreError> {
        self.bounded("add_registrant", async {
            let mut conn = self.pool.acquire().await?;

            let added = sqlx::query(
                r#"
                UPDATE tournaments
                SET registrants = array_append(registrants, $2)
                WHERE id = $1
                  AND started = FALSE
                  AND NOT ($2 = ANY(registrants))
                  AND cardinality(registrants) < maximum_players
                "#,
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            let Some(tournament) = load_tournament(&mut conn, id).await? else {
                return Ok(Registration::NotFound);
            };

            if added == 1 {
                return Ok(Registration::Added(tournament));
            }
            if tournament.registrants.contains(&user_id) {
                return Ok(Registration::AlreadyRegistered(tournament));
            }
            if tournament.started {
                return Ok(Registration::Closed(tournament));
            }
            Ok::<_, StoreError>(Registration::Full(tournament))
        })
        .await
    }

    async fn save_grid(&self, id: Uuid, grid: &[Round]) -> Result<bool, StoreError> {
        self.bounded("save_grid", async {
            let mut tx = self.pool.begin().await?;

            let claimed = sqlx::query(
                "UPDATE tournaments SET grid_built = TRUE WHERE id = $1 AND grid_built = FALSE",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if claimed == 0 {
                return Ok(false);
            }

            for round in grid {
                let children: Vec<i32> = round.child_round_numbers.iter().map(|n| *n as i32).collect();
                sqlx::query(
                    r#"
                    INSERT INTO tournament_rounds (
                        tournament_id, round_number, stage, parent_round_number,
                        child_round_numbers, format, match_ids, winner_id
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(id)
                .bind(round.round_number as i32)
                .bind(round.stage as i32)
                .bind(round.parent_round_number.map(|n| n as i32))
                .bind(children)
                .bind(round.format.as_str())
                .bind(&round.match_ids)
                .bind(round.winner_id)
                .execute(&mut *tx)
                .await?;

                for slot in &round.players {
                    sqlx::query(
                        r#"
                        INSERT INTO round_slots (tournament_id, round_number, user_id, color, win_count)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(id)
                    .bind(round.round_number as i32)
                    .bind(slot.user_id)
                    .bind(slot.color.as_str())
                    .bind(slot.win_count as i32)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            tx.commit().await?;
            Ok::<_, StoreError>(true)
        })
        .await
    }

    async fn get_round(&self, id: Uuid, round_number: u32) -> Result<Option<Round>, StoreError> {
        self.bounded("get_round", async {
            let mut conn = self.pool.acquire().await?;
            Ok::<_, StoreError>(load_rounds(&mut conn, id, Some(round_number)).await?.pop())
        })
        .await
    }

    async fn increment_win(
        &self,
        id: Uuid,
        round_number: u32,
        user_id: Uuid,
        match_id: &str,
        threshold: u32,
    ) -> Result<WinIncrement, StoreError> {
        self.bounded("increment_win", async {
            let mut tx = self.pool.begin().await?;

            let locked: Option<i32> = sqlx::query_scalar(
                r#"
                SELECT round_number FROM tournament_rounds
                WHERE tournament_id = $1 AND round_number = $2
                FOR UPDATE
                "#,
            )
            .bind(id)
            .bind(round_number as i32)
            .fetch_optional(&mut *tx)
            .await?;

            if locked.is_none() {
                return Ok(WinIncrement::RoundNotFound);
            }

            let Some(round) = load_rounds(&mut tx, id, Some(round_number)).await?.pop() else {
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
                return Ok(WinIncrement::Replayed(round));
            }

            let win_count: i32 = sqlx::query_scalar(
                r#"
                UPDATE round_slots
                SET win_count = win_count + 1
                WHERE tournament_id = $1 AND round_number = $2 AND user_id = $3 AND win_count < $4
                RETURNING win_count
                "#,
            )
            .bind(id)
            .bind(round_number as i32)
            .bind(user_id)
            .bind(threshold as i32)
            .fetch_one(&mut *tx)
            .await?;

            let completed = win_count as u32 == threshold;
            sqlx::query(
                r#"
                UPDATE tournament_rounds
                SET match_ids = array_append(match_ids, $3),
                    winner_id = CASE WHEN $4 THEN $5 ELSE winner_id END
                WHERE tournament_id = $1 AND round_number = $2
                "#,
            )
            .bind(id)
            .bind(round_number as i32)
            .bind(match_id)
            .bind(completed)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            let round = load_rounds(&mut tx, id, Some(round_number))
                .await?
                .pop()
                .ok_or_else(|| StoreError::Corrupt(format!("round {} vanished", round_number)))?;
            tx.commit().await?;

            Ok::<_, StoreError>(WinIncrement::Applied {
                win_count: win_count as u32,
                completed,
                round,
            })
        })
        .await
    }

    async fn push_slot(&self, id: Uuid, round_number: u32, slot: RoundSlot) -> Result<bool, StoreError> {
        self.bounded("push_slot", async {
            let inserted = sqlx::query(
                r#"
                INSERT INTO round_slots (tournament_id, round_number, user_id, color, win_count)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(round_number as i32)
            .bind(slot.user_id)
            .bind(slot.color.as_str())
            .bind(slot.win_count as i32)
            .execute(&self.pool)
            .await?
            .rows_affected();

            Ok::<_, StoreError>(inserted == 1)
        })
        .await
    }

    async fn set_tournament_winner(&self, id: Uuid, winner_id: Uuid) -> Result<bool, StoreError> {
        self.bounded("set_tournament_winner", async {
            let updated = sqlx::query(
                "UPDATE tournaments SET winner_id = $2 WHERE id = $1 AND winner_id IS NULL",
            )
            .bind(id)
            .bind(winner_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

            Ok::<_, StoreError>(updated == 1)
        })
        .await
    }

    async fn start_due_tournaments(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.bounded("start_due_tournaments", async {
            let result = sqlx::query(
                "UPDATE tournaments SET started = TRUE WHERE started = FALSE AND start_date <= $1",
            )
            .bind(now)
            .execute(&self.pool)
            .await?;

            Ok::<_, StoreError>(result.rows_affected())
        })
        .await
    }
}

// =============================================================================
// LADDER
// =============================================================================

#[async_trait]
impl LadderStore for PgStore {
    async fn insert_ladder(&self, session: &LadderSession) -> Result<(), StoreError> {
        self.bounded("insert_ladder", async {
            sqlx::query(
                r#"
                INSERT INTO ladder_sessions (id, active, member_ids, match_ids, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(session.id)
            .bind(session.active)
            .bind(&session.member_ids)
            .bind(&session.match_ids)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn get_ladder(&self, id: Uuid) -> Result<Option<LadderSession>, StoreError> {
        self.bounded("get_ladder", async {
            let row: Option<LadderRow> = sqlx::query_as(
                "SELECT id, active, member_ids, match_ids, created_at FROM ladder_sessions WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row.map(LadderSession::from))
        })
        .await
    }

    async fn append_ladder_match(&self, id: Uuid, match_id: &str) -> Result<Option<LadderSession>, StoreError> {
        self.bounded("append_ladder_match", async {
            let row: Option<LadderRow> = sqlx::query_as(
                r#"
                WITH appended AS (
                    UPDATE ladder_sessions
                    SET match_ids = array_append(match_ids, $2)
                    WHERE id = $1 AND active = TRUE AND NOT ($2 = ANY(match_ids))
                    RETURNING id
                )
                SELECT id, active, member_ids, match_ids, created_at
                FROM ladder_sessions
                WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM appended)
                UNION ALL
                SELECT l.id, l.active, l.member_ids, array_append(l.match_ids, $2), l.created_at
                FROM ladder_sessions l JOIN appended a ON a.id = l.id
                "#,
            )
            .bind(id)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row.map(LadderSession::from))
        })
        .await
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait]
impl AccountDirectory for PgStore {
    async fn get_rating(&self, id: Uuid) -> Result<Option<i32>, StoreError> {
        self.bounded("get_rating", async {
            let rating: Option<i32> = sqlx::query_scalar("SELECT rating FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, StoreError>(rating)
        })
        .await
    }

    async fn add_rating(&self, id: Uuid, delta: i32) -> Result<i32, StoreError> {
        self.bounded("add_rating", async {
            let rating: Option<i32> =
                sqlx::query_scalar("UPDATE accounts SET rating = rating + $2 WHERE id = $1 RETURNING rating")
                    .bind(id)
                    .bind(delta)
                    .fetch_optional(&self.pool)
                    .await?;

            rating.ok_or_else(|| StoreError::Corrupt(format!("account {} does not exist", id)))
        })
        .await
    }

    async fn resolve_discord_ids(&self, discord_ids: &[String]) -> Result<Vec<Uuid>, StoreError> {
        self.bounded("resolve_discord_ids", async {
            let rows: Vec<(Uuid, String)> =
                sqlx::query_as("SELECT id, discord_id FROM accounts WHERE discord_id = ANY($1)")
                    .bind(discord_ids)
                    .fetch_all(&self.pool)
                    .await?;

            Ok::<_, StoreError>(discord_ids
                .iter()
                .filter_map(|d| rows.iter().find(|(_, discord)| discord == d).map(|(id, _)| *id))
                .collect())
        })
        .await
    }
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}
