use actix_web::{web, HttpResponse};
use tracing::info;
use validator::Validate;

use crate::api_error::ApiError;
use crate::http::envelope;
use crate::http::AppState;
use crate::models::*;
use crate::service::{MatchError, WinnerReport};

// =============================================================================
// PLAYER SUBMISSION
// =============================================================================

/// POST /api/save-game-params
pub async fn save_game_params(
    state: web::Data<AppState>,
    req: web::Json<SaveGameParamsRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    req.validate()?;
    let context = req.tournament_context().map_err(ApiError::bad_request)?;
    if context.is_some() && req.user_id.is_none() {
        return Err(ApiError::bad_request("userId is required for tournament matches"));
    }

    info!(
        combat_id = %req.combat_id,
        color = %req.color,
        "Received player submission"
    );

    match state
        .recorder
        .submit_player_data(&req.combat_id, &req.map_version, req.player(), context)
        .await
    {
        Ok((game, outcome)) => Ok(envelope::success(outcome.message(), game)),
        Err(e) => envelope::reject(e),
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// POST /api/save-game-winner
pub async fn save_game_winner(
    state: web::Data<AppState>,
    req: web::Json<SaveGameWinnerRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    req.validate()?;

    info!(
        combat_id = %req.combat_id,
        winner = %req.winner,
        was_disconnect = req.was_disconnect,
        "Received match result"
    );

    let combat_id = req.combat_id.clone();
    match state
        .recorder
        .record_winner(&combat_id, WinnerReport::from(req))
        .await
    {
        Ok((game, outcome)) => Ok(envelope::success(outcome.message(), game)),
        Err(e) => envelope::reject(e),
    }
}

/// POST /api/set-game-disconnect-status
pub async fn set_game_disconnect_status(
    state: web::Data<AppState>,
    req: web::Json<SetDisconnectStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    req.validate()?;

    match state
        .recorder
        .confirm_disconnect_status(&req.combat_id, req.is_disconnect)
        .await
    {
        Ok(game) => Ok(envelope::success("disconnect status recorded", game)),
        Err(e) => envelope::reject(e),
    }
}

/// GET /api/matches/{combat_id}
pub async fn get_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let combat_id = path.into_inner();

    match state.recorder.get_match(&combat_id).await {
        Ok(game) => Ok(envelope::success("match found", game)),
        Err(MatchError::NotFound(id)) => Err(ApiError::not_found(format!("match {}", id))),
        Err(e) => envelope::reject(e),
    }
}

// =============================================================================
// ROUTE CONFIGURATION
// =============================================================================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/save-game-params", web::post().to(save_game_params))
        .route("/save-game-winner", web::post().to(save_game_winner))
        .route(
            "/set-game-disconnect-status",
            web::post().to(set_game_disconnect_status),
        )
        .route("/matches/{combat_id}", web::get().to(get_match));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Stores};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn state() -> web::Data<AppState> {
        let stores = Stores::memory(Arc::new(MemoryStore::new()));
        web::Data::new(AppState::new(&stores, crate::config::NameMatchPolicy::Normalized))
    }

    #[actix_web::test]
    async fn test_match_flow_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        for color in ["RED", "BLUE"] {
            let req = test::TestRequest::post()
                .uri("/api/save-game-params")
                .set_json(serde_json::json!({
                    "combat_id": "c-1",
                    "map_version": "1.4",
                    "color": color,
                }))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["STATUS"], "SUCCESS");
        }

        let req = test::TestRequest::post()
            .uri("/api/save-game-winner")
            .set_json(serde_json::json!({ "combat_id": "c-1", "winner": "BLUE" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["STATUS"], "SUCCESS");
        assert_eq!(body["MESSAGE"], "final match data recorded");
        assert_eq!(body["DATA"]["winnerColor"], "BLUE");

        let req = test::TestRequest::post()
            .uri("/api/save-game-winner")
            .set_json(serde_json::json!({ "combat_id": "c-1", "winner": "RED" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["MESSAGE"], "final match data already recorded");
        assert_eq!(body["DATA"]["winnerColor"], "BLUE");
    }

    #[actix_web::test]
    async fn test_business_failure_uses_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/set-game-disconnect-status")
            .set_json(serde_json::json!({ "combat_id": "c-404", "IsDisconnect": true }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["STATUS"], "FAILURE");

        let req = test::TestRequest::get().uri("/api/matches/c-404").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_malformed_request_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/save-game-winner")
            .set_json(serde_json::json!({ "combat_id": "c-1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
