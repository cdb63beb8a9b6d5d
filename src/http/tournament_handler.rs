use actix_web::{web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::http::envelope;
use crate::http::AppState;
use crate::models::{CreateTournamentRequest, RegisterRequest};
use crate::service::TournamentError;

/// POST /api/tournament/create
pub async fn create_tournament(
    state: web::Data<AppState>,
    req: web::Json<CreateTournamentRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    info!(
        name = %req.name,
        maximum_players = req.maximum_players,
        "Received create tournament request"
    );

    match state.tournaments.create_tournament(req).await {
        Ok(tournament) => Ok(envelope::success("tournament created", tournament)),
        Err(e) => envelope::reject(e),
    }
}

/// POST /api/tournament/register
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();

    match state.tournaments.register(req.tournament_id, req.user_id).await {
        Ok((tournament, outcome)) => Ok(envelope::success(outcome.message(), tournament)),
        Err(e) => envelope::reject(e),
    }
}

/// GET /api/tournament/{id}
pub async fn get_tournament(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let tournament_id = path.into_inner();

    match state.tournaments.get_tournament(tournament_id).await {
        Ok(tournament) => Ok(envelope::success("tournament found", tournament)),
        Err(TournamentError::NotFound(id)) => Err(ApiError::not_found(format!("tournament {}", id))),
        Err(e) => envelope::reject(e),
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tournament")
            .route("/create", web::post().to(create_tournament))
            .route("/register", web::post().to(register))
            .route("/{id}", web::get().to(get_tournament)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameMatchPolicy;
    use crate::store::{MemoryStore, Stores};
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_create_and_register() {
        let stores = Stores::memory(Arc::new(MemoryStore::new()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(&stores, NameMatchPolicy::Normalized)))
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let create = serde_json::json!({
            "name": "Winter Cup",
            "startDate": "2030-01-01T18:00:00Z",
            "maximumPlayers": 4,
            "roundFormat": "bo1",
            "finalFormat": "bo3",
        });
        let req = test::TestRequest::post()
            .uri("/api/tournament/create")
            .set_json(&create)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["STATUS"], "SUCCESS");
        let id = body["DATA"]["id"].as_str().unwrap().to_string();

        // same name again collides
        let req = test::TestRequest::post()
            .uri("/api/tournament/create")
            .set_json(&create)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["STATUS"], "FAILURE");

        let req = test::TestRequest::post()
            .uri("/api/tournament/register")
            .set_json(serde_json::json!({ "tournament_id": id, "userId": Uuid::new_v4() }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["MESSAGE"], "player registered");
        assert_eq!(body["DATA"]["registrants"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/tournament/{}", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::get()
            .uri(&format!("/api/tournament/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
