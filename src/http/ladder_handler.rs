use actix_web::{web, HttpResponse};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::http::envelope;
use crate::http::AppState;
use crate::models::{AppendLadderMatchRequest, CreateLadderRequest};
use crate::service::LadderError;

/// POST /api/ladder/create
pub async fn create_session(
    state: web::Data<AppState>,
    req: web::Json<CreateLadderRequest>,
) -> Result<HttpResponse, ApiError> {
    info!(requested = req.discord_ids.len(), "Received ladder session request");

    match state.ladder.create_session(&req.discord_ids).await {
        Ok(session) => Ok(envelope::success("ladder session created", session)),
        Err(e) => envelope::reject(e),
    }
}

/// POST /api/ladder/{id}/matches
pub async fn append_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<AppendLadderMatchRequest>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    req.validate()?;

    match state.ladder.append_match(session_id, &req.combat_id).await {
        Ok(session) => Ok(envelope::success("ladder match recorded", session)),
        Err(e) => envelope::reject(e),
    }
}

/// GET /api/ladder/{id}
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();

    match state.ladder.get_session(session_id).await {
        Ok(session) => Ok(envelope::success("ladder session found", session)),
        Err(LadderError::NotFound(id)) => Err(ApiError::not_found(format!("ladder session {}", id))),
        Err(e) => envelope::reject(e),
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ladder")
            .route("/create", web::post().to(create_session))
            .route("/{id}/matches", web::post().to(append_match))
            .route("/{id}", web::get().to(get_session)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults_to_empty() {
        let req: CreateLadderRequest = serde_json::from_str("{}").unwrap();
        assert!(req.discord_ids.is_empty());

        let req: CreateLadderRequest =
            serde_json::from_str(r#"{"discord_ids":["alice#1","bob#2"]}"#).unwrap();
        assert_eq!(req.discord_ids.len(), 2);
    }

    #[test]
    fn test_append_request_validation() {
        let req = AppendLadderMatchRequest {
            combat_id: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
