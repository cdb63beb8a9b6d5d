use actix_web::HttpResponse;
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, error, warn};

use crate::api_error::{ApiError, Classify, ErrorKind};

/// Body of every business response. Business failures travel with a 200
/// status and `STATUS: FAILURE`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(rename = "STATUS")]
    pub status: &'static str,
    #[serde(rename = "MESSAGE")]
    pub message: String,
    #[serde(rename = "DATA", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub const SUCCESS: &str = "SUCCESS";
pub const FAILURE: &str = "FAILURE";

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        status: SUCCESS,
        message: message.into(),
        data: Some(data),
    })
}

pub fn failure(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<()> {
        status: FAILURE,
        message: message.into(),
        data: None,
    })
}

/// Routes a domain error to the transport. Validation and conflict
/// failures become a FAILURE envelope; the rest leave the envelope.
pub fn reject<E: Classify + Display>(err: E) -> Result<HttpResponse, ApiError> {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Conflict => {
            debug!(error = %err, "Request rejected");
            Ok(failure(err.to_string()))
        }
        ErrorKind::Consistency => {
            error!(error = %err, "Consistency violation");
            Err(ApiError::internal_error(err.to_string()))
        }
        ErrorKind::Unavailable => {
            warn!(error = %err, "Store unavailable");
            Err(ApiError::StoreUnavailable(err.to_string()))
        }
    }
}
