//! API-level errors and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rewind_engine::EngineError;
use rewind_storage::StoreError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested riot id or puuid does not resolve to a player.
    #[error("Summoner not found")]
    SummonerNotFound,

    /// An upstream service answered with a non-success status.
    #[error("{service} request failed with status {status}")]
    UpstreamStatus { service: &'static str, status: u16 },

    /// The request never produced a response.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The language model answered but its payload was unusable beyond
    /// repair (no text at all).
    #[error("narrative generation failed: {0}")]
    Narrative(String),

    /// Error from the data-access layer.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Error from the document store.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// The failure half of the response envelope.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::SummonerNotFound => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::OperationNotAllowed { .. }) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &self {
            Self::SummonerNotFound => Some("SUMMONER_NOT_FOUND"),
            _ => None,
        };
        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
