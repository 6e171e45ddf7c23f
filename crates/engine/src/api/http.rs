//! HTTP routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use sigilforge_domain::{CharacterId, DerivedSnapshot, RawCharacterState, SchemaError, UserId};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::App;
use crate::infrastructure::correlation::{CorrelationId, RequestContext};
use crate::use_cases::RecomputeError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/characters/{id}/snapshot", get(get_snapshot))
        .route("/api/characters/{id}/state", put(put_state))
        .route("/api/characters/{id}/recompute", post(recompute))
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Characters
// =============================================================================

/// Latest persisted snapshot; derived on demand if the character has never
/// been computed.
async fn get_snapshot(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DerivedSnapshot>, ApiError> {
    let ctx = request_context(&headers)?;
    let id = CharacterId::from_uuid(id);
    let coordinator = &app.use_cases.recompute;

    match coordinator.latest_snapshot(id).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => {
            let snapshot = coordinator.recompute(&ctx, id).await?;
            Ok(Json(snapshot.as_ref().clone()))
        }
    }
}

async fn put_state(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(state): Json<RawCharacterState>,
) -> Result<Json<DerivedSnapshot>, ApiError> {
    let ctx = request_context(&headers)?;
    let snapshot = app
        .use_cases
        .recompute
        .update_state(&ctx, CharacterId::from_uuid(id), state)
        .await?;
    Ok(Json(snapshot.as_ref().clone()))
}

async fn recompute(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DerivedSnapshot>, ApiError> {
    let ctx = request_context(&headers)?;
    let snapshot = app
        .use_cases
        .recompute
        .recompute(&ctx, CharacterId::from_uuid(id))
        .await?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// Build the request context from headers. A missing correlation id gets a
/// fresh one; a malformed one is rejected.
fn request_context(headers: &HeaderMap) -> Result<RequestContext, ApiError> {
    let correlation_id = match header_str(headers, CORRELATION_ID_HEADER)? {
        Some(raw) => raw
            .parse::<CorrelationId>()
            .map_err(|_| ApiError::BadRequest("Invalid correlation id".to_string()))?,
        None => CorrelationId::new(),
    };
    let user_id = header_str(headers, USER_ID_HEADER)?
        .map(|raw| {
            raw.parse::<UserId>()
                .map_err(|_| ApiError::BadRequest("Invalid user id".to_string()))
        })
        .transpose()?;
    Ok(RequestContext::new(correlation_id, user_id))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::BadRequest(format!("Header {name} is not valid text")))
        })
        .transpose()
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Unprocessable(SchemaError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unprocessable(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err)).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<RecomputeError> for ApiError {
    fn from(e: RecomputeError) -> Self {
        match e {
            RecomputeError::NotFound(_) => ApiError::NotFound,
            RecomputeError::Schema(err) => ApiError::Unprocessable(err),
            other @ (RecomputeError::Composition(_)
            | RecomputeError::Storage(_)
            | RecomputeError::Aborted(_)) => ApiError::Internal(other.to_string()),
        }
    }
}
