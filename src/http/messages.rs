//! Message JSON APIs, served from the in-memory cache.

use crate::{app::AppState, models::email::email_record::EmailRecord};
use axum::{
  Json,
  extract::{Path as AxumPath, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use tracing::{error, warn};

pub async fn list_messages(State(state): State<AppState>) -> Json<Vec<EmailRecord>> {
  Json(state.cache.snapshot().as_ref().clone())
}

pub async fn get_message(
  State(state): State<AppState>,
  AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
  match state.cache.find(&id) {
    Some(record) => Json(record).into_response(),
    None => (StatusCode::NOT_FOUND, "message not found").into_response(),
  }
}

/// Raw HTML body of a message, for preview.
pub async fn get_message_html(
  State(state): State<AppState>,
  AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
  match state.cache.find(&id) {
    Some(record) if !record.html_body.is_empty() => (
      [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
      record.html_body,
    )
      .into_response(),
    Some(_) => (StatusCode::NOT_FOUND, "message has no html body").into_response(),
    None => (StatusCode::NOT_FOUND, "message not found").into_response(),
  }
}

/// Delete one message with its attachments. Unknown ids are a no-op.
pub async fn delete_message(
  State(state): State<AppState>,
  AxumPath(id): AxumPath<String>,
) -> StatusCode {
  if let Err(e) = state.store.delete_by_id(&id).await {
    error!(id = %id, "delete_message error: {e}");
    return StatusCode::INTERNAL_SERVER_ERROR;
  }
  reload(&state).await
}

pub async fn clear_messages(State(state): State<AppState>) -> StatusCode {
  if let Err(e) = state.store.delete_all().await {
    error!("clear_messages error: {e}");
    return StatusCode::INTERNAL_SERVER_ERROR;
  }
  reload(&state).await
}

/// Re-read the store into the cache.
pub async fn refresh(State(state): State<AppState>) -> StatusCode {
  reload(&state).await
}

async fn reload(state: &AppState) -> StatusCode {
  match state.cache.reload(&state.store).await {
    Ok(_) => StatusCode::NO_CONTENT,
    Err(e) => {
      warn!("cache reload failed: {e}");
      StatusCode::INTERNAL_SERVER_ERROR
    }
  }
}
