//! Attachment download.

use crate::{app::AppState, error::AttachmentError};
use axum::{
  extract::{Path as AxumPath, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::IntoResponse,
};
use tracing::error;

pub async fn download_attachment(
  State(state): State<AppState>,
  AxumPath(stored_name): AxumPath<String>,
) -> impl IntoResponse {
  let bytes = match state.store.attachments().read(&stored_name).await {
    Ok(bytes) => bytes,
    Err(AttachmentError::NotFound(_) | AttachmentError::InvalidName(_)) => {
      return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    Err(e) => {
      error!("download_attachment error: {e}");
      return (StatusCode::INTERNAL_SERVER_ERROR, "read error").into_response();
    }
  };

  let display_name = state
    .cache
    .find_attachment(&stored_name)
    .map(|a| a.filename)
    .unwrap_or_else(|| stored_name.clone());

  let mut headers = HeaderMap::new();
  let mime = mime_guess::from_path(&display_name).first_or_octet_stream();
  headers.insert(
    header::CONTENT_TYPE,
    HeaderValue::from_str(mime.essence_str())
      .unwrap_or(HeaderValue::from_static("application/octet-stream")),
  );
  headers.insert(
    header::CONTENT_DISPOSITION,
    HeaderValue::from_str(&content_disposition(&display_name))
      .unwrap_or(HeaderValue::from_static("attachment")),
  );
  (headers, bytes).into_response()
}

/// `attachment` disposition with an ASCII fallback name plus the RFC 5987 form.
fn content_disposition(filename: &str) -> String {
  let ascii: String = filename
    .chars()
    .map(|c| match c {
      ' '..='~' if c != '"' && c != '\\' => c,
      _ => '_',
    })
    .collect();
  let mut encoded = String::new();
  for b in filename.bytes() {
    if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
      encoded.push(b as char);
    } else {
      encoded.push_str(&format!("%{b:02X}"));
    }
  }
  format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
