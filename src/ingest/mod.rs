//! Turns one completed SMTP transaction into a stored email record.

use crate::{
  app::AppState,
  error::PersistenceError,
  mime::{self, NormalizedMessage},
  models::{attachment::attachment_ref::AttachmentRef, email::email_record::EmailRecord},
  text::{linkify, sanitize},
  util::timestamp_now,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// SMTP envelope of a completed transaction.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
  pub sender: String,
  pub recipients: Vec<String>,
  pub peer_ip: String,
}

/// Normalize, persist and publish one message.
///
/// Extraction problems never fail the transaction; the record is stored with
/// whatever could be recovered. Only a failed insert is reported back.
pub async fn ingest(
  state: &AppState,
  envelope: Envelope,
  raw: &[u8],
) -> Result<EmailRecord, PersistenceError> {
  let text = String::from_utf8_lossy(raw);
  let normalized = match mime::normalize(text.as_bytes()) {
    Ok(n) => n,
    Err(e) => {
      warn!(peer = %envelope.peer_ip, "{e}; storing envelope only");
      NormalizedMessage::default()
    }
  };

  let store = &state.store;
  let mut attachments = Vec::with_capacity(normalized.attachments.len());
  for blob in normalized.attachments {
    match store.attachments().save(&blob.filename, &blob.data).await {
      Ok(stored_name) => attachments.push(AttachmentRef {
        filename: blob.filename,
        stored_name,
      }),
      Err(e) => warn!(filename = %blob.filename, "dropping attachment: {e}"),
    }
  }

  let record = EmailRecord {
    id: Uuid::new_v4().to_string(),
    received_at: timestamp_now(),
    subject: normalized.subject,
    sender: envelope.sender,
    recipients: envelope.recipients,
    client_ip: envelope.peer_ip,
    client_app: normalized.client_app,
    plain_body: linkify(&sanitize(&normalized.plain_body)),
    html_body: normalized.html_body,
    attachments,
  };

  if let Err(e) = store.insert(&record).await {
    error!(id = %record.id, sender = %record.sender, "failed to store message: {e}");
    for att in &record.attachments {
      if let Err(e) = store.attachments().delete(&att.stored_name).await {
        warn!("failed to remove attachment of unstored message: {e}");
      }
    }
    return Err(e);
  }

  if let Err(e) = state.cache.reload(store).await {
    warn!("cache reload after insert failed: {e}");
  }

  info!(
    id = %record.id,
    sender = %record.sender,
    recipients = ?record.recipients,
    client_ip = %record.client_ip,
    client_app = %record.client_app,
    subject = %record.subject,
    attachments = record.attachments.len(),
    "message captured"
  );
  Ok(record)
}
