//! Captured email, as listed by the read API.

use super::db_email::DbEmail;
use crate::models::attachment::attachment_ref::AttachmentRef;
use serde::{Deserialize, Serialize};

/// One accepted SMTP transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
  pub id: String,
  /// `YYYY-MM-DD HH:MM:SS`, UTC.
  pub received_at: String,
  pub subject: String,
  pub sender: String,
  pub recipients: Vec<String>,
  pub client_ip: String,
  pub client_app: String,
  /// Sanitized, linkified markup.
  pub plain_body: String,
  pub html_body: String,
  pub attachments: Vec<AttachmentRef>,
}

impl From<DbEmail> for EmailRecord {
  fn from(d: DbEmail) -> Self {
    let recipients: Vec<String> = serde_json::from_str(&d.recipients).unwrap_or_default();
    let attachments: Vec<AttachmentRef> = serde_json::from_str(&d.attachments).unwrap_or_default();
    EmailRecord {
      id: d.id,
      received_at: d.received_at,
      subject: d.subject,
      sender: d.sender,
      recipients,
      client_ip: d.client_ip,
      client_app: d.client_app,
      plain_body: d.plain_body,
      html_body: d.html_body,
      attachments,
    }
  }
}
