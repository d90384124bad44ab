//! Database row for an email.

use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct DbEmail {
    pub id: String,
    pub received_at: String,
    pub subject: String,
    pub sender: String,
    pub recipients: String,
    pub client_ip: String,
    pub client_app: String,
    pub plain_body: String,
    pub html_body: String,
    pub attachments: String,
}
