//! Durable table of captured messages.

use crate::{
    error::{AttachmentError, PersistenceError},
    models::{
        attachment::attachment_ref::AttachmentRef,
        email::{db_email::DbEmail, email_record::EmailRecord},
    },
    storage::AttachmentStore,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

const SELECT_EMAILS: &str = "SELECT id, received_at, subject, sender, recipients, client_ip, client_app, plain_body, html_body, attachments FROM emails";

/// SQLite-backed record store. Row deletions cascade to attachment files.
#[derive(Debug, Clone)]
pub struct EmailRecordStore {
    pool: SqlitePool,
    attachments: AttachmentStore,
}

impl EmailRecordStore {
    pub fn new(pool: SqlitePool, attachments: AttachmentStore) -> Self {
        EmailRecordStore { pool, attachments }
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    pub async fn insert(&self, record: &EmailRecord) -> Result<(), PersistenceError> {
        let recipients = serde_json::to_string(&record.recipients)?;
        let attachments = serde_json::to_string(&record.attachments)?;
        sqlx::query(
            "INSERT INTO emails (id, received_at, subject, sender, recipients, client_ip, client_app, plain_body, html_body, attachments) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.received_at)
        .bind(&record.subject)
        .bind(&record.sender)
        .bind(recipients)
        .bind(&record.client_ip)
        .bind(&record.client_app)
        .bind(&record.plain_body)
        .bind(&record.html_body)
        .bind(attachments)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All records, newest first. Same-second ties list the later insert first.
    pub async fn list_all(&self) -> Result<Vec<EmailRecord>, PersistenceError> {
        let sql = format!("{SELECT_EMAILS} ORDER BY received_at DESC, rowid DESC");
        let rows = sqlx::query_as::<_, DbEmail>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(EmailRecord::from).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<EmailRecord>, PersistenceError> {
        let sql = format!("{SELECT_EMAILS} WHERE id = ?");
        let row = sqlx::query_as::<_, DbEmail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(EmailRecord::from))
    }

    /// Delete one record and its files. Unknown ids delete nothing.
    pub async fn delete_by_id(&self, id: &str) -> Result<u64, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let removed: Vec<(String,)> =
            sqlx::query_as("DELETE FROM emails WHERE id = ? RETURNING attachments")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        self.finish_delete(tx, removed).await
    }

    /// Delete every record and every file they reference.
    pub async fn delete_all(&self) -> Result<u64, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let removed: Vec<(String,)> = sqlx::query_as("DELETE FROM emails RETURNING attachments")
            .fetch_all(&mut *tx)
            .await?;
        let count = self.finish_delete(tx, removed).await?;
        info!(count, "cleared all messages");
        Ok(count)
    }

    /// Delete records with `received_at < threshold` (plain string order).
    pub async fn delete_older_than(&self, threshold: &str) -> Result<u64, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let removed: Vec<(String,)> =
            sqlx::query_as("DELETE FROM emails WHERE received_at < ? RETURNING attachments")
                .bind(threshold)
                .fetch_all(&mut *tx)
                .await?;
        let count = self.finish_delete(tx, removed).await?;
        if count > 0 {
            info!(count, threshold, "deleted expired messages");
        }
        Ok(count)
    }

    /// Remove the deleted rows' files, then commit. A file error rolls the rows back.
    async fn finish_delete(
        &self,
        tx: Transaction<'static, Sqlite>,
        removed: Vec<(String,)>,
    ) -> Result<u64, PersistenceError> {
        for (column,) in &removed {
            self.remove_files(column).await?;
        }
        tx.commit().await?;
        Ok(removed.len() as u64)
    }

    async fn remove_files(&self, attachments_column: &str) -> Result<(), AttachmentError> {
        let refs: Vec<AttachmentRef> = match serde_json::from_str(attachments_column) {
            Ok(refs) => refs,
            Err(e) => {
                warn!("unreadable attachments column, skipping file cleanup: {e}");
                return Ok(());
            }
        };
        for att in refs {
            self.attachments.delete(&att.stored_name).await?;
        }
        Ok(())
    }
}
