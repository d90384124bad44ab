//! Process-wide mirror of the record store.
//!
//! Never patched in place: every mutation of the store is followed by a
//! full reload that swaps in a fresh snapshot, so readers always see one
//! complete listing.

use crate::{
  db::EmailRecordStore,
  error::PersistenceError,
  models::{attachment::attachment_ref::AttachmentRef, email::email_record::EmailRecord},
};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryCache {
  snapshot: RwLock<Arc<Vec<EmailRecord>>>,
  reload_lock: Mutex<()>,
}

impl InMemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current listing, newest first.
  pub fn snapshot(&self) -> Arc<Vec<EmailRecord>> {
    let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
    Arc::clone(&guard)
  }

  pub fn find(&self, id: &str) -> Option<EmailRecord> {
    self.snapshot().iter().find(|r| r.id == id).cloned()
  }

  /// Attachment referenced by any cached record under `stored_name`.
  pub fn find_attachment(&self, stored_name: &str) -> Option<AttachmentRef> {
    self
      .snapshot()
      .iter()
      .flat_map(|r| r.attachments.iter())
      .find(|a| a.stored_name == stored_name)
      .cloned()
  }

  /// Replace the snapshot with a fresh `list_all()` from the store.
  ///
  /// Reloads are serialized, so a listing taken earlier never replaces one
  /// taken later.
  pub async fn reload(&self, store: &EmailRecordStore) -> Result<usize, PersistenceError> {
    let _reloading = self.reload_lock.lock().await;
    let fresh = Arc::new(store.list_all().await?);
    let count = fresh.len();
    *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    debug!(count, "cache reloaded");
    Ok(count)
  }
}
