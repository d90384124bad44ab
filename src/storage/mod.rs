//! Attachment files on local disk.
//!
//! Every attachment is written once under `<token>_<filename>` where the
//! token is a fresh v4 UUID, so concurrently arriving messages never share
//! a path even when they carry identically named files.

use crate::error::AttachmentError;
use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
  sync::Arc,
};
use tokio::{
  fs,
  io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{debug, warn};
use uuid::Uuid;

const FALLBACK_NAME: &str = "attachment";
const MAX_NAME_BYTES: usize = 160;

#[derive(Debug, Clone)]
pub struct AttachmentStore {
  root: Arc<PathBuf>,
}

impl AttachmentStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    AttachmentStore {
      root: Arc::new(root.into()),
    }
  }

  /// Create the attachment directory if it does not exist yet.
  pub async fn ensure_dir(&self) -> std::io::Result<()> {
    fs::create_dir_all(self.root.as_path()).await
  }

  /// Persist `data` and return the stored name it was written under.
  pub async fn save(&self, filename: &str, data: &[u8]) -> Result<String, AttachmentError> {
    let stored_name = format!("{}_{}", Uuid::new_v4().simple(), safe_filename(filename));
    let path = self.root.join(&stored_name);
    let write_err = |source| AttachmentError::Write {
      path: path.clone(),
      source,
    };

    fs::create_dir_all(self.root.as_path())
      .await
      .map_err(write_err)?;
    let file = fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .await
      .map_err(write_err)?;
    fill_or_discard(&path, file, data).await?;

    debug!(stored_name = %stored_name, size = data.len(), "attachment saved");
    Ok(stored_name)
  }

  /// Remove a stored file. Already-absent files are not an error.
  pub async fn delete(&self, stored_name: &str) -> Result<(), AttachmentError> {
    let path = self.path(stored_name)?;
    match fs::remove_file(&path).await {
      Ok(()) => {
        debug!(stored_name = %stored_name, "attachment deleted");
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(source) => Err(AttachmentError::Delete { path, source }),
    }
  }

  /// Filesystem path of a stored file, for streaming downloads.
  pub fn path(&self, stored_name: &str) -> Result<PathBuf, AttachmentError> {
    if !is_valid_stored_name(stored_name) {
      return Err(AttachmentError::InvalidName(stored_name.to_string()));
    }
    Ok(self.root.join(stored_name))
  }

  pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, AttachmentError> {
    let path = self.path(stored_name)?;
    match fs::read(&path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == ErrorKind::NotFound => {
        Err(AttachmentError::NotFound(stored_name.to_string()))
      }
      Err(source) => Err(AttachmentError::Read { path, source }),
    }
  }
}

/// Write `data` to the freshly created file at `path`, removing it again if
/// the write does not complete.
async fn fill_or_discard<W>(path: &Path, mut file: W, data: &[u8]) -> Result<(), AttachmentError>
where
  W: AsyncWrite + Unpin,
{
  let written = match file.write_all(data).await {
    Ok(()) => file.flush().await,
    Err(e) => Err(e),
  };
  let Err(source) = written else {
    return Ok(());
  };
  drop(file);
  if let Err(e) = fs::remove_file(path).await {
    warn!(path = %path.display(), "failed to remove partial attachment: {e}");
  }
  Err(AttachmentError::Write {
    path: path.to_path_buf(),
    source,
  })
}

/// Make an attacker-controlled filename safe to use as one path component.
fn safe_filename(name: &str) -> String {
  let replaced: String = name
    .chars()
    .map(|c| match c {
      '/' | '\\' | ':' => '_',
      c if c.is_control() => '_',
      c => c,
    })
    .collect();
  let trimmed = replaced.trim().trim_start_matches('.');

  let mut out = String::new();
  for c in trimmed.chars() {
    if out.len() + c.len_utf8() > MAX_NAME_BYTES {
      break;
    }
    out.push(c);
  }
  if out.is_empty() {
    FALLBACK_NAME.to_string()
  } else {
    out
  }
}

fn is_valid_stored_name(name: &str) -> bool {
  !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\', '\0'])
}
