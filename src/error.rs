//! Error types shared across the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {key}: {reason}")]
  Invalid {
    key: &'static str,
    value: String,
    reason: String,
  },
}

/// Failure of a durable store operation.
#[derive(Error, Debug)]
pub enum PersistenceError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("failed to encode column: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("attachment cleanup failed: {0}")]
  Attachment(#[from] AttachmentError),
}

/// Failure touching the attachment directory.
#[derive(Error, Debug)]
pub enum AttachmentError {
  #[error("failed to write attachment '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to delete attachment '{path}': {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read attachment '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("attachment not found: {0}")]
  NotFound(String),

  #[error("invalid stored name: {0}")]
  InvalidName(String),
}

/// Failure while decoding a raw message or one of its parts.
///
/// Never escapes the normalizer: the message is still captured with
/// whatever could be extracted.
#[derive(Error, Debug)]
pub enum ExtractError {
  #[error("malformed message: {0}")]
  Parse(#[from] mailparse::MailParseError),

  #[error("failed to decode part {index}: {source}")]
  Part {
    index: usize,
    #[source]
    source: mailparse::MailParseError,
  },
}

/// Fatal failure while booting the service.
#[derive(Error, Debug)]
pub enum StartupError {
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("persistence error: {0}")]
  Persistence(#[from] PersistenceError),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}
