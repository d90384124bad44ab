//! Environment-sourced configuration.

use crate::error::ConfigError;
use std::{net::SocketAddr, path::PathBuf};

/// Longest accepted retention window, about a century.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Runtime settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub smtp_host: String,
  pub smtp_port: u16,
  pub sender: String,
  pub log_dir: PathBuf,
  pub db_file: PathBuf,
  pub retention_days: u32,
  pub attachment_dir: PathBuf,
  pub http_addr: SocketAddr,
}

impl Config {
  /// Read configuration from the process environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build configuration from an arbitrary key lookup. Empty values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let smtp_port = match get("MAILSINK_SMTP_PORT") {
      Some(v) => parse("MAILSINK_SMTP_PORT", &v)?,
      None => 25,
    };
    let retention_days = match get("MAILSINK_RETENTION_DAYS") {
      Some(v) => {
        let days: u32 = parse("MAILSINK_RETENTION_DAYS", &v)?;
        if days > MAX_RETENTION_DAYS {
          return Err(ConfigError::Invalid {
            key: "MAILSINK_RETENTION_DAYS",
            value: v,
            reason: format!("must be at most {MAX_RETENTION_DAYS}"),
          });
        }
        days
      }
      None => 7,
    };
    let http_addr = match get("MAILSINK_HTTP_ADDR") {
      Some(v) => parse("MAILSINK_HTTP_ADDR", &v)?,
      None => SocketAddr::from(([127, 0, 0, 1], 5000)),
    };

    Ok(Config {
      smtp_host: get("MAILSINK_SMTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
      smtp_port,
      sender: get("MAILSINK_SENDER").unwrap_or_else(|| "noreply@example.com".to_string()),
      log_dir: get("MAILSINK_LOG_DIR").unwrap_or_else(|| "logs".to_string()).into(),
      db_file: get("MAILSINK_DB_FILE").unwrap_or_else(|| "emails.db".to_string()).into(),
      retention_days,
      attachment_dir: get("MAILSINK_ATTACHMENT_DIR")
        .unwrap_or_else(|| "attachments".to_string())
        .into(),
      http_addr,
    })
  }

  /// `host:port` string the SMTP listener binds to.
  pub fn smtp_addr(&self) -> String {
    format!("{}:{}", self.smtp_host, self.smtp_port)
  }

  /// Domain part of the sender identity, announced in the SMTP greeting.
  pub fn greeting_domain(&self) -> &str {
    match self.sender.rsplit_once('@') {
      Some((_, domain)) if !domain.is_empty() => domain,
      _ => "localhost",
    }
  }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
    key,
    value: value.to_string(),
    reason: e.to_string(),
  })
}
