//! Utility functions: tracing, HTML escape, timestamps.

use chrono::{DateTime, Duration, Utc};
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Lexically sortable timestamp layout shared by records and retention sweeps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Initialize console logging plus an append-only log file under `log_dir`.
pub fn init_tracing(log_dir: &Path) -> std::io::Result<()> {
  std::fs::create_dir_all(log_dir)?;
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(log_dir.join("mailsink.log"))?;

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(false).pretty())
    .with(
      fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file)),
    )
    .init();
  Ok(())
}

/// Minimal HTML escaping for text display.
pub fn html_escape(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
  t.format(TIMESTAMP_FORMAT).to_string()
}

/// Current time in record format.
pub fn timestamp_now() -> String {
  format_timestamp(Utc::now())
}

/// Records received strictly before the returned timestamp are expired.
/// `None` when the window reaches past the representable date range.
pub fn retention_threshold(now: DateTime<Utc>, retention_days: u32) -> Option<String> {
  let window = Duration::try_days(i64::from(retention_days))?;
  now.checked_sub_signed(window).map(format_timestamp)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2024, 9, 30, 23, 59, 59).unwrap();
    let b = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    assert_eq!(format_timestamp(a), "2024-09-30 23:59:59");
    assert!(format_timestamp(a) < format_timestamp(b));
  }

  #[test]
  fn threshold_subtracts_days() {
    let now = Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap();
    assert_eq!(retention_threshold(now, 7).as_deref(), Some("2024-03-01 12:00:00"));
    assert_eq!(retention_threshold(now, 0).as_deref(), Some("2024-03-08 12:00:00"));
  }

  #[test]
  fn threshold_out_of_date_range_is_none() {
    let now = Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap();
    assert_eq!(retention_threshold(now, u32::MAX), None);
    assert!(retention_threshold(now, 36_500).is_some());
  }

  #[test]
  fn escape_covers_markup_characters() {
    assert_eq!(html_escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
  }
}
