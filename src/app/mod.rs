//! Application setup and runtime.

use crate::{
  cache::InMemoryCache,
  db::{self, EmailRecordStore},
  error::{PersistenceError, StartupError},
  http, reaper, smtp,
  storage::AttachmentStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod config;

pub use config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub store: EmailRecordStore,
  pub cache: Arc<InMemoryCache>,
}

impl AppState {
  /// Open the database and attachment directory and prime the cache.
  pub async fn open(config: Config) -> Result<Self, StartupError> {
    let pool = db::connect(&config.db_file)
      .await
      .map_err(PersistenceError::from)?;
    db::run_migrations(&pool)
      .await
      .map_err(PersistenceError::from)?;

    let attachments = AttachmentStore::new(config.attachment_dir.clone());
    attachments.ensure_dir().await?;

    let state = AppState {
      config: Arc::new(config),
      store: EmailRecordStore::new(pool, attachments),
      cache: Arc::new(InMemoryCache::new()),
    };
    let loaded = state.cache.reload(&state.store).await?;
    info!(loaded, "loaded stored messages");
    Ok(state)
  }
}

/// Start SMTP, HTTP and the retention sweep with configured environment.
pub async fn run() -> Result<(), StartupError> {
  let config = Config::from_env()?;
  crate::util::init_tracing(&config.log_dir)?;

  info!(
    smtp = %config.smtp_addr(),
    sender = %config.sender,
    "initializing mailsink"
  );
  info!(
    db_file = %config.db_file.display(),
    retention_days = config.retention_days,
    "persistence settings"
  );

  let state = AppState::open(config).await?;

  let smtp_listener = TcpListener::bind(state.config.smtp_addr()).await?;
  info!("smtp listener: {}", state.config.smtp_addr());
  let smtp_state = state.clone();
  tokio::spawn(async move {
    if let Err(e) = smtp::serve(smtp_state, smtp_listener).await {
      error!("smtp listener error: {e}");
    }
  });

  reaper::spawn(state.clone());

  let addr = state.config.http_addr;
  let app = http::build_router(state);
  let listener = TcpListener::bind(addr).await?;
  info!("mailsink dashboard:   http://{}/", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!("interrupt received, shutting down");
    })
    .await?;
  Ok(())
}
