//! mailsink library entrypoint.
//!
//! Modules:
//! - `app`: startup, configuration, shared state
//! - `smtp`: capture-only SMTP listener
//! - `ingest`: transaction to record pipeline
//! - `mime`: MIME tree walking and part selection
//! - `text`: plain-body cleanup and linkification
//! - `storage`: attachment files on disk
//! - `db`: SQLite record store
//! - `cache`: in-memory snapshot of the store
//! - `reaper`: periodic retention sweep
//! - `http`: Axum read API and dashboard
//! - `models`: typed records used across layers
//! - `util`: tracing, escaping, timestamps

pub mod app;
pub mod cache;
pub mod db;
pub mod error;
pub mod http;
pub mod ingest;
pub mod mime;
pub mod models;
pub mod reaper;
pub mod smtp;
pub mod storage;
pub mod text;
pub mod util;
