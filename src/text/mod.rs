//! Plain-body text transforms applied at ingestion.

pub mod linkify;
pub mod sanitize;

pub use linkify::linkify;
pub use sanitize::sanitize;
