//! Typed records used across layers.

pub mod attachment;
pub mod email;
