//! Attachment reference kept on an email record.

use serde::{Deserialize, Serialize};

/// Original filename plus the collision-safe name of the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
  pub filename: String,
  pub stored_name: String,
}
