//! Admin recipient resolution interface.
//!
//! Merging a statically configured recipient list with the set of active
//! admin accounts belongs to the directory implementations, not to the
//! notification dispatcher that consumes them.

use async_trait::async_trait;

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors from admin directory lookups.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("admin directory unavailable: {0}")]
    Unavailable(String),
}

/// Interface for resolving the admin notification recipients.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Email addresses of everyone who should receive admin
    /// notifications, already de-duplicated.
    async fn list_active_admins(&self) -> Result<Vec<String>>;
}
