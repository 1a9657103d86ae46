//! Admin directory implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::interfaces::directory::{AdminDirectory, Result};

/// Directory backed by a fixed, configured recipient list.
pub struct StaticDirectory {
    emails: Vec<String>,
}

impl StaticDirectory {
    pub fn new(emails: Vec<String>) -> Self {
        Self { emails }
    }
}

#[async_trait]
impl AdminDirectory for StaticDirectory {
    async fn list_active_admins(&self) -> Result<Vec<String>> {
        Ok(dedup(self.emails.iter().cloned()))
    }
}

/// Union of a static recipient list and another directory.
///
/// The static list comes first; duplicates from the inner directory are
/// dropped. This is where the configured-list-plus-admin-accounts merge
/// lives, so the dispatcher never has to know about it.
pub struct MergedDirectory {
    primary: Vec<String>,
    secondary: Arc<dyn AdminDirectory>,
}

impl MergedDirectory {
    pub fn new(primary: Vec<String>, secondary: Arc<dyn AdminDirectory>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl AdminDirectory for MergedDirectory {
    async fn list_active_admins(&self) -> Result<Vec<String>> {
        let secondary = self.secondary.list_active_admins().await?;
        Ok(dedup(self.primary.iter().cloned().chain(secondary)))
    }
}

/// Order-preserving de-duplication.
fn dedup(emails: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    emails.filter(|e| seen.insert(e.clone())).collect()
}
