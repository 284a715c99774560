//! Saved projects.
//!
//! A [`Project`] remembers a tool's settings and the files it was used on.
//! [`ProjectStore`](store::ProjectStore) implementations persist them, and
//! [`Projects`] puts plan gating in front of any store: only plans with the
//! `projects` capability may save, and no more than `max_templates` of them.

pub mod error;
mod models;
pub mod store;

pub use crate::models::{Project, ProjectFile};
use crate::error::{ErrorKind, Result};
use crate::store::ProjectStore;
use resizesuite_tiers::{Capability, TierLimits, require};
use std::sync::Arc;
use time::OffsetDateTime;

pub type StoreHandle = Arc<dyn ProjectStore + Send + Sync>;

/// Plan-aware access to a [`ProjectStore`].
///
/// Listing, loading and deleting stay available after a downgrade so
/// nobody loses access to what they saved; only saving is gated.
#[derive(Clone)]
pub struct Projects {
    store: StoreHandle,
}
impl Projects {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn list(&self, tool: Option<&str>) -> Result<Vec<Project>> {
        self.store.list(tool).await
    }

    pub async fn get(&self, id: &str) -> Result<Project> {
        self.store.get(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        tracing::info!(store = self.store.name(), %id, "Project deleted");
        Ok(())
    }

    /// Save `project`, creating it or updating the one with the same ID.
    ///
    /// Updates keep the original `created_at` and don't count against the
    /// plan's allowance.
    pub async fn save(&self, limits: &TierLimits, mut project: Project) -> Result<Project> {
        if let Err(rejection) = require(limits, Capability::Projects) {
            exn::bail!(ErrorKind::Rejected(rejection));
        }
        let existing = self.store.list(None).await?;
        match existing.iter().find(|p| p.id == project.id) {
            Some(previous) => {
                project.created_at = previous.created_at;
                project.updated_at = OffsetDateTime::now_utc();
            },
            None if existing.len() >= limits.max_templates => {
                exn::bail!(ErrorKind::LimitReached(limits.max_templates));
            },
            None => {},
        }
        self.store.save(&project).await?;
        tracing::info!(store = self.store.name(), id = %project.id, tool = %project.tool, "Project saved");
        Ok(project)
    }
}
