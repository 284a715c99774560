//! Project store trait and implementations.
//!
//! A store is a flat collection of [`Project`]s keyed by ID. Saves are
//! upserts: saving a project whose ID already exists replaces it in place.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MemoryStore;
use crate::error::{ErrorKind, Result};
use crate::models::Project;
use async_trait::async_trait;

/// Unified interface for project stores.
///
/// # Examples
///
/// ```no_run
/// use resizesuite_projects::store::ProjectStore;
/// # use resizesuite_projects::error::Result;
/// # async fn example(store: &dyn ProjectStore) -> Result<()> {
/// for project in store.list(Some("resize")).await? {
///     println!("{} ({})", project.name, project.id);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Name of the store (for logging only).
    fn name(&self) -> &str;

    /// Every saved project, optionally only those of one tool, in the order
    /// they were first saved.
    async fn list(&self, tool: Option<&str>) -> Result<Vec<Project>>;

    /// Fetch one project.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if there is
    /// no project with this ID. The default implementation scans
    /// [`list()`](Self::list).
    async fn get(&self, id: &str) -> Result<Project> {
        match self.list(None).await?.into_iter().find(|p| p.id == id) {
            Some(project) => Ok(project),
            None => exn::bail!(ErrorKind::NotFound(id.to_string())),
        }
    }

    /// Insert or replace a project by ID.
    async fn save(&self, project: &Project) -> Result<()>;

    /// Remove a project.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if there is
    /// no project with this ID.
    async fn delete(&self, id: &str) -> Result<()>;
}

fn matches_tool(project: &Project, tool: Option<&str>) -> bool {
    tool.is_none_or(|tool| project.tool == tool)
}

/// Replace the project with the same ID, or append.
fn upsert(projects: &mut Vec<Project>, project: &Project) {
    match projects.iter_mut().find(|p| p.id == project.id) {
        Some(existing) => *existing = project.clone(),
        None => projects.push(project.clone()),
    }
}
