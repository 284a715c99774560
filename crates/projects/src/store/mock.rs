//! In-memory project store for testing.

use super::{ProjectStore, matches_tool, upsert};
use crate::error::{ErrorKind, Result};
use crate::models::Project;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory project store for testing.
///
/// Projects live in a `Vec` behind a [`RwLock`], so all trait methods can
/// operate on `&self` without external synchronisation.
///
/// ```
/// use resizesuite_imaging::{Operation, Resize};
/// use resizesuite_projects::Project;
/// use resizesuite_projects::store::{MemoryStore, ProjectStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let project = Project::new("demo", Operation::Resize(Resize::Percent { percent: 50.0 }), time::OffsetDateTime::now_utc());
/// let store = MemoryStore::with_projects([project.clone()]);
/// assert_eq!(store.get(&project.id).await?, project);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<Vec<Project>>,
}

impl MemoryStore {
    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        Self { projects: RwLock::new(projects.into_iter().collect()) }
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, tool: Option<&str>) -> Result<Vec<Project>> {
        let projects = self.projects.read().await;
        Ok(projects.iter().filter(|p| matches_tool(p, tool)).cloned().collect())
    }

    async fn save(&self, project: &Project) -> Result<()> {
        upsert(&mut *self.projects.write().await, project);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut projects = self.projects.write().await;
        match projects.iter().position(|p| p.id == id) {
            Some(index) => {
                projects.remove(index);
                Ok(())
            },
            None => exn::bail!(ErrorKind::NotFound(id.to_string())),
        }
    }
}
