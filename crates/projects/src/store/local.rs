//! Project store backed by one JSON file on the local filesystem.

use super::{ProjectStore, matches_tool, upsert};
use crate::error::{ErrorKind, Result};
use crate::models::Project;
use async_trait::async_trait;
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Keeps every project in a single JSON array.
///
/// Every write rewrites the whole file. A missing file is an empty store;
/// parent directories are created on first save. Writes within one process
/// are serialised; nothing coordinates separate processes.
///
/// # Examples
///
/// ```no_run
/// use resizesuite_projects::store::{LocalStore, ProjectStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("/home/me/.local/share/resizesuite/projects.json");
/// println!("{} saved projects", store.list(None).await?.len());
/// # Ok(())
/// # }
/// ```
pub struct LocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Project>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No project store yet");
                return Ok(vec![]);
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(self.path.clone())),
        };
        serde_json::from_slice(&data).or_raise(|| ErrorKind::Corrupt(self.path.clone()))
    }

    async fn persist(&self, projects: &[Project]) -> Result<()> {
        let data = serde_json::to_vec_pretty(projects).or_raise(|| ErrorKind::Serialize)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        }
        fs::write(&self.path, data).await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
        tracing::debug!(path = %self.path.display(), count = projects.len(), "Project store written");
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self, tool: Option<&str>) -> Result<Vec<Project>> {
        let mut projects = self.load().await?;
        projects.retain(|p| matches_tool(p, tool));
        Ok(projects)
    }

    async fn save(&self, project: &Project) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut projects = self.load().await?;
        upsert(&mut projects, project);
        self.persist(&projects).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut projects = self.load().await?;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        self.persist(&projects).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resizesuite_imaging::{Operation, Resize, Watermark};
    use time::macros::datetime;

    fn project(name: &str, operation: Operation) -> Project {
        Project::new(name, operation, datetime!(2024-03-09 12:30 UTC))
    }

    fn resize() -> Operation {
        Operation::Resize(Resize::Percent { percent: 50.0 })
    }

    fn setup() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested").join("projects.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let (_dir, store) = setup();
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let (_dir, store) = setup();
        let p = project("one", resize());
        store.save(&p).await.unwrap();
        assert_eq!(store.get(&p.id).await.unwrap(), p);
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let (_dir, store) = setup();
        let mut p = project("one", resize());
        store.save(&p).await.unwrap();
        p.name = "renamed".to_string();
        store.save(&p).await.unwrap();
        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "renamed");
    }

    #[tokio::test]
    async fn test_list_filters_by_tool() {
        let (_dir, store) = setup();
        store.save(&project("a", resize())).await.unwrap();
        store.save(&project("b", Operation::Watermark(Watermark::default()))).await.unwrap();
        let resizes = store.list(Some("resize")).await.unwrap();
        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].name, "a");
        assert_eq!(store.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, store) = setup();
        let p = project("one", resize());
        store.save(&p).await.unwrap();
        store.delete(&p.id).await.unwrap();
        let err = store.get(&p.id).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(p.id.clone()));
        let err = store.delete(&p.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let (_dir, store) = setup();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{not an array").unwrap();
        let err = store.list(None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt(store.path().to_path_buf()));
    }
}
