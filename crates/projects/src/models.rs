//! Project models.
//!
//! A project is a snapshot of one tool's settings plus the metadata of the
//! files it was used on (never the file contents), so a batch can be set up
//! again later.

use resizesuite_imaging::Operation;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Length of a project ID, in hex characters.
const ID_LENGTH: usize = 16;

/// Metadata of a file that was part of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    pub mime: String,
    pub size: u64,
}

/// A saved project.
///
/// Serialized as one element of the store's JSON array. Unknown fields are
/// ignored when loading, so older builds can read newer stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Which tool the settings belong to (e.g. `resize`, `watermark`).
    pub tool: String,
    pub settings: Operation,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
impl Project {
    /// Create a project for `settings`, named after the operation's tool.
    pub fn new(name: impl Into<String>, settings: Operation, now: OffsetDateTime) -> Self {
        let name = name.into();
        let tool = settings.as_str().to_string();
        Self {
            id: generate_id(&name, &tool, now),
            name,
            tool,
            settings,
            files: vec![],
            thumbnail: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_files(mut self, files: impl IntoIterator<Item = ProjectFile>) -> Self {
        self.files = files.into_iter().collect();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// BLAKE3 of the name, tool and creation time, shortened.
fn generate_id(name: &str, tool: &str, now: OffsetDateTime) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(tool.as_bytes());
    hasher.update(&now.unix_timestamp_nanos().to_le_bytes());
    let mut hex = hasher.finalize().to_hex().to_string();
    hex.truncate(ID_LENGTH);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use resizesuite_imaging::Resize;
    use time::macros::datetime;

    fn resize() -> Operation {
        Operation::Resize(Resize::Fit { width: 1080, height: 1080 })
    }

    #[test]
    fn test_new_project() {
        let now = datetime!(2024-03-09 12:30 UTC);
        let project = Project::new("Instagram batch", resize(), now);
        assert_eq!(project.tool, "resize");
        assert_eq!(project.id.len(), ID_LENGTH);
        assert!(project.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(project.created_at, project.updated_at);
    }

    #[test]
    fn test_ids_differ_by_time() {
        let a = Project::new("x", resize(), datetime!(2024-03-09 12:30 UTC));
        let b = Project::new("x", resize(), datetime!(2024-03-09 12:31 UTC));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_json_shape() {
        let project = Project::new("p", resize(), datetime!(2024-03-09 12:30 UTC))
            .with_files([ProjectFile { name: "a.png".into(), mime: "image/png".into(), size: 12 }]);
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(value["settings"]["op"], "resize");
        assert_eq!(value["created_at"], "2024-03-09T12:30:00Z");
        assert!(value.get("thumbnail").is_none());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{
            "id": "0123456789abcdef",
            "name": "old",
            "tool": "crop",
            "settings": {"op": "crop", "x": 0, "y": 0, "width": 10, "height": 10},
            "created_at": "2024-03-09T12:30:00Z",
            "updated_at": "2024-03-09T12:30:00Z",
            "schema": 7
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.tool, "crop");
        assert!(project.files.is_empty());
    }
}
