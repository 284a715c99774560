//! Layered configuration.
//!
//! Later sources override earlier ones:
//! 1. built-in defaults,
//! 2. `config.toml`, `config.yaml` and `config.json` in the platform config
//!    directory (e.g. `~/.config/resizesuite/` on Linux),
//! 3. a file passed explicitly (`--config`),
//! 4. `RESIZESUITE_*` environment variables, with `__` separating nested
//!    keys (`RESIZESUITE_TIERS__FREE__MAX_IMAGES=10`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use resizesuite_archive::{Compression, NamingTemplate};
use resizesuite_batch::RetryPolicy;
use resizesuite_tiers::{ContentPolicy, LimitOverrides, Plan, Registry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "RESIZESUITE_";
const PROJECTS_FILE: &str = "projects.json";

/// Per-tier numeric overrides, applied once when the registry is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierOverrides {
    pub free: LimitOverrides,
    pub pro: LimitOverrides,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Plan assumed when nothing else says otherwise.
    pub plan: Plan,
    pub tiers: TierOverrides,
    /// Default naming for archive entries.
    pub naming: NamingTemplate,
    pub compression: Compression,
    pub retry: RetryPolicy,
    /// Check magic bytes against the declared MIME type during validation.
    pub sniff_content: bool,
    /// Where saved projects live. Defaults to the platform data directory.
    pub projects_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from every source, `explicit` being the `--config`
    /// file if one was given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let dirs = project_dirs();
        Self::from_figment(Self::figment(dirs.as_ref().map(|d| d.config_dir()), explicit)?)
    }

    /// Assemble the provider chain without extracting.
    pub fn figment(config_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(dir) = config_dir {
            tracing::debug!(dir = %dir.display(), "Looking for config files");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = match figment.extract() {
            Ok(settings) => settings,
            Err(e) => {
                let message = e.to_string();
                return Err(e).or_raise(|| ErrorKind::Invalid(message));
            },
        };
        tracing::debug!(?settings, "Configuration loaded");
        Ok(settings)
    }

    /// Tier registry with this configuration's overrides applied.
    #[must_use]
    pub fn registry(&self) -> Registry {
        Registry::with_overrides(&self.tiers.free, &self.tiers.pro)
    }

    #[must_use]
    pub fn content_policy(&self) -> ContentPolicy {
        match self.sniff_content {
            true => ContentPolicy::Sniff,
            false => ContentPolicy::TrustDeclared,
        }
    }

    /// The configured projects file, else `projects.json` in the platform
    /// data directory, else in the working directory.
    #[must_use]
    pub fn projects_path(&self) -> PathBuf {
        match (&self.projects_path, project_dirs()) {
            (Some(path), _) => path.clone(),
            (None, Some(dirs)) => dirs.data_dir().join(PROJECTS_FILE),
            (None, None) => PathBuf::from(PROJECTS_FILE),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "resizesuite")
}
