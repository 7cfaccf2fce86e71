//! Model sources: local directories and hub identifiers.
use anyhow::{Context, Result};
use hf_hub::api::sync::{Api, ApiRepo};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const CACHE_DIR_MARKER: &str = "models--";
const CACHE_DIR_SEPARATOR: &str = "--";

/// Where a load attempt reads model files from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "path {}", path.display()),
            ModelSource::Hub(id) => write!(f, "hub id {}", id),
        }
    }
}

/// Turns a hub-cache directory name into a model identifier.
///
/// `models--org--model-name` becomes `org/model-name`. Names without the
/// `models--` marker are returned unchanged.
pub fn normalize_model_identifier(name: &str) -> String {
    if name.contains(CACHE_DIR_MARKER) {
        name.replace(CACHE_DIR_MARKER, "")
            .replace(CACHE_DIR_SEPARATOR, "/")
    } else {
        name.to_string()
    }
}

/// An opened model source that hands out paths to individual files.
///
/// Hub files are fetched into the local hub cache on first access.
pub enum ModelDir {
    Local(PathBuf),
    Hub { id: String, repo: ApiRepo },
}

impl ModelDir {
    pub fn open(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local(path) => {
                if !path.is_dir() {
                    anyhow::bail!("model directory not found: {}", path.display());
                }
                Ok(ModelDir::Local(path.clone()))
            }
            ModelSource::Hub(id) => {
                let api = Api::new().context("failed to initialise hub client")?;
                Ok(ModelDir::Hub {
                    id: id.clone(),
                    repo: api.model(id.clone()),
                })
            }
        }
    }

    /// Path of `name` within the model, failing if it doesn't exist.
    pub fn file(&self, name: &str) -> Result<PathBuf> {
        match self {
            ModelDir::Local(root) => {
                let path = root.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    anyhow::bail!("{} not found in {}", name, root.display())
                }
            }
            ModelDir::Hub { id, repo } => {
                debug!("Fetching {} from hub repo {}", name, id);
                repo.get(name)
                    .with_context(|| format!("failed to fetch {} from {}", name, id))
            }
        }
    }

    pub fn read_to_string(&self, name: &str) -> Result<String> {
        let path = self.file(name)?;
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    pub fn read_json(&self, name: &str) -> Result<serde_json::Value> {
        let raw = self.read_to_string(name)?;
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", name))
    }
}

impl fmt::Display for ModelDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelDir::Local(root) => write!(f, "{}", root.display()),
            ModelDir::Hub { id, .. } => write!(f, "{}", id),
        }
    }
}

/// Default model name derived from the model path: its last component.
pub fn model_name_from_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
