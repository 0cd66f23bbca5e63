use crate::{Error, Result};
use hf_hub::{
    Repo, RepoType,
    api::sync::{Api, ApiRepo},
};
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

const SAFETENSORS_INDEX: &str = "model.safetensors.index.json";
const SINGLE_SAFETENSORS: &str = "model.safetensors";

/// Files that make up a base model checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Files that make up a LoRA adapter.
#[derive(Debug, Clone)]
pub struct AdapterFiles {
    pub config: PathBuf,
    pub weights: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SafetensorsIndex {
    weight_map: std::collections::HashMap<String, String>,
}

/// Where a model or adapter identifier points to.
enum Source {
    Local(PathBuf),
    Hub(ApiRepo),
}

impl Source {
    fn resolve(id: &str, revision: &str) -> Result<Self> {
        let path = Path::new(id);
        if path.is_dir() {
            return Ok(Self::Local(path.to_path_buf()));
        }
        if looks_like_path(id) {
            return Err(Error::model(format!("Model directory not found: {}", id)));
        }

        debug!("Resolving '{}' (revision {}) on the model hub", id, revision);
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));
        Ok(Self::Hub(repo))
    }

    fn get(&self, file: &str) -> Result<PathBuf> {
        match self {
            Self::Local(dir) => {
                let path = dir.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(Error::model(format!(
                        "Missing file {} in {}",
                        file,
                        dir.display()
                    )))
                }
            }
            Self::Hub(repo) => Ok(repo.get(file)?),
        }
    }

    fn try_get(&self, file: &str) -> Option<PathBuf> {
        self.get(file).ok()
    }
}

fn looks_like_path(id: &str) -> bool {
    id.starts_with('/')
        || id.starts_with('.')
        || id.starts_with('~')
        || id.contains('\\')
        || id.matches('/').count() > 1
}

impl ModelFiles {
    pub fn resolve(id: &str, revision: &str) -> Result<Self> {
        let source = Source::resolve(id, revision)?;

        let config = source.get("config.json")?;
        let tokenizer = source.get("tokenizer.json")?;

        let weights = match source.try_get(SAFETENSORS_INDEX) {
            Some(index_path) => {
                let index: SafetensorsIndex =
                    serde_json::from_slice(&std::fs::read(&index_path)?)?;
                let shards: BTreeSet<String> = index.weight_map.into_values().collect();
                shards
                    .iter()
                    .map(|shard| source.get(shard))
                    .collect::<Result<Vec<_>>>()?
            }
            None => vec![source.get(SINGLE_SAFETENSORS)?],
        };

        info!("Resolved model '{}' with {} weight file(s)", id, weights.len());

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

impl AdapterFiles {
    pub fn resolve(id: &str, revision: &str) -> Result<Self> {
        let source = Source::resolve(id, revision)
            .map_err(|e| Error::adapter(format!("Cannot locate adapter '{}': {}", id, e)))?;

        let config = source
            .get("adapter_config.json")
            .map_err(|e| Error::adapter(e.to_string()))?;
        let weights = source
            .get("adapter_model.safetensors")
            .map_err(|e| Error::adapter(e.to_string()))?;

        info!("Resolved adapter '{}'", id);
        Ok(Self { config, weights })
    }
}
