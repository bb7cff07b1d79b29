//! Packaged contract artifacts.
//!
//! Artifacts are the JSON documents emitted by Solidity toolchains
//! (`contracts/<Name>.sol/<Name>.json`). Only the `bytecode` entry is required.
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read resource {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid artifact json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("resource {path} has no string entry \"{entry}\"")]
    MissingEntry { path: Utf8PathBuf, entry: String },
    #[error("artifact bytecode is empty")]
    EmptyBytecode,
    #[error("invalid bytecode hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub abi: Vec<Value>,
    pub bytecode: String,
    #[serde(default)]
    pub deployed_bytecode: Option<String>,
}

impl ContractArtifact {
    pub fn from_json(content: &str) -> Result<Self, ArtifactError> {
        let artifact: Self = serde_json::from_str(content)?;
        if strip_hex_prefix(&artifact.bytecode).is_empty() {
            return Err(ArtifactError::EmptyBytecode);
        }
        Ok(artifact)
    }

    pub fn load(path: &Utf8Path) -> Result<Self, ArtifactError> {
        let content = read_resource(path)?;
        Self::from_json(&content)
    }

    /// Decodes the init bytecode.
    pub fn bytecode_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(hex::decode(strip_hex_prefix(&self.bytecode))?)
    }
}

/// Resolves packaged resources relative to a root directory.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    root: Utf8PathBuf,
}

impl ResourceLoader {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn resolve(&self, resource: &str) -> Utf8PathBuf {
        self.root.join(resource.trim_start_matches('/'))
    }

    pub fn json_resource(&self, resource: &str) -> Result<Value, ArtifactError> {
        let content = read_resource(&self.resolve(resource))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Returns the text of a top level string entry of a JSON resource.
    pub fn json_resource_entry_text(
        &self,
        resource: &str,
        entry: &str,
    ) -> Result<String, ArtifactError> {
        let document = self.json_resource(resource)?;
        document
            .get(entry)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ArtifactError::MissingEntry {
                path: self.resolve(resource),
                entry: entry.to_string(),
            })
    }

    pub fn artifact(&self, resource: &str) -> Result<ContractArtifact, ArtifactError> {
        ContractArtifact::load(&self.resolve(resource))
    }
}

fn read_resource(path: &Utf8Path) -> Result<String, ArtifactError> {
    tracing::debug!(target: "artifact", "Reading {path}");
    std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_owned(),
        source,
    })
}

fn strip_hex_prefix(hex: &str) -> &str {
    let trimmed = hex.trim();
    trimmed.strip_prefix("0x").unwrap_or(trimmed)
}
