pub mod artifact;
pub mod config;

pub use artifact::{ArtifactError, ContractArtifact, ResourceLoader};
pub use config::{Config, ConfigError, EvmVersion, GroupConfig, RunnerConfig};
