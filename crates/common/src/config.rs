use std::{collections::HashSet, fmt, str::FromStr};

use camino::Utf8Path;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use toml::Value;

pub const DEFAULT_CHAIN_ID: u64 = 1337;
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown evm version \"{0}\"")]
    UnknownEvmVersion(String),
    #[error("gas limit must be greater than zero")]
    ZeroGasLimit,
    #[error("privacy group \"{0}\" has no members")]
    NoMembers(String),
    #[error("privacy group \"{group}\" lists member \"{member}\" more than once")]
    DuplicateMember { group: String, member: String },
    #[error("invalid member identity \"{0}\"")]
    InvalidMember(String),
}

/// Hardfork the runner executes under.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvmVersion {
    London,
    Paris,
    #[default]
    Shanghai,
    Cancun,
    Prague,
}

impl EvmVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::London => "london",
            Self::Paris => "paris",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
            Self::Prague => "prague",
        }
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvmVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "london" => Ok(Self::London),
            // The merge fork goes by both names.
            "paris" | "merge" => Ok(Self::Paris),
            "shanghai" => Ok(Self::Shanghai),
            "cancun" => Ok(Self::Cancun),
            "prague" => Ok(Self::Prague),
            _ => Err(ConfigError::UnknownEvmVersion(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for EvmVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Execution environment of a single EVM runner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunnerConfig {
    pub evm_version: EvmVersion,
    pub chain_id: u64,
    pub gas_limit: u64,
    /// Balance, in wei, credited to a sender account the first time it transacts.
    pub sender_balance: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            evm_version: EvmVersion::default(),
            chain_id: DEFAULT_CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            sender_balance: 0,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_limit == 0 {
            return Err(ConfigError::ZeroGasLimit);
        }
        Ok(())
    }
}

/// A privacy group: a named set of member identities sharing one world state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default = "default_group_name")]
    pub name: String,
    pub members: Vec<String>,
    #[serde(skip)]
    pub runner: RunnerConfig,
}

fn default_group_name() -> String {
    "default".to_string()
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
            runner: RunnerConfig::default(),
        }
    }

    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.members.is_empty() {
            return Err(ConfigError::NoMembers(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for member in &self.members {
            if member.trim().is_empty() || member.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidMember(member.clone()));
            }
            if !seen.insert(member.as_str()) {
                return Err(ConfigError::DuplicateMember {
                    group: self.name.clone(),
                    member: member.clone(),
                });
            }
        }
        self.runner.validate()
    }
}

/// Top level configuration file: an optional `[runner]` table and an
/// optional `[group]` table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub runner: RunnerConfig,
    pub group: Option<GroupConfig>,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let parsed: Value = content.parse()?;

        let runner = match parsed.get("runner") {
            Some(value) => value.clone().try_into::<RunnerConfig>()?,
            None => RunnerConfig::default(),
        };
        runner.validate()?;

        let group = match parsed.get("group") {
            Some(value) => {
                let group = value.clone().try_into::<GroupConfig>()?.with_runner(runner.clone());
                group.validate()?;
                Some(group)
            }
            None => None,
        };

        Ok(Self { runner, group })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        tracing::debug!(target: "config", "Loading config from {path}");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }
}
