use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_INDEX_PATH: &str = "data/resources_index.json";
/// Grace period between page load and the automatic deep-link search.
pub const DEFAULT_DEEP_LINK_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("index source cannot be empty")]
    EmptySource,
    #[error("unknown shell variant {0:?} (expected `modal` or `inline`)")]
    UnknownVariant(String),
}

/// Where the catalog document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    Http(String),
    File(PathBuf),
}

impl IndexSource {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptySource);
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Http(trimmed.to_string()));
        }
        let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        Ok(Self::File(PathBuf::from(path)))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl Default for IndexSource {
    fn default() -> Self {
        Self::File(PathBuf::from(DEFAULT_INDEX_PATH))
    }
}

impl fmt::Display for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSource::Http(url) => write!(f, "{url}"),
            IndexSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for IndexSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which presentation shell a deployment uses.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum ShellVariant {
    #[default]
    Modal,
    Inline,
}

impl fmt::Display for ShellVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellVariant::Modal => write!(f, "modal"),
            ShellVariant::Inline => write!(f, "inline"),
        }
    }
}

impl FromStr for ShellVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modal" => Ok(Self::Modal),
            "inline" => Ok(Self::Inline),
            other => Err(ConfigError::UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub index: IndexSource,
    pub variant: ShellVariant,
    pub deep_link_delay: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: IndexSource::default(),
            variant: ShellVariant::default(),
            deep_link_delay: DEFAULT_DEEP_LINK_DELAY,
        }
    }
}
