use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IndexSource;
use crate::data::ResourceIndex;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to fetch search index, status code: {status}")]
    Status { status: u16, uri: String },
    #[error("unable to reach search index: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unable to read search index {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("search index is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Produces a fresh [`ResourceIndex`] for every search.
pub trait IndexLoader {
    fn load(&self) -> impl Future<Output = Result<ResourceIndex, LoadError>> + Send;
}

/// Loads from the configured source on every call.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    source: IndexSource,
    client: reqwest::Client,
}

impl SourceLoader {
    pub fn new(source: IndexSource) -> Self {
        Self {
            source,
            client: reqwest::Client::new(),
        }
    }
}

impl IndexLoader for SourceLoader {
    fn load(&self) -> impl Future<Output = Result<ResourceIndex, LoadError>> + Send {
        load_with(&self.client, &self.source)
    }
}

/// Hands out clones of an index that is already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    index: ResourceIndex,
}

impl StaticLoader {
    pub fn new(index: ResourceIndex) -> Self {
        Self { index }
    }
}

impl IndexLoader for StaticLoader {
    fn load(&self) -> impl Future<Output = Result<ResourceIndex, LoadError>> + Send {
        let index = self.index.clone();
        async move { Ok(index) }
    }
}

/// One read of `source`, no retries.
pub async fn load_index(source: &IndexSource) -> Result<ResourceIndex, LoadError> {
    load_with(&reqwest::Client::new(), source).await
}

async fn load_with(
    client: &reqwest::Client,
    source: &IndexSource,
) -> Result<ResourceIndex, LoadError> {
    info!(%source, "Loading search index");
    let result = match source {
        IndexSource::Http(url) => fetch_http(client, url).await,
        IndexSource::File(path) => read_file(path).await,
    };
    match &result {
        Ok(index) => debug!(
            resources = index.len(),
            sections = index.section_count(),
            "Search index parsed"
        ),
        Err(err) => warn!(%source, error = %err, "Search index load failed"),
    }
    result
}

async fn fetch_http(client: &reqwest::Client, url: &str) -> Result<ResourceIndex, LoadError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    debug!(status = status.as_u16(), "Index request completed");
    if !status.is_success() {
        return Err(LoadError::Status {
            status: status.as_u16(),
            uri: url.to_string(),
        });
    }
    let bytes = response.bytes().await?;
    Ok(ResourceIndex::from_json(&bytes)?)
}

async fn read_file(path: &Path) -> Result<ResourceIndex, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ResourceIndex::from_json(&bytes)?)
}
