//! Downloading implement sources into the local cache.

use std::path::PathBuf;

use crate::error::{LookoutError, Result};
use crate::{io, paths};

pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` into the cache as `file_name`, returning the cached path.
    fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf>;
}

impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for std::sync::Arc<T> {
    fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        (**self).fetch(url, file_name)
    }
}

/// Fetches over HTTP(S) into a fixed cache directory. Every call downloads
/// again and overwrites the cached copy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    cache_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        HttpFetcher {
            cache_dir: cache_dir.into(),
        }
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let download_err = |reason: String| LookoutError::Download {
            url: url.to_string(),
            reason,
        };
        tracing::info!(url = %url, file = %file_name, "downloading implement");

        let response = reqwest::blocking::get(url).map_err(|e| download_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_err(format!("server returned {status}")));
        }
        let body = response.bytes().map_err(|e| download_err(e.to_string()))?;

        let dest = paths::cached_implement(&self.cache_dir, file_name);
        io::atomic_write(&dest, &body)?;
        io::make_executable(&dest)?;
        Ok(dest)
    }
}
