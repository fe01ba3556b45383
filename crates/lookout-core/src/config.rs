use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::paths;

/// Settings injected into the engine for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Where downloaded implement sources are cached.
    pub cache_dir: PathBuf,
    /// Number of observations evaluated at once. 1 runs them in sequence.
    pub jobs: usize,
    /// Deadline for each command the engine launches.
    pub timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(cache_dir: PathBuf) -> Self {
        EngineConfig {
            cache_dir,
            jobs: 1,
            timeout: None,
        }
    }

    /// Defaults for the invoking user: cache under `~/.lookout/impls`.
    pub fn for_current_user() -> Result<Self> {
        Ok(EngineConfig::new(paths::default_cache_dir()?))
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
