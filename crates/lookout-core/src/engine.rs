//! The engine ties the registry to its collaborators: a command executor for
//! running implements and actions, and a fetcher for remote implement sources.
//! One engine serves one invocation.

use crate::config::EngineConfig;
use crate::error::{LookoutError, Result};
use crate::exec::{CommandExecutor, LocalExecutor};
use crate::fetch::{ArtifactFetcher, HttpFetcher};
use crate::operation::{Action, ActionResults, Implement, ObservationResults, Operations, ReactionResults};

pub struct Engine {
    executor: Box<dyn CommandExecutor>,
    fetcher: Box<dyn ArtifactFetcher>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        executor: Box<dyn CommandExecutor>,
        fetcher: Box<dyn ArtifactFetcher>,
        config: EngineConfig,
    ) -> Self {
        Engine {
            executor,
            fetcher,
            config,
        }
    }

    /// Engine that runs everything on this host and downloads over HTTP.
    pub fn local(config: EngineConfig) -> Self {
        Engine::new(
            Box::new(LocalExecutor::new(config.timeout)),
            Box::new(HttpFetcher::new(config.cache_dir.clone())),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    /// Evaluate every observation once.
    pub fn observe(&self, ops: &Operations) -> ObservationResults {
        self.run_all_observations(&ops.observations, &ops.implements)
    }

    /// Evaluate every observation, then react to the results of that same pass.
    pub fn react(&self, ops: &Operations) -> ReactionResults {
        let observed = self.observe(ops);
        self.react_to(ops, observed)
    }

    /// Run one named action.
    pub fn run(&self, ops: &Operations, name: &str) -> Result<ActionResults> {
        if name.is_empty() {
            return Err(LookoutError::InvalidInput("action name must not be empty".into()));
        }
        let action = ops.action(name).ok_or_else(|| {
            LookoutError::NotFound(format!(
                "Name \"{name}\" does not match any existing action names"
            ))
        })?;
        let mut results = ActionResults::default();
        results
            .actions
            .insert(name.to_string(), self.run_action(action));
        Ok(results)
    }

    /// Turn an implement into a runnable action, downloading its source first
    /// when it declares one. The download replaces `path` when the implement
    /// names an `exe`, and becomes the `exe` itself otherwise.
    pub(crate) fn implement_action(
        &self,
        name: &str,
        implement: &Implement,
        args: Vec<String>,
    ) -> Result<Action> {
        let mut action = Action {
            path: implement.path.clone(),
            script: implement.script.clone(),
            exe: implement.exe.clone(),
            args,
        };
        if implement.has_source() {
            tracing::debug!(implement = %name, url = %implement.source_url, "resolving implement source");
            let fetched = self
                .fetcher
                .fetch(&implement.source_url, &implement.source_file)?
                .to_string_lossy()
                .into_owned();
            if action.exe.is_empty() {
                action.exe = fetched;
                action.path.clear();
            } else {
                action.path = fetched;
            }
        }
        Ok(action)
    }
}
