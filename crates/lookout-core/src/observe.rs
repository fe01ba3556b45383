use std::collections::BTreeMap;
use std::sync::Mutex;
use std::thread;

use crate::args::resolve_args;
use crate::engine::Engine;
use crate::exec::CommandSpec;
use crate::operation::{Implement, Observation, ObservationResult, ObservationResults};
use crate::registry::find_observing;

impl Engine {
    /// Evaluate one observation with the first implement, by name, that answers
    /// its entity and query.
    pub fn run_observation(
        &self,
        name: &str,
        observation: &Observation,
        implements: &BTreeMap<String, Implement>,
    ) -> ObservationResult {
        let Some((impl_name, implement)) =
            find_observing(implements, &observation.entity, &observation.query)
        else {
            return ObservationResult::failed(
                observation,
                format!("no implement found for observation '{name}'"),
                "",
            );
        };

        let arg_spec = implement
            .observing()
            .map(|o| o.args.as_slice())
            .unwrap_or_default();
        let args = resolve_args(arg_spec, observation);
        let action = match self.implement_action(impl_name, implement, args) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(observation = %name, implement = %impl_name, error = %e, "implement download failed");
                return ObservationResult::failed(observation, "failed to download implement", e.to_string());
            }
        };

        tracing::debug!(observation = %name, implement = %impl_name, "running observation");
        match self.executor().run(&CommandSpec::from(&action)) {
            Ok(out) => {
                let expected = observation.expect.is_empty() || observation.expect == out.stdout;
                ObservationResult {
                    succeeded: true,
                    result: out.stdout,
                    expected,
                    logs: out.stderr,
                    observation: observation.clone(),
                }
            }
            Err(e) => {
                tracing::warn!(observation = %name, implement = %impl_name, "observation failed");
                let (_, stderr) = e.captured();
                ObservationResult::failed(
                    observation,
                    format!("error: {}", e.to_string().trim()),
                    stderr,
                )
            }
        }
    }

    /// Evaluate every observation independently. With `jobs > 1` they run on a
    /// bounded pool of scoped threads; the call returns once all have finished.
    pub fn run_all_observations(
        &self,
        observations: &BTreeMap<String, Observation>,
        implements: &BTreeMap<String, Implement>,
    ) -> ObservationResults {
        let workers = self.config().jobs.min(observations.len());
        if workers <= 1 {
            let mut results = ObservationResults::default();
            for (name, obsv) in observations {
                let result = self.run_observation(name, obsv, implements);
                results.record(name.clone(), result);
            }
            return results;
        }

        let queue = Mutex::new(observations.iter());
        let results = Mutex::new(ObservationResults::default());
        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let next = queue.lock().ok().and_then(|mut q| q.next());
                    let Some((name, obsv)) = next else {
                        break;
                    };
                    let result = self.run_observation(name, obsv, implements);
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .record(name.clone(), result);
                });
            }
        });
        results.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::operation::Operations;
    use crate::testing::{ScriptedExecutor, StaticFetcher};
    use std::path::PathBuf;
    use std::sync::Arc;

    const SPEC: &str = r#"
observations:
  root_fs:
    entity: disk
    query: usage
    instance: /
    expect: ok
  var_fs:
    entity: disk
    query: usage
    instance: /var
  load:
    entity: cpu
    query: load
    instance: host
implements:
  disk_usage:
    exe: sh
    script: usage-check
    observes:
      entity: disk
      query: usage
      args: [--mount, __obsv_instance__]
"#;

    fn engine(exec: ScriptedExecutor, jobs: usize) -> Engine {
        Engine::new(
            Box::new(exec),
            Box::new(StaticFetcher::new("/cache")),
            EngineConfig::new(PathBuf::from("/cache")).with_jobs(jobs),
        )
    }

    fn ops(doc: &str) -> Operations {
        let mut ops = Operations::default();
        ops.load(doc.as_bytes()).unwrap();
        ops
    }

    #[test]
    fn compares_output_to_expectation() {
        let e = engine(ScriptedExecutor::default().respond("usage-check", "full"), 1);
        let ops = ops(SPEC);
        let result = e.run_observation("root_fs", &ops.observations["root_fs"], &ops.implements);
        assert!(result.succeeded);
        assert_eq!(result.result, "full");
        assert!(!result.expected);
    }

    #[test]
    fn empty_expect_is_always_expected() {
        let e = engine(ScriptedExecutor::default().respond("usage-check", "anything at all"), 1);
        let ops = ops(SPEC);
        let result = e.run_observation("var_fs", &ops.observations["var_fs"], &ops.implements);
        assert!(result.succeeded);
        assert!(result.expected);
    }

    #[test]
    fn instance_is_substituted_into_args() {
        let exec = Arc::new(ScriptedExecutor::default().respond("usage-check", "ok"));
        let e = Engine::new(
            Box::new(Arc::clone(&exec)),
            Box::new(StaticFetcher::new("/cache")),
            EngineConfig::new(PathBuf::from("/cache")),
        );
        let ops = ops(SPEC);
        e.run_observation("var_fs", &ops.observations["var_fs"], &ops.implements);
        assert_eq!(exec.calls()[0].args, vec!["--mount", "/var"]);
    }

    #[test]
    fn missing_implement_fails_with_name() {
        let e = engine(ScriptedExecutor::default(), 1);
        let ops = ops(SPEC);
        let result = e.run_observation("load", &ops.observations["load"], &ops.implements);
        assert!(!result.succeeded);
        assert!(!result.expected);
        assert_eq!(result.result, "no implement found for observation 'load'");
    }

    #[test]
    fn execution_error_is_prefixed() {
        let e = engine(ScriptedExecutor::default().fail("usage-check", 2, "df: not found"), 1);
        let ops = ops(SPEC);
        let result = e.run_observation("root_fs", &ops.observations["root_fs"], &ops.implements);
        assert!(!result.succeeded);
        assert!(result.result.starts_with("error: Command"));
        assert_eq!(result.logs, "df: not found");
    }

    #[test]
    fn download_failure_is_reported() {
        let e = Engine::new(
            Box::new(ScriptedExecutor::default()),
            Box::new(StaticFetcher::broken()),
            EngineConfig::new(PathBuf::from("/cache")),
        );
        let ops = ops(
            "observations:\n  o: {entity: e, query: q, instance: i}\nimplements:\n  remote:\n    source_file: check.sh\n    source_url: https://example.com/check.sh\n    observes: {entity: e, query: q, args: []}\n",
        );
        let result = e.run_observation("o", &ops.observations["o"], &ops.implements);
        assert!(!result.succeeded);
        assert_eq!(result.result, "failed to download implement");
        assert!(result.logs.contains("connection refused"));
    }

    #[test]
    fn run_all_counts_results() {
        let e = engine(ScriptedExecutor::default().respond("usage-check", "full"), 1);
        let results = e.observe(&ops(SPEC));
        assert_eq!(results.total_observations, 3);
        assert_eq!(results.failed_observations, 1);
        // root_fs expected ok, load failed
        assert_eq!(results.unexpected_observations, 2);
    }

    #[test]
    fn parallel_pass_matches_sequential() {
        let sequential = engine(ScriptedExecutor::default().respond("usage-check", "full"), 1)
            .observe(&ops(SPEC));
        let parallel = engine(ScriptedExecutor::default().respond("usage-check", "full"), 4)
            .observe(&ops(SPEC));
        assert_eq!(sequential, parallel);
    }
}
