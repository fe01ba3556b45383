//! Reaction resolution.
//!
//! A reaction never re-runs its observation; it reads the result of the pass
//! that just finished. Every outcome, including "nothing to react to", is a
//! [`ReactionResult`] so one bad reaction never stops the others.

use std::collections::BTreeMap;

use crate::args::resolve_args;
use crate::engine::Engine;
use crate::operation::{
    Action, Implement, Observation, ObservationResult, ObservationResults, Operations, Reaction,
    ReactionResult, ReactionResults,
};

const EXPECTED_SKIP: &str = "Skipped reaction: observation was the expected result";
const NOT_EXPECTED_SKIP: &str = "Skipped reaction: observation was not the expected result";
const NO_MATCH_SKIP: &str = "Skipped reaction: observation output did not match";

/// What a non-correction reaction will run once its condition holds.
enum Target<'a> {
    Named(&'a Action),
    Implement(&'a str, &'a Implement),
}

impl Engine {
    /// Resolve every reaction against one observation pass. Observation
    /// counters are carried forward unchanged.
    pub fn react_to(&self, ops: &Operations, observed: ObservationResults) -> ReactionResults {
        let mut results = ReactionResults::from_observations(observed);
        for (name, reaction) in &ops.reactions {
            let result = self.resolve_reaction(reaction, ops, &results.observations);
            if !result.succeeded {
                tracing::warn!(reaction = %name, detail = %result.message, "reaction failed");
            } else {
                tracing::debug!(reaction = %name, skipped = result.skipped, detail = %result.message, "reaction resolved");
            }
            results.record(name.clone(), result);
        }
        results
    }

    pub fn resolve_reaction(
        &self,
        reaction: &Reaction,
        ops: &Operations,
        observed: &BTreeMap<String, ObservationResult>,
    ) -> ReactionResult {
        let (Some(obsv), Some(obsv_result)) = (
            ops.observation(&reaction.observation),
            observed.get(&reaction.observation),
        ) else {
            return outcome(
                reaction,
                false,
                true,
                format!("Cannot react, '{}' observation not found", reaction.observation),
            );
        };

        if !obsv_result.succeeded {
            return ReactionResult {
                output: obsv_result.result.clone(),
                logs: obsv_result.logs.clone(),
                ..outcome(reaction, false, true, "Cannot react, error running observation")
            };
        }

        if reaction.is_correction() {
            self.correct(reaction, ops, obsv, obsv_result)
        } else {
            self.react_with_action(reaction, ops, obsv, obsv_result)
        }
    }

    fn correct(
        &self,
        reaction: &Reaction,
        ops: &Operations,
        obsv: &Observation,
        obsv_result: &ObservationResult,
    ) -> ReactionResult {
        if obsv_result.expected {
            return skipped(reaction, EXPECTED_SKIP);
        }
        match ops.implement_correcting(obsv, obsv_result) {
            Some((name, implement)) => self.fire_implement(reaction, name, implement, obsv),
            None => outcome(
                reaction,
                false,
                true,
                format!(
                    "Could not react, no correction found for Entity {} Query {} with result {} that can correct to expected result {}",
                    obsv.entity, obsv.query, obsv_result.result, obsv.expect
                ),
            ),
        }
    }

    fn react_with_action(
        &self,
        reaction: &Reaction,
        ops: &Operations,
        obsv: &Observation,
        obsv_result: &ObservationResult,
    ) -> ReactionResult {
        let target = if let Some(action) = ops.action(&reaction.action) {
            Target::Named(action)
        } else if let Some(implement) = ops.implement(&reaction.action) {
            Target::Implement(&reaction.action, implement)
        } else {
            return outcome(
                reaction,
                false,
                true,
                format!("Could not react, '{}' action not found", reaction.action),
            );
        };

        let value = reaction.condition.value.as_ref();
        let (fire, skip_message) = match reaction.condition.check.as_str() {
            "matches" => (
                value.and_then(|v| v.as_text()) == Some(obsv_result.result.as_str()),
                NO_MATCH_SKIP,
            ),
            "expected" => (
                value.and_then(|v| v.as_bool()) == Some(obsv_result.expected),
                if obsv_result.expected {
                    EXPECTED_SKIP
                } else {
                    NOT_EXPECTED_SKIP
                },
            ),
            other => {
                return outcome(
                    reaction,
                    false,
                    false,
                    format!("Error checking condition, unknown Check type '{other}'"),
                )
            }
        };
        if !fire {
            return skipped(reaction, skip_message);
        }

        match target {
            Target::Named(action) => self.fire(reaction, &reaction.action, action),
            Target::Implement(name, implement) => {
                self.fire_implement(reaction, name, implement, obsv)
            }
        }
    }

    /// Resolve an implement's reaction args and source, then run it.
    fn fire_implement(
        &self,
        reaction: &Reaction,
        name: &str,
        implement: &Implement,
        obsv: &Observation,
    ) -> ReactionResult {
        let args = resolve_args(&implement.reaction_action().args, obsv);
        match self.implement_action(name, implement, args) {
            Ok(action) => self.fire(reaction, name, &action),
            Err(e) => ReactionResult {
                logs: e.to_string(),
                ..outcome(
                    reaction,
                    false,
                    false,
                    format!("Error running '{name}': failed to download implement"),
                )
            },
        }
    }

    fn fire(&self, reaction: &Reaction, name: &str, action: &Action) -> ReactionResult {
        let result = self.run_action(action);
        let message = if result.succeeded {
            format!("Successfully ran '{name}'")
        } else {
            format!("Error running '{name}'")
        };
        ReactionResult {
            output: result.output,
            logs: result.logs,
            ..outcome(reaction, result.succeeded, false, message)
        }
    }
}

fn outcome(
    reaction: &Reaction,
    succeeded: bool,
    skipped: bool,
    message: impl Into<String>,
) -> ReactionResult {
    ReactionResult {
        succeeded,
        skipped,
        output: String::new(),
        logs: String::new(),
        message: message.into(),
        reaction: reaction.clone(),
    }
}

fn skipped(reaction: &Reaction, message: &str) -> ReactionResult {
    outcome(reaction, true, true, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::testing::{ScriptedExecutor, StaticFetcher};
    use std::path::PathBuf;
    use std::sync::Arc;

    const DISK: &str = r#"
observations:
  root_fs:
    entity: disk
    query: usage
    instance: /
    expect: ok
implements:
  disk_usage:
    exe: sh
    script: usage-check
    observes:
      entity: disk
      query: usage
      args: [__obsv_instance__]
  clean_disk:
    exe: sh
    script: clean-disk
    reacts:
      args: [--mount, __obsv_instance__]
      corrects:
        entity: disk
        query: usage
        starts_from: [full]
        results_in: ok
reactions:
  fix_root:
    observation: root_fs
    action: correction
    condition:
      check: expected
      value: false
"#;

    fn ops(doc: &str) -> Operations {
        let mut ops = Operations::default();
        ops.load(doc.as_bytes()).unwrap();
        ops
    }

    fn engine(exec: Arc<ScriptedExecutor>) -> Engine {
        Engine::new(
            Box::new(exec),
            Box::new(StaticFetcher::new("/cache")),
            EngineConfig::new(PathBuf::from("/cache")),
        )
    }

    fn scripted(usage: &str) -> Arc<ScriptedExecutor> {
        Arc::new(
            ScriptedExecutor::default()
                .respond("usage-check", usage)
                .respond("clean-disk", "cleaned")
                .respond("notify", "sent"),
        )
    }

    fn with_reaction(action: &str, check: &str, value: &str) -> Operations {
        let mut ops = ops(DISK);
        ops.load(
            format!(
                "actions:\n  notify:\n    exe: sh\n    script: notify\nreactions:\n  extra:\n    observation: root_fs\n    action: {action}\n    condition: {{check: {check}, value: {value}}}\n"
            )
            .as_bytes(),
        )
        .unwrap();
        ops.reactions.remove("fix_root");
        ops
    }

    #[test]
    fn correction_runs_matching_implement() {
        let exec = scripted("full");
        let results = engine(exec.clone()).react(&ops(DISK));

        let fix = &results.reactions["fix_root"];
        assert!(fix.succeeded);
        assert!(!fix.skipped);
        assert_eq!(fix.output, "cleaned");
        assert_eq!(fix.message, "Successfully ran 'clean_disk'");

        let clean = exec.calls().into_iter().find(|c| c.script == "clean-disk").unwrap();
        assert_eq!(clean.args, vec!["--mount", "/"]);
    }

    #[test]
    fn correction_skips_when_already_expected() {
        let exec = scripted("ok");
        let results = engine(exec.clone()).react(&ops(DISK));

        let fix = &results.reactions["fix_root"];
        assert!(fix.succeeded);
        assert!(fix.skipped);
        assert_eq!(fix.message, EXPECTED_SKIP);
        assert!(exec.calls().iter().all(|c| c.script != "clean-disk"));
    }

    #[test]
    fn correction_without_candidate_fails() {
        let results = engine(scripted("degraded")).react(&ops(DISK));
        let fix = &results.reactions["fix_root"];
        assert!(!fix.succeeded);
        assert!(fix.skipped);
        assert!(fix.message.contains("with result degraded"));
        assert!(fix.message.contains("expected result ok"));
    }

    #[test]
    fn failed_observation_is_not_reacted_to() {
        let exec = Arc::new(ScriptedExecutor::default().fail("usage-check", 1, "boom"));
        let results = engine(exec).react(&ops(DISK));
        let fix = &results.reactions["fix_root"];
        assert!(!fix.succeeded);
        assert!(fix.skipped);
        assert_eq!(fix.message, "Cannot react, error running observation");
        assert_eq!(fix.logs, "boom");
    }

    #[test]
    fn unknown_observation_is_skipped() {
        let mut ops = ops(DISK);
        ops.load(b"reactions:\n  ghost:\n    observation: nope\n    action: correction\n    condition: {check: expected, value: false}\n")
            .unwrap();
        let results = engine(scripted("full")).react(&ops);
        let ghost = &results.reactions["ghost"];
        assert!(!ghost.succeeded);
        assert!(ghost.skipped);
        assert_eq!(ghost.message, "Cannot react, 'nope' observation not found");
    }

    #[test]
    fn expected_false_runs_on_unexpected_result() {
        let results = engine(scripted("full")).react(&with_reaction("notify", "expected", "false"));
        let extra = &results.reactions["extra"];
        assert!(!extra.skipped);
        assert_eq!(extra.output, "sent");
    }

    #[test]
    fn expected_false_skips_on_expected_result() {
        let results = engine(scripted("ok")).react(&with_reaction("notify", "expected", "false"));
        let extra = &results.reactions["extra"];
        assert!(extra.skipped);
        assert_eq!(extra.message, EXPECTED_SKIP);
    }

    #[test]
    fn expected_true_skip_says_not_expected() {
        let results = engine(scripted("full")).react(&with_reaction("notify", "expected", "true"));
        assert_eq!(results.reactions["extra"].message, NOT_EXPECTED_SKIP);
    }

    #[test]
    fn matches_compares_raw_output() {
        let results = engine(scripted("full")).react(&with_reaction("notify", "matches", "full"));
        assert!(!results.reactions["extra"].skipped);

        let results = engine(scripted("ok")).react(&with_reaction("notify", "matches", "full"));
        assert_eq!(results.reactions["extra"].message, NO_MATCH_SKIP);
    }

    #[test]
    fn unknown_check_fails_without_skipping() {
        let results = engine(scripted("full")).react(&with_reaction("notify", "above", "3"));
        let extra = &results.reactions["extra"];
        assert!(!extra.succeeded);
        assert!(!extra.skipped);
        assert_eq!(extra.message, "Error checking condition, unknown Check type 'above'");
    }

    #[test]
    fn implement_name_falls_back_with_resolved_args() {
        let exec = scripted("full");
        let results = engine(exec.clone()).react(&with_reaction("clean_disk", "matches", "full"));
        assert_eq!(results.reactions["extra"].message, "Successfully ran 'clean_disk'");
        let clean = exec.calls().into_iter().find(|c| c.script == "clean-disk").unwrap();
        assert_eq!(clean.args, vec!["--mount", "/"]);
    }

    #[test]
    fn named_action_args_are_verbatim() {
        let exec = scripted("full");
        let mut ops = with_reaction("notify", "matches", "full");
        ops.actions.get_mut("notify").unwrap().args = vec!["__obsv_instance__".into()];
        engine(exec.clone()).react(&ops);
        let notify = exec.calls().into_iter().find(|c| c.script == "notify").unwrap();
        assert_eq!(notify.args, vec!["__obsv_instance__"]);
    }

    #[test]
    fn missing_action_fails() {
        let results = engine(scripted("full")).react(&with_reaction("page_oncall", "matches", "full"));
        let extra = &results.reactions["extra"];
        assert!(!extra.succeeded);
        assert_eq!(extra.message, "Could not react, 'page_oncall' action not found");
    }

    #[test]
    fn correction_downloads_sourced_implement() {
        let exec = Arc::new(
            ScriptedExecutor::default()
                .respond("usage-check", "full")
                .respond("/cache/clean.sh", "cleaned"),
        );
        let fetcher = Arc::new(StaticFetcher::new("/cache"));
        let e = Engine::new(
            Box::new(exec.clone()),
            Box::new(fetcher.clone()),
            EngineConfig::new(PathBuf::from("/cache")),
        );
        let mut ops = ops(DISK);
        let clean = ops.implements.get_mut("clean_disk").unwrap();
        clean.script.clear();
        clean.source_file = "clean.sh".into();
        clean.source_url = "https://example.com/clean.sh".into();

        let results = e.react(&ops);

        assert_eq!(fetcher.fetched(), vec!["https://example.com/clean.sh"]);
        assert_eq!(results.reactions["fix_root"].output, "cleaned");
    }

    #[test]
    fn correction_download_failure_is_not_skipped() {
        let e = Engine::new(
            Box::new(scripted("full")),
            Box::new(StaticFetcher::broken()),
            EngineConfig::new(PathBuf::from("/cache")),
        );
        let mut ops = ops(DISK);
        let clean = ops.implements.get_mut("clean_disk").unwrap();
        clean.source_file = "clean.sh".into();
        clean.source_url = "https://example.com/clean.sh".into();

        let results = e.react(&ops);
        let fix = &results.reactions["fix_root"];
        assert!(!fix.succeeded);
        assert!(!fix.skipped);
        assert!(fix.logs.contains("connection refused"));
    }

    #[test]
    fn report_carries_observation_counters() {
        let results = engine(scripted("full")).react(&ops(DISK));
        assert_eq!(results.total_observations, 1);
        assert_eq!(results.unexpected_observations, 1);
        assert_eq!(results.total_reactions, 1);
        assert_eq!(results.failed_reactions, 0);
        assert_eq!(results.skipped_reactions, 0);
        assert_eq!(results.observations["root_fs"].result, "full");
    }
}
