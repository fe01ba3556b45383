//! Operation data model: observations, actions, reactions and implements.
//!
//! Every kind implements [`Operation`], which gives the registry the two things it
//! needs during a merge: a required-field check and the set of conflict keys the
//! entity occupies. Conflict keys are tagged by variant, so an observation can
//! never collide with an implement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Identity an entity claims inside one merged aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictKey {
    Observation {
        entity: String,
        query: String,
        instance: String,
    },
    ImplementCorrects {
        entity: String,
        query: String,
        starts_from: Vec<String>,
        results_in: String,
    },
    ImplementObserves {
        entity: String,
        query: String,
    },
}

pub trait Operation: Clone {
    /// Display name of the kind, used in error messages.
    const KIND: &'static str;

    /// Conflict keys for this entity. Most kinds return none.
    fn conflict_keys(&self) -> Vec<ConflictKey> {
        Vec::new()
    }

    /// Check required fields, returning the reason on failure.
    fn validate(&self) -> std::result::Result<(), String>;

    /// Whether sharing a conflict key with `other` is an actual conflict.
    fn conflicts_with(&self, _other: &Self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Observation {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub instance: String,
    /// Desired result. Empty means "just measure".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expect: String,
}

impl Operation for Observation {
    const KIND: &'static str = "Observation";

    /// Only observations that expect something can conflict.
    fn conflict_keys(&self) -> Vec<ConflictKey> {
        if self.expect.is_empty() {
            return Vec::new();
        }
        vec![ConflictKey::Observation {
            entity: self.entity.clone(),
            query: self.query.clone(),
            instance: self.instance.clone(),
        }]
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.entity.is_empty() {
            Err("missing entity".into())
        } else if self.query.is_empty() {
            Err("missing query".into())
        } else if self.instance.is_empty() {
            Err("missing instance".into())
        } else {
            Ok(())
        }
    }

    /// Identical repeats are fine; two different expectations are not.
    fn conflicts_with(&self, other: &Self) -> bool {
        self.expect != other.expect
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exe: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Operation for Action {
    const KIND: &'static str = "Action";

    fn validate(&self) -> std::result::Result<(), String> {
        if self.exe.is_empty() {
            return Err("missing exe".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// Literal action name that asks the engine to pick a correcting implement.
pub const CORRECTION_ACTION: &str = "correction";

/// A scalar condition value as written in the spec document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ConditionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConditionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConditionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    #[serde(default)]
    pub check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reaction {
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub condition: Condition,
}

impl Reaction {
    pub fn is_correction(&self) -> bool {
        self.action == CORRECTION_ACTION
    }
}

impl Operation for Reaction {
    const KIND: &'static str = "Reaction";

    fn validate(&self) -> std::result::Result<(), String> {
        if self.observation.is_empty() {
            return Err("missing observation".into());
        }
        if self.action.is_empty() {
            return Err("missing action".into());
        }
        if self.condition.check.is_empty() {
            return Err("missing condition check".into());
        }
        match &self.condition.value {
            None => Err("missing condition value".into()),
            Some(ConditionValue::Text(s)) if s.is_empty() => Err("missing condition value".into()),
            Some(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Implement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Correction {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub starts_from: Vec<String>,
    #[serde(default)]
    pub results_in: String,
}

impl Correction {
    fn is_complete(&self) -> bool {
        !self.entity.is_empty()
            && !self.query.is_empty()
            && !self.starts_from.is_empty()
            && !self.results_in.is_empty()
    }

    /// Whether this correction moves `entity`/`query` from `observed` to `expected`.
    pub fn corrects(&self, entity: &str, query: &str, observed: &str, expected: &str) -> bool {
        self.entity == entity
            && self.query == query
            && self.results_in == expected
            && self.starts_from.iter().any(|s| s == observed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionImplement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrects: Option<Correction>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationImplement {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Implement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exe: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reacts: Option<ReactionImplement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observes: Option<ObservationImplement>,
}

impl Implement {
    /// The observation this implement answers, if it names both entity and query.
    pub fn observing(&self) -> Option<&ObservationImplement> {
        self.observes
            .as_ref()
            .filter(|o| !o.entity.is_empty() && !o.query.is_empty())
    }

    /// The complete correction this implement performs, if any.
    pub fn correcting(&self) -> Option<&Correction> {
        self.reacts
            .as_ref()
            .and_then(|r| r.corrects.as_ref())
            .filter(|c| c.is_complete())
    }

    pub fn observes_query(&self, entity: &str, query: &str) -> bool {
        self.observing()
            .is_some_and(|o| o.entity == entity && o.query == query)
    }

    pub fn has_source(&self) -> bool {
        !self.source_file.is_empty() && !self.source_url.is_empty()
    }

    /// Action form of the implement's reaction half, with unresolved args.
    pub fn reaction_action(&self) -> Action {
        Action {
            path: self.path.clone(),
            script: self.script.clone(),
            exe: self.exe.clone(),
            args: self
                .reacts
                .as_ref()
                .map(|r| r.args.clone())
                .unwrap_or_default(),
        }
    }
}

impl Operation for Implement {
    const KIND: &'static str = "Implement";

    fn conflict_keys(&self) -> Vec<ConflictKey> {
        let mut keys = Vec::new();
        if let Some(c) = self.correcting() {
            let mut starts_from = c.starts_from.clone();
            starts_from.sort();
            keys.push(ConflictKey::ImplementCorrects {
                entity: c.entity.clone(),
                query: c.query.clone(),
                starts_from,
                results_in: c.results_in.clone(),
            });
        }
        if let Some(o) = self.observing() {
            keys.push(ConflictKey::ImplementObserves {
                entity: o.entity.clone(),
                query: o.query.clone(),
            });
        }
        keys
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.source_file.is_empty() != self.source_url.is_empty() {
            return Err("source_file and source_url must be given together".into());
        }
        if !self.has_source() && self.path.is_empty() && self.script.is_empty() {
            return Err("missing at least one of: path, script, source_file/url".into());
        }
        // A downloaded source file stands in for a missing exe
        if self.exe.is_empty() && !self.has_source() {
            return Err("exe can only be empty with valid source_file/url".into());
        }
        if self.source_file.contains(['/', '\\']) || self.source_file == ".." {
            return Err(format!(
                "source_file '{}' must be a plain file name",
                self.source_file
            ));
        }
        if self.reacts.is_none() && self.observing().is_none() {
            return Err("missing at least one of reacts, observes".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Aggregate of every named entity from one or more spec documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Operations {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observations: BTreeMap<String, Observation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, Action>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, Reaction>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub implements: BTreeMap<String, Implement>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResult {
    pub succeeded: bool,
    pub result: String,
    pub expected: bool,
    pub logs: String,
    pub observation: Observation,
}

impl ObservationResult {
    pub fn failed(observation: &Observation, result: impl Into<String>, logs: impl Into<String>) -> Self {
        ObservationResult {
            succeeded: false,
            result: result.into(),
            expected: false,
            logs: logs.into(),
            observation: observation.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationResults {
    pub observations: BTreeMap<String, ObservationResult>,
    pub total_observations: usize,
    pub failed_observations: usize,
    pub unexpected_observations: usize,
}

impl ObservationResults {
    pub fn record(&mut self, name: String, result: ObservationResult) {
        self.total_observations += 1;
        if !result.succeeded {
            self.failed_observations += 1;
        }
        if !result.expected {
            self.unexpected_observations += 1;
        }
        self.observations.insert(name, result);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub succeeded: bool,
    pub output: String,
    pub logs: String,
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResults {
    pub actions: BTreeMap<String, ActionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionResult {
    pub succeeded: bool,
    pub skipped: bool,
    pub output: String,
    pub logs: String,
    pub message: String,
    pub reaction: Reaction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionResults {
    pub reactions: BTreeMap<String, ReactionResult>,
    pub observations: BTreeMap<String, ObservationResult>,
    pub total_observations: usize,
    pub failed_observations: usize,
    pub unexpected_observations: usize,
    pub total_reactions: usize,
    pub failed_reactions: usize,
    pub skipped_reactions: usize,
}

impl ReactionResults {
    /// Start a reaction report carrying the observation pass forward unchanged.
    pub fn from_observations(observed: ObservationResults) -> Self {
        ReactionResults {
            reactions: BTreeMap::new(),
            observations: observed.observations,
            total_observations: observed.total_observations,
            failed_observations: observed.failed_observations,
            unexpected_observations: observed.unexpected_observations,
            total_reactions: 0,
            failed_reactions: 0,
            skipped_reactions: 0,
        }
    }

    pub fn record(&mut self, name: String, result: ReactionResult) {
        self.total_reactions += 1;
        if !result.succeeded {
            self.failed_reactions += 1;
        }
        if result.skipped {
            self.skipped_reactions += 1;
        }
        self.reactions.insert(name, result);
    }
}
