//! Parsing and conflict-checked merging of spec documents.
//!
//! A merge folds one parsed document into the aggregate in the order
//! observations, reactions, actions, implements. The fold runs against a staged
//! copy and only replaces the aggregate once every entity has been accepted, so a
//! failed merge leaves the aggregate exactly as it was.

use std::collections::{BTreeMap, HashMap};

use crate::error::{LookoutError, Result};
use crate::operation::{
    Action, ConflictKey, Implement, Observation, ObservationResult, Operation, Operations,
};

type Conflicts = HashMap<ConflictKey, String>;

impl Operations {
    /// Strictly parse one spec document. Unknown fields are rejected.
    pub fn parse(raw: &[u8]) -> Result<Operations> {
        // A blank stream holds no YAML document at all, not even an empty one
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Operations::default());
        }
        serde_yaml::from_slice(raw).map_err(|e| LookoutError::Parse(e.to_string()))
    }

    /// Parse `raw` and merge it into `self`.
    pub fn load(&mut self, raw: &[u8]) -> Result<()> {
        let partial = Operations::parse(raw)?;
        self.merge(partial)
    }

    /// Merge `partial` into `self`.
    ///
    /// Same-named entries replace existing ones. Conflicts are checked against
    /// everything the aggregate will hold afterwards, so re-merging identical
    /// content is a no-op. Nothing is applied unless the whole merge succeeds.
    pub fn merge(&mut self, partial: Operations) -> Result<()> {
        let mut staged = self.clone();
        let mut conflicts = Conflicts::new();

        seed(&self.observations, &partial.observations, &mut conflicts);
        seed(&self.reactions, &partial.reactions, &mut conflicts);
        seed(&self.actions, &partial.actions, &mut conflicts);
        seed(&self.implements, &partial.implements, &mut conflicts);

        fold(&mut staged.observations, partial.observations, &mut conflicts)?;
        fold(&mut staged.reactions, partial.reactions, &mut conflicts)?;
        fold(&mut staged.actions, partial.actions, &mut conflicts)?;
        fold(&mut staged.implements, partial.implements, &mut conflicts)?;

        *self = staged;
        Ok(())
    }

    pub fn observation(&self, name: &str) -> Option<&Observation> {
        self.observations.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn implement(&self, name: &str) -> Option<&Implement> {
        self.implements.get(name)
    }

    /// First implement, by name, that corrects `observation` from its observed
    /// result to its expected one.
    pub fn implement_correcting(
        &self,
        observation: &Observation,
        result: &ObservationResult,
    ) -> Option<(&str, &Implement)> {
        self.implements
            .iter()
            .find(|(_, imp)| {
                imp.correcting().is_some_and(|c| {
                    c.corrects(
                        &observation.entity,
                        &observation.query,
                        &result.result,
                        &observation.expect,
                    )
                })
            })
            .map(|(name, imp)| (name.as_str(), imp))
    }
}

/// First implement, by name, that answers `entity`/`query`.
pub fn find_observing<'a>(
    implements: &'a BTreeMap<String, Implement>,
    entity: &str,
    query: &str,
) -> Option<(&'a str, &'a Implement)> {
    implements
        .iter()
        .find(|(_, imp)| imp.observes_query(entity, query))
        .map(|(name, imp)| (name.as_str(), imp))
}

/// Register the keys of entities that survive the merge untouched.
fn seed<T: Operation>(
    existing: &BTreeMap<String, T>,
    incoming: &BTreeMap<String, T>,
    conflicts: &mut Conflicts,
) {
    for (name, item) in existing {
        if incoming.contains_key(name) {
            continue;
        }
        for key in item.conflict_keys() {
            conflicts.entry(key).or_insert_with(|| name.clone());
        }
    }
}

fn fold<T: Operation>(
    staged: &mut BTreeMap<String, T>,
    incoming: BTreeMap<String, T>,
    conflicts: &mut Conflicts,
) -> Result<()> {
    for (name, item) in incoming {
        item.validate().map_err(|reason| LookoutError::Invalid {
            kind: T::KIND,
            name: name.clone(),
            reason,
        })?;
        for key in item.conflict_keys() {
            match conflicts.get(&key) {
                Some(owner) if *owner != name => {
                    let clash = staged
                        .get(owner)
                        .map_or(true, |existing| item.conflicts_with(existing));
                    if clash {
                        return Err(LookoutError::Conflict {
                            kind: T::KIND,
                            name,
                            other: owner.clone(),
                        });
                    }
                }
                Some(_) => {}
                None => {
                    conflicts.insert(key, name.clone());
                }
            }
        }
        tracing::trace!(kind = T::KIND, name = %name, "merged");
        staged.insert(name, item);
    }
    Ok(())
}
