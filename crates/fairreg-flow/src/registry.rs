use std::collections::{BTreeSet, VecDeque};

use crate::error::RegistryError;
use crate::spec::invitation::InvitationPlan;
use crate::spec::predicate::Predicate;
use crate::spec::registry::RegistrySpec;
use crate::spec::step::{START_STEP, StepConfig, Transitions};

const TRADE_FAIR_REGISTRY: &str = include_str!("../registry/trade_fair.json");

/// Validated, immutable table of every step in a registration flow.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    spec: RegistrySpec,
}

impl StepRegistry {
    /// The trade-fair flow shipped with the crate.
    pub fn trade_fair() -> Result<Self, RegistryError> {
        Self::from_json(TRADE_FAIR_REGISTRY)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let spec: RegistrySpec = serde_json::from_str(json).map_err(RegistryError::Parse)?;
        Self::from_spec(spec)
    }

    /// Checks every reference in the table; any dangling one is fatal.
    pub fn from_spec(spec: RegistrySpec) -> Result<Self, RegistryError> {
        check_references(&spec)?;
        let registry = Self { spec };
        for step in registry.unreachable_steps() {
            tracing::warn!(registry = %registry.spec.id, %step, "step is unreachable from the start step");
        }
        tracing::info!(
            registry = %registry.spec.id,
            version = %registry.spec.version,
            steps = registry.spec.steps.len(),
            "step registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Result<&StepConfig, RegistryError> {
        self.spec
            .steps
            .get(key)
            .ok_or_else(|| RegistryError::UnknownStep(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.spec.steps.contains_key(key)
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &StepConfig)> {
        self.spec
            .steps
            .iter()
            .map(|(key, config)| (key.as_str(), config))
    }

    pub fn invitation(&self) -> Option<&InvitationPlan> {
        self.spec.invitation.as_ref()
    }

    pub fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    /// Fewest transitions from `key` to a terminal step, ignoring restarts.
    pub fn remaining_steps(&self, key: &str) -> Option<usize> {
        let mut seen = BTreeSet::from([key]);
        let mut queue = VecDeque::from([(key, 0usize)]);
        while let Some((current, distance)) = queue.pop_front() {
            let config = self.spec.steps.get(current)?;
            if config.is_terminal() {
                return Some(distance);
            }
            for next in config.successors() {
                if next != START_STEP && seen.insert(next) {
                    queue.push_back((next, distance + 1));
                }
            }
        }
        None
    }

    fn unreachable_steps(&self) -> Vec<&str> {
        let mut seen = BTreeSet::from([START_STEP]);
        let mut stack = vec![START_STEP];
        while let Some(current) = stack.pop() {
            if let Some(config) = self.spec.steps.get(current) {
                for next in config.successors() {
                    if seen.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        self.spec
            .steps
            .keys()
            .map(String::as_str)
            .filter(|key| !seen.contains(key))
            .collect()
    }
}

fn check_references(spec: &RegistrySpec) -> Result<(), RegistryError> {
    if !spec.steps.contains_key(START_STEP) {
        return Err(RegistryError::MissingStart(START_STEP.to_string()));
    }
    if !spec.steps.values().any(StepConfig::is_terminal) {
        return Err(RegistryError::NoTerminalStep);
    }

    let declared: BTreeSet<&str> = spec
        .steps
        .values()
        .flat_map(|config| config.declared_fields())
        .collect();

    for (key, config) in &spec.steps {
        for target in config.successors() {
            if !spec.steps.contains_key(target) {
                return Err(RegistryError::DanglingTransition {
                    step: key.clone(),
                    target: target.to_string(),
                });
            }
        }

        if let Transitions::Rules(rules) = &config.transitions {
            if rules.is_empty() {
                return Err(RegistryError::EmptyRules { step: key.clone() });
            }
            if rules.iter().filter(|rule| rule.when.is_default()).count() > 1 {
                return Err(RegistryError::DuplicateDefault { step: key.clone() });
            }
            for rule in rules {
                if rule.when.reads_current_value() && config.condition_field.is_none() {
                    return Err(RegistryError::MissingConditionField { step: key.clone() });
                }
                if let Predicate::Prev { step, .. } = &rule.when {
                    let resolvable = spec
                        .steps
                        .get(step)
                        .is_some_and(|other| other.condition_field.is_some());
                    if !resolvable {
                        return Err(RegistryError::DanglingPrev {
                            step: key.clone(),
                            target: step.clone(),
                        });
                    }
                }
            }
        }

        for rule in &config.required_if {
            if !declared.contains(rule.when.field.as_str()) {
                return Err(RegistryError::UnknownTriggerField {
                    step: key.clone(),
                    field: rule.when.field.clone(),
                });
            }
        }
    }

    if let Some(plan) = &spec.invitation {
        if plan.steps.first().is_none_or(|first| first.step != START_STEP) {
            return Err(RegistryError::InvitationStart(START_STEP.to_string()));
        }
        let targets = plan
            .steps
            .iter()
            .map(|prefill| &prefill.step)
            .chain(plan.email.iter().map(|email| &email.step));
        for step in targets {
            if !spec.steps.contains_key(step) {
                return Err(RegistryError::UnknownInvitationStep(step.clone()));
            }
        }
    }

    Ok(())
}
