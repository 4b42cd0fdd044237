use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::predicate::Predicate;

/// Opaque step identifier (`"1"`, `"wv-ex-step-3"`, `"final"`).
pub type StepKey = String;

/// Field identifier; a `[]` suffix marks a collection that must be non-empty.
pub type FieldName = String;

/// Key of the step every registration starts from.
pub const START_STEP: &str = "1";

/// Outgoing edges of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transitions {
    /// Unconditional successor.
    Next(StepKey),
    /// Ordered rules, first match wins.
    Rules(Vec<TransitionRule>),
    /// Last step before submission.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransitionRule {
    pub when: Predicate,
    pub next: StepKey,
}

/// Activation condition of a conditional requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trigger {
    pub field: FieldName,
    #[serde(rename = "in")]
    pub values: Vec<Value>,
}

/// Extra required fields activated by a value anywhere in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequiredIf {
    pub when: Trigger,
    pub fields: Vec<FieldName>,
}

/// Declarative definition of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepConfig {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_field: Option<FieldName>,
    pub transitions: Transitions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<FieldName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_if: Vec<RequiredIf>,
    /// Choices offered by the UI; validation does not enforce them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<FieldName, Vec<String>>,
}

impl StepConfig {
    pub fn is_terminal(&self) -> bool {
        matches!(self.transitions, Transitions::Terminal)
    }

    /// Every successor named by this step, in declaration order.
    pub fn successors(&self) -> Vec<&str> {
        match &self.transitions {
            Transitions::Next(next) => vec![next.as_str()],
            Transitions::Rules(rules) => rules.iter().map(|rule| rule.next.as_str()).collect(),
            Transitions::Terminal => Vec::new(),
        }
    }

    /// Base names of every field this step mentions.
    pub fn declared_fields(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.required_if.iter().flat_map(|rule| rule.fields.iter()))
            .map(|field| base_name(field))
            .chain(self.condition_field.as_deref())
            .chain(self.options.keys().map(String::as_str))
    }
}

/// Strips the `[]` collection marker.
pub fn base_name(field: &str) -> &str {
    field.strip_suffix("[]").unwrap_or(field)
}

pub fn is_collection_field(field: &str) -> bool {
    field.ends_with("[]")
}
