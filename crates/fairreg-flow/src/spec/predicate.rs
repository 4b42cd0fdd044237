use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::step::StepKey;

/// Transition predicate evaluated against a step's condition value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches when another step's condition value equals (or contains) `value`.
    Prev { step: StepKey, value: Value },
    /// Matches when the current value contains `value`, or equals it when scalar.
    Includes { value: Value },
    On,
    Off,
    /// Matches a scalar current value exactly.
    Literal { value: Value },
    /// Fallback, only taken when nothing else in the list matched.
    Default,
}

impl Predicate {
    /// True for predicates that read the current step's condition value.
    pub fn reads_current_value(&self) -> bool {
        matches!(
            self,
            Predicate::Includes { .. } | Predicate::On | Predicate::Off | Predicate::Literal { .. }
        )
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Predicate::Default)
    }

    /// Evaluates every variant except `Prev` and `Default`, which need session context.
    pub(crate) fn matches_current(&self, current: Option<&Value>) -> bool {
        match self {
            Predicate::Includes { value } => current.is_some_and(|current| contains(current, value)),
            Predicate::On => current.is_some_and(is_truthy),
            Predicate::Off => !current.is_some_and(is_truthy),
            Predicate::Literal { value } => {
                current.is_some_and(|current| !current.is_array() && current == value)
            }
            Predicate::Prev { .. } | Predicate::Default => false,
        }
    }
}

/// Equality for scalars, membership for arrays.
pub(crate) fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| item == needle),
        other => other == needle,
    }
}

/// Checkbox-style truthiness.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().is_some_and(|num| num != 0.0),
        Value::String(text) => {
            let text = text.trim();
            !text.is_empty()
                && !["false", "0", "off", "no"]
                    .iter()
                    .any(|falsy| text.eq_ignore_ascii_case(falsy))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}
