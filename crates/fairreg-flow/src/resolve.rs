use serde_json::Value;

use crate::registry::StepRegistry;
use crate::session::RegistrationSession;
use crate::spec::predicate::{Predicate, contains};
use crate::spec::step::{StepConfig, StepKey, Transitions};

/// Resolves the successor of `current` under the answers stored in `session`.
///
/// Rules are tried in declaration order and the first match wins; a `default`
/// rule is only taken once every other rule failed. `None` means the step is
/// terminal, unknown, or no rule matched.
pub fn resolve_next(
    registry: &StepRegistry,
    current: &str,
    session: &RegistrationSession,
) -> Option<StepKey> {
    let Ok(config) = registry.get(current) else {
        tracing::error!(step = current, "cannot resolve transition from unknown step");
        return None;
    };

    let rules = match &config.transitions {
        Transitions::Next(next) => return Some(next.clone()),
        Transitions::Terminal => return None,
        Transitions::Rules(rules) => rules,
    };

    let current_value = condition_value(config, current, session);
    let mut fallback = None;

    for rule in rules {
        let matched = match &rule.when {
            Predicate::Default => {
                fallback.get_or_insert(&rule.next);
                false
            }
            Predicate::Prev { step, value } => registry
                .get(step)
                .ok()
                .and_then(|other| condition_value(other, step, session))
                .is_some_and(|answer| contains(answer, value)),
            predicate => predicate.matches_current(current_value),
        };
        if matched {
            tracing::debug!(step = current, next = %rule.next, "transition matched");
            return Some(rule.next.clone());
        }
    }

    if let Some(next) = fallback {
        tracing::debug!(step = current, next = %next, "falling back to default transition");
    }
    fallback.cloned()
}

/// Value of the step's condition field within its own stored record.
fn condition_value<'a>(
    config: &StepConfig,
    step: &str,
    session: &'a RegistrationSession,
) -> Option<&'a Value> {
    let field = config.condition_field.as_deref()?;
    session
        .get(step)
        .and_then(|data| data.get(field))
        .filter(|value| !value.is_null())
}
