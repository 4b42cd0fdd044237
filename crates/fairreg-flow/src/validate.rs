use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;
use crate::registry::StepRegistry;
use crate::session::{RegistrationSession, StepData};
use crate::spec::predicate::contains;
use crate::spec::step::{FieldName, StepConfig, base_name, is_collection_field};

const PASSWORD_FIELD: &str = "password";
const PASSWORD_MIN_LEN: usize = 10;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));
static NUMERIC_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(_number|qty|quantity)").expect("numeric pattern compiles"));

/// Outcome of validating one step's answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Human-readable messages, possibly several per field.
    pub errors: Vec<String>,
    /// Offending field identifiers, each listed once.
    pub fields: Vec<FieldName>,
}

impl ValidationResult {
    fn from_failures(errors: Vec<String>, fields: Vec<FieldName>) -> Self {
        Self {
            is_valid: fields.is_empty(),
            errors,
            fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    Password,
    PasswordConfirmation,
    Email,
    Numeric,
    Generic,
}

impl FieldClass {
    fn of(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower == PASSWORD_FIELD {
            FieldClass::Password
        } else if lower.contains(PASSWORD_FIELD) && lower.contains("confirm") {
            FieldClass::PasswordConfirmation
        } else if lower.contains("email") {
            FieldClass::Email
        } else if NUMERIC_FIELD.is_match(name) {
            FieldClass::Numeric
        } else {
            FieldClass::Generic
        }
    }
}

/// Validates `data` for the step registered under `key`.
pub fn validate_step(
    registry: &StepRegistry,
    key: &str,
    data: &StepData,
    session: &RegistrationSession,
) -> Result<ValidationResult, RegistryError> {
    let config = registry.get(key)?;
    Ok(validate_config(config, data, session))
}

/// Validates `data` against `config`; conditional requirements consult the whole session.
pub fn validate_config(
    config: &StepConfig,
    data: &StepData,
    session: &RegistrationSession,
) -> ValidationResult {
    let required = required_fields(config, data, session);

    let mut errors = Vec::new();
    let mut fields = Vec::new();

    for field in &required {
        let messages = check_field(field, data, session);
        if !messages.is_empty() {
            errors.extend(messages);
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }

    ValidationResult::from_failures(errors, fields)
}

/// Static requirements plus every conditional requirement currently active.
pub fn required_fields(
    config: &StepConfig,
    data: &StepData,
    session: &RegistrationSession,
) -> Vec<FieldName> {
    let mut required = config.required.clone();
    for rule in &config.required_if {
        let Some(value) = find_field(&rule.when.field, data, session) else {
            continue;
        };
        let triggered = rule
            .when
            .values
            .iter()
            .any(|expected| contains(value, expected));
        if triggered {
            for field in &rule.fields {
                if !required.contains(field) {
                    required.push(field.clone());
                }
            }
        }
    }
    required
}

fn find_field<'a>(
    field: &str,
    data: &'a StepData,
    session: &'a RegistrationSession,
) -> Option<&'a Value> {
    data.get(field)
        .filter(|value| !value.is_null())
        .or_else(|| session.find_field(field))
}

fn check_field(field: &str, data: &StepData, session: &RegistrationSession) -> Vec<String> {
    let name = base_name(field);
    let label = humanize(name);
    let value = data.get(name);

    if is_collection_field(field) {
        let selected = value
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty());
        return if selected {
            Vec::new()
        } else {
            vec![format!("{label} requires at least one selection")]
        };
    }

    let present = value.filter(|value| !is_empty(value));
    let Some(value) = present else {
        return vec![format!("{label} is required")];
    };

    match FieldClass::of(name) {
        FieldClass::Password => password_messages(&display(value)),
        FieldClass::PasswordConfirmation => {
            let password = data
                .get(PASSWORD_FIELD)
                .or_else(|| session.find_field(PASSWORD_FIELD))
                .map(display)
                .unwrap_or_default();
            if display(value) == password {
                Vec::new()
            } else {
                vec!["Passwords do not match".to_string()]
            }
        }
        FieldClass::Email => {
            if EMAIL_PATTERN.is_match(display(value).trim()) {
                Vec::new()
            } else {
                vec![format!("{label} must be a valid email address")]
            }
        }
        FieldClass::Numeric => {
            if is_numeric(value) {
                Vec::new()
            } else {
                vec![format!("{label} must be a number")]
            }
        }
        FieldClass::Generic => Vec::new(),
    }
}

fn password_messages(password: &str) -> Vec<String> {
    let mut messages = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        messages.push(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        messages.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        messages.push("Password must contain a number".to_string());
    }
    messages
}

/// Missing, blank, an empty collection or an unticked checkbox.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Number(_) | Value::Object(_) => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `annualProductionLiters` -> `Annual Production Liters`.
pub fn humanize(field: &str) -> String {
    let mut label = String::with_capacity(field.len() + 4);
    for (index, ch) in field.chars().enumerate() {
        if ch == '_' {
            label.push(' ');
        } else if ch.is_uppercase() && index > 0 && !label.ends_with(' ') {
            label.push(' ');
            label.push(ch);
        } else if index == 0 {
            label.extend(ch.to_uppercase());
        } else {
            label.push(ch);
        }
    }
    label
}
