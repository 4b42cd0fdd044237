use std::collections::BTreeMap;
use std::fmt::Write;

use fairreg_flow::{
    FlowProgress, Predicate, RegistrationPayload, RegistrationSession, RegistrySpec, StepConfig,
    StepKey, Transitions, ValidationResult, humanize,
};
use serde_json::Value;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step titles and prompts only.
    Clean,
    /// Verbose output: step keys, navigation flags, remaining steps.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints steps, prompts and outcomes while the flow controller drives the session.
pub struct WizardPresenter {
    verbosity: Verbosity,
    show_session_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_session_json: bool) -> Self {
        Self {
            verbosity,
            show_session_json,
        }
    }

    pub fn show_header(&self, spec: &RegistrySpec) {
        println!("Registration: {}", spec.title);
        if self.verbosity.is_verbose() {
            println!("Registry: {} v{}", spec.id, spec.version);
        }
        println!("Type :back to return to the previous step, exit to abort.");
    }

    pub fn show_step(&self, progress: &FlowProgress) {
        println!();
        println!("[{}] {}", progress.visited + 1, progress.title);
        if self.verbosity.is_verbose() {
            let remaining = progress
                .remaining_steps
                .map(|steps| steps.to_string())
                .unwrap_or_else(|| "?".into());
            println!(
                "Step: {} (remaining: {}, back: {}, invited: {})",
                progress.current_step,
                remaining,
                yes_no(progress.can_go_back),
                yes_no(progress.invited)
            );
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = prompt.label.clone();
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = prompt.kind.hint() {
            line.push(' ');
            line.push_str(&hint);
        }
        if let Some(initial) = &prompt.initial {
            line.push_str(&format!(" [{}]", value_to_display(initial)));
        }
        println!("{}", line);
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_notice(&self, message: &str) {
        println!("{}", message);
    }

    pub fn show_validation(&self, result: &ValidationResult) {
        eprintln!("Please fix the following:");
        for error in &result.errors {
            eprintln!("  - {}", error);
        }
    }

    pub fn show_failures(&self, failures: &BTreeMap<StepKey, ValidationResult>) {
        eprintln!("Registration could not be submitted:");
        for (step, result) in failures {
            eprintln!("  {}: {}", step, result.errors.join("; "));
        }
    }

    pub fn show_completion(&self, payload: &RegistrationPayload, session: &RegistrationSession) {
        println!("Registration complete ✅");
        match serde_json::to_string_pretty(payload) {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize registration payload: {}", err),
        }
        match session.to_cbor() {
            Ok(bytes) => println!("Session (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize session to CBOR: {}", err),
        }
        if self.show_session_json {
            match serde_json::to_string_pretty(session) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize session to JSON: {}", err),
            }
        }
    }
}

/// How a field's raw answer is parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Choice(Vec<String>),
    MultiChoice(Vec<String>),
    List,
}

impl FieldKind {
    /// Infers the input kind from the step's options, collection markers and on/off rules.
    pub fn for_field(config: &StepConfig, field: &str) -> Self {
        let (name, collection) = match field.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (field, false),
        };
        let choices = config.options.get(name).cloned();
        match (collection, choices) {
            (true, Some(choices)) => FieldKind::MultiChoice(choices),
            (true, None) => FieldKind::List,
            (false, Some(choices)) => FieldKind::Choice(choices),
            (false, None) if is_checkbox(config, name) => FieldKind::Checkbox,
            (false, None) => FieldKind::Text,
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            FieldKind::Checkbox => Some("(yes/no)".to_string()),
            FieldKind::Choice(choices) => Some(format!("({})", choices.join("/"))),
            FieldKind::MultiChoice(choices) => {
                Some(format!("(comma-separated: {})", choices.join(", ")))
            }
            FieldKind::List => Some("(comma-separated)".to_string()),
            FieldKind::Text => None,
        }
    }
}

/// On/off condition fields and `accept*` consent fields take yes/no answers.
fn is_checkbox(config: &StepConfig, field: &str) -> bool {
    let switches_on_value = config.condition_field.as_deref() == Some(field)
        && matches!(&config.transitions, Transitions::Rules(rules)
            if rules.iter().any(|rule| matches!(rule.when, Predicate::On | Predicate::Off)));
    switches_on_value || field.starts_with("accept")
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub field: String,
    pub label: String,
    pub required: bool,
    pub kind: FieldKind,
    pub initial: Option<Value>,
}

impl PromptContext {
    pub fn new(config: &StepConfig, field: &str, required: bool, initial: Option<Value>) -> Self {
        let name = field.strip_suffix("[]").unwrap_or(field);
        Self {
            field: name.to_string(),
            label: humanize(name),
            required,
            kind: FieldKind::for_field(config, field),
            initial,
        }
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Parses a raw line; blank input keeps the initial value (or leaves the field empty).
pub fn parse_answer(prompt: &PromptContext, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(prompt.initial.clone().unwrap_or(Value::Null));
    }

    match &prompt.kind {
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Checkbox => parse_boolean(raw),
        FieldKind::Choice(choices) => parse_choice(choices, raw).map(Value::String),
        FieldKind::MultiChoice(choices) => split_list(raw)
            .map(|item| parse_choice(choices, item).map(Value::String))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldKind::List => Ok(Value::Array(
            split_list(raw).map(|item| Value::String(item.into())).collect(),
        )),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_choice(choices: &[String], raw: &str) -> Result<String, AnswerParseError> {
    choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("Choose one of: {}.", choices.join(", ")),
                Some(format!("allowed values: {}", choices.join(", "))),
            )
        })
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{:02x}", byte).expect("writing to string cannot fail");
    }
    encoded
}
