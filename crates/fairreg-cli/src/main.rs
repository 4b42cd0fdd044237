mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use fairreg_component::{next as component_next, validate_step as component_validate};
use fairreg_flow::{
    Advance, FlowController, InvitationPayload, RegistrySpec, StepData, StepRegistry, Submission,
    required_fields,
};
use serde_json::{Value, json};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wizard::{PromptContext, Verbosity, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const REGISTRY_ENV: &str = "FAIRREG_REGISTRY";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Trade fair registration flow CLI",
    long_about = "Runs the registration wizard and exposes registry, validation and routing helpers backed by the flow component"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SchemaTarget {
    Registry,
    Invitation,
}

#[derive(Subcommand)]
enum Command {
    /// Load a step registry and report its shape.
    Check {
        /// Registry JSON (defaults to FAIRREG_REGISTRY or the built-in trade fair registry).
        #[arg(long, value_name = "REGISTRY")]
        registry: Option<PathBuf>,
        /// List every step with its successors.
        #[arg(long)]
        verbose: bool,
    },
    /// Walk through the registration flow in a text shell.
    Wizard {
        /// Registry JSON (defaults to FAIRREG_REGISTRY or the built-in trade fair registry).
        #[arg(long, value_name = "REGISTRY")]
        registry: Option<PathBuf>,
        /// Invitation JSON; starts the flow past the pre-filled steps.
        #[arg(long, value_name = "INVITE")]
        invite: Option<PathBuf>,
        /// Show verbose output (step keys, navigation flags, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the session JSON on completion.
        #[arg(long)]
        session_json: bool,
    },
    /// Validate one step's data against a stored session.
    Validate {
        /// Step key to validate.
        #[arg(long)]
        step: String,
        /// Path to the session JSON file.
        #[arg(long, value_name = "SESSION")]
        session: PathBuf,
        /// Step data JSON; defaults to the session's own record for the step.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        #[arg(long, value_name = "REGISTRY")]
        registry: Option<PathBuf>,
    },
    /// Resolve the step that follows `--step` for a stored session.
    Resolve {
        #[arg(long)]
        step: String,
        #[arg(long, value_name = "SESSION")]
        session: PathBuf,
        #[arg(long, value_name = "REGISTRY")]
        registry: Option<PathBuf>,
    },
    /// Print a JSON schema for registry or invitation documents.
    Schema {
        #[arg(long, value_enum, default_value_t = SchemaTarget::Registry)]
        target: SchemaTarget,
    },
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Check { registry, verbose } => run_check(registry, verbose),
        Command::Wizard {
            registry,
            invite,
            verbose,
            session_json,
        } => run_wizard(registry, invite, verbose, session_json),
        Command::Validate {
            step,
            session,
            data,
            registry,
        } => run_validate(&step, session, data, registry),
        Command::Resolve {
            step,
            session,
            registry,
        } => run_resolve(&step, session, registry),
        Command::Schema { target } => run_schema(target),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_registry_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        env::var_os(REGISTRY_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

fn load_registry(flag: Option<PathBuf>) -> CliResult<StepRegistry> {
    match resolve_registry_path(flag) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading registry file");
            let json = fs::read_to_string(&path)?;
            Ok(StepRegistry::from_json(&json)?)
        }
        None => Ok(StepRegistry::trade_fair()?),
    }
}

fn component_config(flag: Option<PathBuf>) -> CliResult<String> {
    match resolve_registry_path(flag) {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(json!({ "registry_json": json }).to_string())
        }
        None => Ok(String::new()),
    }
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_check(registry_path: Option<PathBuf>, verbose: bool) -> CliResult<()> {
    let registry = load_registry(registry_path)?;
    let spec = registry.spec();
    let terminals = registry
        .steps()
        .filter(|(_, config)| config.is_terminal())
        .count();
    println!(
        "Registry {} v{}: {} steps, {} terminal",
        spec.id,
        spec.version,
        spec.steps.len(),
        terminals
    );
    if verbose {
        for (key, config) in registry.steps() {
            let successors = config.successors();
            let remaining = registry
                .remaining_steps(key)
                .map(|steps| steps.to_string())
                .unwrap_or_else(|| "-".into());
            if successors.is_empty() {
                println!("  {} ({}) -> submit", key, config.title);
            } else {
                println!(
                    "  {} ({}) -> {} [remaining {}]",
                    key,
                    config.title,
                    successors.join(", "),
                    remaining
                );
            }
        }
    }
    if let Some(plan) = registry.invitation() {
        let steps: Vec<&str> = plan.steps.iter().map(|step| step.step.as_str()).collect();
        println!("Invitation pre-fills: {}", steps.join(" -> "));
    }
    println!("Registry OK");
    Ok(())
}

fn run_validate(
    step: &str,
    session_path: PathBuf,
    data_path: Option<PathBuf>,
    registry_path: Option<PathBuf>,
) -> CliResult<()> {
    let config_json = component_config(registry_path)?;
    let session_json = fs::read_to_string(session_path)?;
    let data_json = match data_path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let session: Value = serde_json::from_str(&session_json)?;
            session
                .get(format!("data:{}", step))
                .cloned()
                .unwrap_or_else(|| json!({}))
                .to_string()
        }
    };

    let result = parse_component_result(&component_validate(
        step,
        &config_json,
        &session_json,
        &data_json,
    ))?;
    let valid = result["is_valid"].as_bool().unwrap_or(false);
    println!(
        "Validation result: {}",
        if valid { "valid" } else { "invalid" }
    );
    if let Some(errors) = result["errors"].as_array()
        && !errors.is_empty()
    {
        println!("Errors:");
        for error in errors {
            println!("  - {}", error.as_str().unwrap_or_default());
        }
    }

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_resolve(step: &str, session_path: PathBuf, registry_path: Option<PathBuf>) -> CliResult<()> {
    let config_json = component_config(registry_path)?;
    let session_json = fs::read_to_string(session_path)?;
    let result = parse_component_result(&component_next(step, &config_json, &session_json))?;
    match result["next_step"].as_str() {
        Some(next) => println!("Next step: {}", next),
        None => println!("Step {} is terminal; submit the registration.", step),
    }
    Ok(())
}

fn run_schema(target: SchemaTarget) -> CliResult<()> {
    let schema = match target {
        SchemaTarget::Registry => schemars::schema_for!(RegistrySpec),
        SchemaTarget::Invitation => schemars::schema_for!(InvitationPayload),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

enum StepInput {
    Answers(StepData),
    Back,
}

fn run_wizard(
    registry_path: Option<PathBuf>,
    invite_path: Option<PathBuf>,
    verbose: bool,
    session_json: bool,
) -> CliResult<()> {
    let registry = load_registry(registry_path)?;
    let mut flow = match invite_path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            let invite: InvitationPayload = serde_json::from_str(&contents)?;
            FlowController::from_invitation(&registry, &invite)?
        }
        None => FlowController::new(&registry),
    };

    let presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), session_json);
    presenter.show_header(registry.spec());

    loop {
        presenter.show_step(&flow.progress());
        let data = match collect_step(&flow, &presenter)? {
            StepInput::Answers(data) => data,
            StepInput::Back => {
                if !flow.navigate_previous() {
                    presenter.show_notice("You cannot go back from this step.");
                }
                continue;
            }
        };

        match flow.navigate_next(data)? {
            Advance::Moved { .. } => {}
            Advance::Restarted => {
                presenter.show_notice("Starting over with a new profile.");
            }
            Advance::Rejected { validation } => presenter.show_validation(&validation),
            Advance::ReadyToSubmit => match flow.submit()? {
                Submission::Complete { payload } => {
                    presenter.show_completion(&payload, flow.session());
                    return Ok(());
                }
                Submission::Rejected { failures } => {
                    presenter.show_failures(&failures);
                    return Err("registration could not be submitted".into());
                }
            },
        }
    }
}

/// Prompts every active field of the current step, re-checking conditional
/// requirements after each round of answers.
fn collect_step(flow: &FlowController<'_>, presenter: &WizardPresenter) -> CliResult<StepInput> {
    let config = flow.current_config()?;
    let initial = flow.initial_values();
    let mut data = StepData::new();
    let mut asked: Vec<String> = Vec::new();

    loop {
        let required = required_fields(config, &data, flow.session());
        let mut pending: Vec<(String, bool)> = required
            .iter()
            .filter(|field| !asked.contains(field))
            .map(|field| (field.clone(), true))
            .collect();
        if let Some(condition) = &config.condition_field
            && !asked.iter().chain(&required).any(|field| field_name(field) == condition)
        {
            pending.push((condition.clone(), false));
        }
        if pending.is_empty() {
            return Ok(StepInput::Answers(data));
        }

        for (field, is_required) in pending {
            let name = field_name(&field);
            let prompt = PromptContext::new(config, &field, is_required, initial.get(name).cloned());
            match prompt_field(&prompt, presenter)? {
                Some(Value::Null) => {}
                Some(value) => {
                    data.insert(prompt.field.clone(), value);
                }
                None => return Ok(StepInput::Back),
            }
            asked.push(field);
        }
    }
}

fn field_name(field: &str) -> &str {
    field.strip_suffix("[]").unwrap_or(field)
}

fn prompt_field(prompt: &PromptContext, presenter: &WizardPresenter) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        let input = read_line("> ")?;
        if input.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }
        if input == ":back" {
            return Ok(None);
        }
        match parse_answer(prompt, &input) {
            Ok(value) => return Ok(Some(value)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn read_line(prompt: &str) -> CliResult<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err("input ended before the registration was complete".into());
    }
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_flag_wins_over_environment() {
        let flag = PathBuf::from("custom.json");
        assert_eq!(resolve_registry_path(Some(flag.clone())), Some(flag));
    }

    #[test]
    fn component_errors_become_cli_errors() {
        assert!(parse_component_result(r#"{"error":"boom"}"#).is_err());
        let value = parse_component_result(r#"{"status":"next"}"#).expect("ok");
        assert_eq!(value["status"], "next");
    }
}
