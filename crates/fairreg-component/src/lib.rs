use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;

use fairreg_flow::{
    FlowController, FlowError, FlowSnapshot, InvitationPayload, RegistrationSession,
    RegistryError, StepData, StepRegistry, resolve_next, validate_step as flow_validate_step,
};

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse {0}: {1}")]
    InputParse(&'static str, #[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Flow(#[from] FlowError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    registry_json: Option<String>,
}

fn load_registry(config_json: &str) -> Result<StepRegistry, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    match config.registry_json.as_deref() {
        Some(json) => Ok(StepRegistry::from_json(json)?),
        None => Ok(StepRegistry::trade_fair()?),
    }
}

fn parse_input<T: DeserializeOwned>(
    what: &'static str,
    json: &str,
) -> Result<T, ComponentError> {
    serde_json::from_str(json).map_err(|err| ComponentError::InputParse(what, err))
}

fn parse_session(session_json: &str) -> Result<RegistrationSession, ComponentError> {
    if session_json.trim().is_empty() {
        return Ok(RegistrationSession::new());
    }
    parse_input("session", session_json)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => {
            tracing::warn!(error = %err, "component call failed");
            json!({ "error": err.to_string() }).to_string()
        }
    }
}

/// Serialized registry definition.
pub fn describe(config_json: &str) -> String {
    respond(load_registry(config_json).and_then(|registry| to_value(registry.spec())))
}

pub fn describe_step(step: &str, config_json: &str) -> String {
    respond(load_registry(config_json).and_then(|registry| {
        let config = registry.get(step)?;
        let mut value = to_value(config)?;
        if let Value::Object(map) = &mut value {
            map.insert("key".into(), Value::String(step.to_string()));
            map.insert(
                "remaining_steps".into(),
                json!(registry.remaining_steps(step)),
            );
        }
        Ok(value)
    }))
}

pub fn validate_step(step: &str, config_json: &str, session_json: &str, data_json: &str) -> String {
    respond(load_registry(config_json).and_then(|registry| {
        let session = parse_session(session_json)?;
        let data: StepData = parse_input("step data", data_json)?;
        let result = flow_validate_step(&registry, step, &data, &session)?;
        to_value(&result)
    }))
}

/// Resolves the successor of `step` from the answers already stored in the session.
pub fn next(step: &str, config_json: &str, session_json: &str) -> String {
    respond(load_registry(config_json).and_then(|registry| {
        let config = registry.get(step)?;
        let session = parse_session(session_json)?;
        if config.is_terminal() {
            return Ok(json!({ "status": "terminal", "next_step": null }));
        }
        let next = resolve_next(&registry, step, &session).ok_or_else(|| {
            FlowError::UnresolvedTransition {
                step: step.to_string(),
            }
        })?;
        Ok(json!({ "status": "next", "next_step": next }))
    }))
}

/// Starts a flow from an invitation payload and returns its state.
pub fn prefill(config_json: &str, invite_json: &str) -> String {
    respond(load_registry(config_json).and_then(|registry| {
        let invite: InvitationPayload = parse_input("invitation", invite_json)?;
        let flow = FlowController::from_invitation(&registry, &invite)?;
        state_response(&flow, None)
    }))
}

fn with_flow<F>(config_json: &str, state_json: &str, f: F) -> String
where
    F: FnOnce(&mut FlowController<'_>) -> Result<Value, ComponentError>,
{
    respond(load_registry(config_json).and_then(|registry| {
        let mut flow = if state_json.trim().is_empty() {
            FlowController::new(&registry)
        } else {
            let snapshot: FlowSnapshot = parse_input("state", state_json)?;
            FlowController::resume(&registry, snapshot)?
        };
        f(&mut flow)
    }))
}

fn state_response(flow: &FlowController<'_>, outcome: Option<Value>) -> Result<Value, ComponentError> {
    let mut map = Map::new();
    if let Some(outcome) = outcome {
        map.insert("outcome".into(), outcome);
    }
    map.insert("state".into(), to_value(&flow.snapshot())?);
    map.insert("progress".into(), to_value(&flow.progress())?);
    map.insert("initial_values".into(), Value::Object(flow.initial_values()));
    Ok(Value::Object(map))
}

/// Current position, progress and initial form values; empty state starts a new flow.
pub fn progress(config_json: &str, state_json: &str) -> String {
    with_flow(config_json, state_json, |flow| state_response(flow, None))
}

pub fn advance(config_json: &str, state_json: &str, data_json: &str) -> String {
    with_flow(config_json, state_json, |flow| {
        let data: StepData = parse_input("step data", data_json)?;
        let outcome = flow.navigate_next(data)?;
        let outcome = to_value(&outcome)?;
        state_response(flow, Some(outcome))
    })
}

pub fn retreat(config_json: &str, state_json: &str) -> String {
    with_flow(config_json, state_json, |flow| {
        let moved = flow.navigate_previous();
        state_response(flow, Some(json!({ "moved": moved })))
    })
}

pub fn jump(config_json: &str, state_json: &str, step: &str) -> String {
    with_flow(config_json, state_json, |flow| {
        flow.navigate_to_step(step)?;
        state_response(flow, None)
    })
}

pub fn submit(config_json: &str, state_json: &str) -> String {
    with_flow(config_json, state_json, |flow| to_value(&flow.submit()?))
}
