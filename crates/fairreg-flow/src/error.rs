use thiserror::Error;

use crate::spec::step::StepKey;
use crate::validate::ValidationResult;

/// Configuration errors detected while loading a step registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to parse registry: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("registry is missing the start step '{0}'")]
    MissingStart(StepKey),
    #[error("registry declares no terminal step")]
    NoTerminalStep,
    #[error("step '{step}' transitions to unknown step '{target}'")]
    DanglingTransition { step: StepKey, target: StepKey },
    #[error("step '{step}' has a prev rule on '{target}', which is unknown or has no condition field")]
    DanglingPrev { step: StepKey, target: StepKey },
    #[error("step '{step}' has rules reading its condition value but no condition field")]
    MissingConditionField { step: StepKey },
    #[error("step '{step}' declares an empty rule list")]
    EmptyRules { step: StepKey },
    #[error("step '{step}' declares more than one default rule")]
    DuplicateDefault { step: StepKey },
    #[error("step '{step}' has a required_if trigger on undeclared field '{field}'")]
    UnknownTriggerField { step: StepKey, field: String },
    #[error("invitation plan references unknown step '{0}'")]
    UnknownInvitationStep(StepKey),
    #[error("invitation plan must start at step '{0}'")]
    InvitationStart(StepKey),
    #[error("step '{0}' is not defined")]
    UnknownStep(StepKey),
}

/// Decode failures for persisted sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session must be a JSON object")]
    NotAnObject,
    #[error("session entry '{0}' must be an object of field values")]
    InvalidStepData(String),
    #[error("session path must be an array of step keys")]
    InvalidPath,
    #[error("unexpected session entry '{0}'")]
    UnknownEntry(String),
    #[error("invalid invitation metadata: {0}")]
    Invitation(#[source] serde_json::Error),
    #[error("cbor decode error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

/// Errors surfaced by the flow controller and the invitation entry point.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("no transition from step '{step}' matches the current answers")]
    UnresolvedTransition { step: StepKey },
    #[error("step '{0}' is not on the visited path")]
    NotOnPath(StepKey),
    #[error("navigation to step '{0}' is locked for invited registrations")]
    NavigationLocked(StepKey),
    #[error("cannot submit from step '{0}', which is not a terminal step")]
    NotAtTerminalStep(StepKey),
    #[error("registry does not define an invitation plan")]
    InvitationUnsupported,
    #[error("invitation data for step '{step}' is invalid: {}", .result.errors.join("; "))]
    InvalidInvitation {
        step: StepKey,
        result: ValidationResult,
    },
    #[error("invitation step '{step}' resolves to '{resolved}' instead of '{expected}'")]
    InvitationPathMismatch {
        step: StepKey,
        expected: StepKey,
        resolved: StepKey,
    },
}
