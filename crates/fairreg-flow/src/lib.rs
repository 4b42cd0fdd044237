#![allow(missing_docs)]

pub mod error;
pub mod flow;
pub mod invitation;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod spec;
pub mod validate;

pub use error::{FlowError, RegistryError, SessionError};
pub use flow::{Advance, FlowController, FlowProgress, FlowSnapshot, RegistrationPayload, Submission};
pub use invitation::{InvitationPayload, prefill_from_invitation};
pub use registry::StepRegistry;
pub use resolve::resolve_next;
pub use session::{InvitationMeta, RegistrationSession, StepData};
pub use spec::{
    FieldName, Predicate, RegistrySpec, RequiredIf, START_STEP, StepConfig, StepKey,
    TransitionRule, Transitions, Trigger,
};
pub use validate::{ValidationResult, humanize, required_fields, validate_config, validate_step};
