pub mod invitation;
pub mod predicate;
pub mod registry;
pub mod step;

pub use invitation::{EmailTarget, InvitationPlan, PrefillSource, PrefillStep};
pub use predicate::Predicate;
pub use registry::RegistrySpec;
pub use step::{
    FieldName, RequiredIf, START_STEP, StepConfig, StepKey, TransitionRule, Transitions, Trigger,
    base_name, is_collection_field,
};
