use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::step::{FieldName, StepKey};

/// Where a synthesized field value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrefillSource {
    ExhibitorId,
    FieldOfWork,
    InviteeEmail,
    Literal(Value),
}

/// One step a normal path would have populated before the invitation entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrefillStep {
    pub step: StepKey,
    pub fields: BTreeMap<FieldName, PrefillSource>,
}

/// Later step/field where the invitee email is offered as the initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailTarget {
    pub step: StepKey,
    pub field: FieldName,
}

/// How invitation links enter the flow mid-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvitationPlan {
    /// Steps to synthesize, in path order.
    pub steps: Vec<PrefillStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailTarget>,
}
