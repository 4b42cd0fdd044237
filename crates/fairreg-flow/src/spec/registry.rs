use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::invitation::InvitationPlan;
use crate::spec::step::{StepConfig, StepKey};

/// Top-level registration flow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegistrySpec {
    pub id: String,
    pub title: String,
    pub version: String,
    pub steps: BTreeMap<StepKey, StepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation: Option<InvitationPlan>,
}
