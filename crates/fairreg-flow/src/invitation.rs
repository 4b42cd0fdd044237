use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;
use crate::registry::StepRegistry;
use crate::resolve::resolve_next;
use crate::session::{InvitationMeta, RegistrationSession, StepData};
use crate::spec::invitation::PrefillSource;
use crate::spec::step::StepKey;
use crate::validate::validate_config;

/// Already-decoded invitation link payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPayload {
    pub exhibitor_id: u64,
    pub field_of_work: String,
    pub invitee_email: String,
    pub token: String,
}

impl InvitationPayload {
    fn source_value(&self, source: &PrefillSource) -> Value {
        match source {
            PrefillSource::ExhibitorId => Value::from(self.exhibitor_id),
            PrefillSource::FieldOfWork => Value::String(self.field_of_work.clone()),
            PrefillSource::InviteeEmail => Value::String(self.invitee_email.clone()),
            PrefillSource::Literal(value) => value.clone(),
        }
    }
}

/// Builds a session that looks as if the invitee had walked the plan's steps.
///
/// Returns the session together with the entry step the invitee lands on.
pub fn prefill_from_invitation(
    registry: &StepRegistry,
    invite: &InvitationPayload,
) -> Result<(RegistrationSession, StepKey), FlowError> {
    let plan = registry.invitation().ok_or(FlowError::InvitationUnsupported)?;
    let mut session = RegistrationSession::new();
    let mut synthesized = Vec::with_capacity(plan.steps.len());
    let mut entry = None;

    for (index, prefill) in plan.steps.iter().enumerate() {
        let config = registry.get(&prefill.step)?;
        let data: StepData = prefill
            .fields
            .iter()
            .map(|(field, source)| (field.clone(), invite.source_value(source)))
            .collect();

        let result = validate_config(config, &data, &session);
        if !result.is_valid {
            return Err(FlowError::InvalidInvitation {
                step: prefill.step.clone(),
                result,
            });
        }
        session.set_step_data(&prefill.step, data);

        let resolved = resolve_next(registry, &prefill.step, &session).ok_or_else(|| {
            FlowError::UnresolvedTransition {
                step: prefill.step.clone(),
            }
        })?;
        if let Some(expected) = plan.steps.get(index + 1)
            && expected.step != resolved
        {
            return Err(FlowError::InvitationPathMismatch {
                step: prefill.step.clone(),
                expected: expected.step.clone(),
                resolved,
            });
        }
        session.push_path(&prefill.step);
        synthesized.push(prefill.step.clone());
        entry = Some(resolved);
    }
    let entry = entry.ok_or(FlowError::InvitationUnsupported)?;

    tracing::info!(
        exhibitor_id = invite.exhibitor_id,
        entry_step = %entry,
        synthesized = synthesized.len(),
        "session prefilled from invitation"
    );
    session.set_invitation(InvitationMeta {
        invite_token: invite.token.clone(),
        invitee_email: invite.invitee_email.clone(),
        source_exhibitor_id: invite.exhibitor_id,
        entry_step: entry.clone(),
        synthesized,
    });
    Ok((session, entry))
}
