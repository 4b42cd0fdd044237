use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;
use crate::invitation::{InvitationPayload, prefill_from_invitation};
use crate::registry::StepRegistry;
use crate::resolve::resolve_next;
use crate::session::{RegistrationSession, StepData};
use crate::spec::step::{START_STEP, StepConfig, StepKey};
use crate::validate::{ValidationResult, validate_config};

/// Result of trying to leave the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advance {
    Moved { from: StepKey, to: StepKey },
    /// The resolved successor was the start step; everything was cleared.
    Restarted,
    /// Validation failed; nothing was committed.
    Rejected { validation: ValidationResult },
    /// The terminal step was committed; `submit` may be called.
    ReadyToSubmit,
}

/// Data handed to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationPayload {
    /// Realized path including the terminal step.
    pub steps: Vec<StepKey>,
    /// Fields merged along the realized path, later steps overriding earlier ones.
    pub fields: StepData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission {
    Complete { payload: RegistrationPayload },
    Rejected { failures: BTreeMap<StepKey, ValidationResult> },
}

/// Read-only view of the flow for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub current_step: StepKey,
    pub title: String,
    pub visited: usize,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub is_terminal: bool,
    pub remaining_steps: Option<usize>,
    pub invited: bool,
}

/// Serializable position of a live flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub current_step: StepKey,
    pub session: RegistrationSession,
}

/// Drives one registration session over a step registry.
#[derive(Debug, Clone)]
pub struct FlowController<'r> {
    registry: &'r StepRegistry,
    session: RegistrationSession,
    current: StepKey,
}

impl<'r> FlowController<'r> {
    pub fn new(registry: &'r StepRegistry) -> Self {
        Self {
            registry,
            session: RegistrationSession::new(),
            current: START_STEP.to_string(),
        }
    }

    /// Starts at the invitation entry step with earlier steps synthesized.
    pub fn from_invitation(
        registry: &'r StepRegistry,
        invite: &InvitationPayload,
    ) -> Result<Self, FlowError> {
        let (session, entry) = prefill_from_invitation(registry, invite)?;
        Ok(Self {
            registry,
            session,
            current: entry,
        })
    }

    pub fn resume(registry: &'r StepRegistry, snapshot: FlowSnapshot) -> Result<Self, FlowError> {
        registry.get(&snapshot.current_step)?;
        Ok(Self {
            registry,
            session: snapshot.session,
            current: snapshot.current_step,
        })
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            current_step: self.current.clone(),
            session: self.session.clone(),
        }
    }

    pub fn current_step(&self) -> &str {
        &self.current
    }

    pub fn current_config(&self) -> Result<&'r StepConfig, FlowError> {
        Ok(self.registry.get(&self.current)?)
    }

    pub fn session(&self) -> &RegistrationSession {
        &self.session
    }

    pub fn into_session(self) -> RegistrationSession {
        self.session
    }

    /// Values to pre-populate the current step's form with.
    pub fn initial_values(&self) -> StepData {
        if let Some(data) = self.session.get(&self.current) {
            return data.clone();
        }
        let mut values = StepData::new();
        if let Some(meta) = self.session.invitation()
            && let Some(target) = self.registry.invitation().and_then(|plan| plan.email.as_ref())
            && target.step == self.current
        {
            values.insert(
                target.field.clone(),
                Value::String(meta.invitee_email.clone()),
            );
        }
        values
    }

    /// Validates `input` for the current step and moves to the resolved successor.
    pub fn navigate_next(&mut self, input: StepData) -> Result<Advance, FlowError> {
        let config = self.current_config()?;
        let validation = validate_config(config, &input, &self.session);
        if !validation.is_valid {
            tracing::debug!(
                step = %self.current,
                fields = ?validation.fields,
                "step rejected"
            );
            return Ok(Advance::Rejected { validation });
        }

        let mut staged = self.session.clone();
        staged.set_step_data(&self.current, input);

        if config.is_terminal() {
            self.session = staged;
            return Ok(Advance::ReadyToSubmit);
        }

        let Some(next) = resolve_next(self.registry, &self.current, &staged) else {
            tracing::error!(step = %self.current, "no transition matches the committed answers");
            return Err(FlowError::UnresolvedTransition {
                step: self.current.clone(),
            });
        };

        if next == START_STEP {
            staged.reset_from(START_STEP);
            self.session = staged;
            self.current = next;
            return Ok(Advance::Restarted);
        }

        staged.push_path(&self.current);
        self.session = staged;
        let from = std::mem::replace(&mut self.current, next.clone());
        tracing::info!(%from, to = %next, "step advanced");
        Ok(Advance::Moved { from, to: next })
    }

    /// Steps back along the realized path; `false` when going back is not allowed.
    pub fn navigate_previous(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        self.current = self.session.pop_path();
        true
    }

    /// Jumps back to a step already on the realized path.
    pub fn navigate_to_step(&mut self, step: &str) -> Result<(), FlowError> {
        self.registry.get(step)?;
        if step == self.current {
            return Ok(());
        }
        if self
            .session
            .invitation()
            .is_some_and(|meta| meta.synthesized.iter().any(|synth| synth == step))
        {
            return Err(FlowError::NavigationLocked(step.to_string()));
        }
        let position = self
            .session
            .path()
            .iter()
            .position(|visited| visited == step)
            .ok_or_else(|| FlowError::NotOnPath(step.to_string()))?;
        self.session.truncate_path(position);
        self.current = step.to_string();
        Ok(())
    }

    pub fn can_go_back(&self) -> bool {
        if self.current == START_STEP {
            return false;
        }
        !self
            .session
            .invitation()
            .is_some_and(|meta| meta.entry_step == self.current)
    }

    pub fn can_go_forward(&self) -> bool {
        self.registry
            .get(&self.current)
            .is_ok_and(|config| !config.is_terminal())
    }

    pub fn progress(&self) -> FlowProgress {
        let config = self.registry.get(&self.current).ok();
        FlowProgress {
            current_step: self.current.clone(),
            title: config.map(|config| config.title.clone()).unwrap_or_default(),
            visited: self.session.path().len(),
            can_go_back: self.can_go_back(),
            can_go_forward: self.can_go_forward(),
            is_terminal: config.is_some_and(StepConfig::is_terminal),
            remaining_steps: self.registry.remaining_steps(&self.current),
            invited: self.session.invitation().is_some(),
        }
    }

    /// Re-validates every stored record before handing the answers over.
    pub fn submit(&self) -> Result<Submission, FlowError> {
        let config = self.current_config()?;
        if !config.is_terminal() {
            return Err(FlowError::NotAtTerminalStep(self.current.clone()));
        }

        let mut failures = BTreeMap::new();
        if self.session.get(&self.current).is_none() {
            let result = validate_config(config, &StepData::new(), &self.session);
            if !result.is_valid {
                failures.insert(self.current.clone(), result);
            }
        }
        for (step, data) in self.session.records() {
            let result = validate_config(self.registry.get(step)?, data, &self.session);
            if !result.is_valid {
                failures.insert(step.to_string(), result);
            }
        }
        if !failures.is_empty() {
            let steps: Vec<&StepKey> = failures.keys().collect();
            tracing::warn!(?steps, "submission rejected");
            return Ok(Submission::Rejected { failures });
        }

        let steps: Vec<StepKey> = self
            .session
            .path()
            .iter()
            .cloned()
            .chain(std::iter::once(self.current.clone()))
            .collect();
        let mut fields = StepData::new();
        for step in &steps {
            if let Some(data) = self.session.get(step) {
                fields.extend(data.clone());
            }
        }

        Ok(Submission::Complete {
            payload: RegistrationPayload {
                steps,
                fields,
                invite_token: self
                    .session
                    .invitation()
                    .map(|meta| meta.invite_token.clone()),
            },
        })
    }
}
