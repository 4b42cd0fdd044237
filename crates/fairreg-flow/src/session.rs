use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::spec::step::{START_STEP, StepKey};

/// Field values collected on one step.
pub type StepData = Map<String, Value>;

const DATA_PREFIX: &str = "data:";
const PATH_KEY: &str = "path";
const INVITATION_KEY: &str = "invitation";

/// Metadata kept for sessions created from an invitation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationMeta {
    pub invite_token: String,
    pub invitee_email: String,
    pub source_exhibitor_id: u64,
    /// Step the invitee lands on; backward navigation stops here.
    pub entry_step: StepKey,
    /// Steps synthesized on the invitee's behalf.
    pub synthesized: Vec<StepKey>,
}

/// Answers keyed by step plus the realized navigation path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct RegistrationSession {
    data: BTreeMap<StepKey, StepData>,
    path: Vec<StepKey>,
    invitation: Option<InvitationMeta>,
}

impl RegistrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the record stored for `step`.
    pub fn set_step_data(&mut self, step: &str, data: StepData) {
        self.data.insert(step.to_string(), data);
    }

    /// Stored record for `step`, or an empty one.
    pub fn step_data(&self, step: &str) -> StepData {
        self.data.get(step).cloned().unwrap_or_default()
    }

    pub fn get(&self, step: &str) -> Option<&StepData> {
        self.data.get(step)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &StepData)> {
        self.data.iter().map(|(key, data)| (key.as_str(), data))
    }

    pub fn push_path(&mut self, step: &str) {
        self.path.push(step.to_string());
    }

    /// Pops the last visited step; an empty path yields the start step.
    pub fn pop_path(&mut self) -> StepKey {
        self.path.pop().unwrap_or_else(|| START_STEP.to_string())
    }

    pub fn path(&self) -> &[StepKey] {
        &self.path
    }

    pub(crate) fn truncate_path(&mut self, len: usize) {
        self.path.truncate(len);
    }

    /// Full restart: drops every record, the path and any invitation.
    pub fn reset_from(&mut self, start: &str) {
        tracing::info!(
            start,
            discarded_steps = self.data.len(),
            "registration restarted"
        );
        self.data.clear();
        self.path.clear();
        self.invitation = None;
    }

    pub fn invitation(&self) -> Option<&InvitationMeta> {
        self.invitation.as_ref()
    }

    pub(crate) fn set_invitation(&mut self, meta: InvitationMeta) {
        self.invitation = Some(meta);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.path.is_empty()
    }

    /// First non-null value of `field`, scanning the realized path before other records.
    pub fn find_field(&self, field: &str) -> Option<&Value> {
        let on_path = self.path.iter().filter_map(|step| self.data.get(step));
        let off_path = self
            .data
            .iter()
            .filter(|(step, _)| !self.path.contains(step))
            .map(|(_, data)| data);
        on_path
            .chain(off_path)
            .find_map(|data| data.get(field).filter(|value| !value.is_null()))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SessionError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    /// Flat form: `{"data:<step>": {...}, "path": [...], "invitation": {...}}`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (step, data) in &self.data {
            map.insert(format!("{DATA_PREFIX}{step}"), Value::Object(data.clone()));
        }
        map.insert(
            PATH_KEY.into(),
            Value::Array(self.path.iter().cloned().map(Value::String).collect()),
        );
        if let Some(invitation) = &self.invitation
            && let Ok(value) = serde_json::to_value(invitation)
        {
            map.insert(INVITATION_KEY.into(), value);
        }
        Value::Object(map)
    }

    pub fn from_value(value: Value) -> Result<Self, SessionError> {
        let Value::Object(map) = value else {
            return Err(SessionError::NotAnObject);
        };

        let mut session = Self::default();
        for (key, entry) in map {
            if let Some(step) = key.strip_prefix(DATA_PREFIX) {
                match entry {
                    Value::Object(data) => {
                        session.data.insert(step.to_string(), data);
                    }
                    _ => return Err(SessionError::InvalidStepData(key)),
                }
            } else if key == PATH_KEY {
                session.path = entry
                    .as_array()
                    .ok_or(SessionError::InvalidPath)?
                    .iter()
                    .map(|step| step.as_str().map(String::from))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(SessionError::InvalidPath)?;
            } else if key == INVITATION_KEY {
                if !entry.is_null() {
                    session.invitation =
                        Some(serde_json::from_value(entry).map_err(SessionError::Invitation)?);
                }
            } else {
                return Err(SessionError::UnknownEntry(key));
            }
        }
        Ok(session)
    }
}

impl From<RegistrationSession> for Value {
    fn from(session: RegistrationSession) -> Self {
        session.to_value()
    }
}

impl TryFrom<Value> for RegistrationSession {
    type Error = SessionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> StepData {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn pop_below_bottom_returns_start() {
        let mut session = RegistrationSession::new();
        session.push_path("1");
        assert_eq!(session.pop_path(), "1");
        assert_eq!(session.pop_path(), START_STEP);
        assert!(session.path().is_empty());
    }

    #[test]
    fn missing_step_data_is_empty_record() {
        let session = RegistrationSession::new();
        assert!(session.step_data("wv-ex-step-4").is_empty());
    }

    #[test]
    fn flat_form_uses_data_prefix() {
        let mut session = RegistrationSession::new();
        session.set_step_data("1", record(json!({ "profile": "Buyer" })));
        session.push_path("1");

        let value = session.to_value();
        assert_eq!(value["data:1"]["profile"], "Buyer");
        assert_eq!(value["path"], json!(["1"]));

        let restored = RegistrationSession::from_value(value).expect("decode");
        assert_eq!(restored, session);
    }

    #[test]
    fn from_value_rejects_unknown_entries() {
        let err = RegistrationSession::from_value(json!({ "answers": {} })).unwrap_err();
        assert!(matches!(err, SessionError::UnknownEntry(key) if key == "answers"));
        let err = RegistrationSession::from_value(json!({ "path": [1, 2] })).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPath));
    }

    #[test]
    fn cbor_snapshot_restores_session() {
        let mut session = RegistrationSession::new();
        session.set_step_data("1", record(json!({ "profile": "Visitor" })));
        session.push_path("1");
        let bytes = session.to_cbor().expect("encode");
        assert_eq!(RegistrationSession::from_cbor(&bytes).expect("decode"), session);
    }

    #[test]
    fn find_field_prefers_realized_path() {
        let mut session = RegistrationSession::new();
        session.set_step_data("a-stale", record(json!({ "category": "Winery" })));
        session.set_step_data("b-live", record(json!({ "category": "Winemaker" })));
        session.push_path("b-live");
        assert_eq!(session.find_field("category"), Some(&json!("Winemaker")));
    }
}
