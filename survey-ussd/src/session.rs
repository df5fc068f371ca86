//! Per-investigator session variables.
//!
//! Typed view over a [`SessionBackend`]. Every key has a default value; a
//! missing or undecodable value reads as its default, so sessions regenerate
//! lazily after a backend flush.

use crate::state::{InterviewState, QuestionMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use survey_core::{InvestigatorId, QuestionId, SessionError, SurveyResult, Timestamp};
use survey_storage::SessionBackend;

/// Session variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    State,
    Reanswer,
    InvalidAnswer,
    ConfirmEndInterview,
    IsRegisteringHousehold,
    IsReportingNonResponse,
    IsSelectingMember,
    IsHead,
    RegistrationFields,
    LastRequestAt,
}

impl SessionKey {
    pub const ALL: [SessionKey; 10] = [
        SessionKey::State,
        SessionKey::Reanswer,
        SessionKey::InvalidAnswer,
        SessionKey::ConfirmEndInterview,
        SessionKey::IsRegisteringHousehold,
        SessionKey::IsReportingNonResponse,
        SessionKey::IsSelectingMember,
        SessionKey::IsHead,
        SessionKey::RegistrationFields,
        SessionKey::LastRequestAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::State => "state",
            SessionKey::Reanswer => "REANSWER",
            SessionKey::InvalidAnswer => "INVALID_ANSWER",
            SessionKey::ConfirmEndInterview => "CONFIRM_END_INTERVIEW",
            SessionKey::IsRegisteringHousehold => "is_registering_household",
            SessionKey::IsReportingNonResponse => "is_reporting_non_response",
            SessionKey::IsSelectingMember => "is_selecting_member",
            SessionKey::IsHead => "is_head",
            SessionKey::RegistrationFields => "registration_dict",
            SessionKey::LastRequestAt => "last_request_at",
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            SessionKey::State => json!({"state": "home"}),
            SessionKey::Reanswer | SessionKey::InvalidAnswer | SessionKey::ConfirmEndInterview => {
                json!([])
            }
            SessionKey::IsRegisteringHousehold
            | SessionKey::IsReportingNonResponse
            | SessionKey::IsSelectingMember => json!(false),
            SessionKey::IsHead | SessionKey::LastRequestAt => Value::Null,
            SessionKey::RegistrationFields => Value::Object(Map::new()),
        }
    }
}

/// Session of one investigator.
pub struct SessionCache<'a, B: SessionBackend + ?Sized> {
    backend: &'a B,
    investigator_id: InvestigatorId,
}

impl<'a, B: SessionBackend + ?Sized> SessionCache<'a, B> {
    pub fn new(backend: &'a B, investigator_id: InvestigatorId) -> Self {
        Self {
            backend,
            investigator_id,
        }
    }

    pub fn investigator_id(&self) -> InvestigatorId {
        self.investigator_id
    }

    /// Fill in every missing key with its default.
    pub fn generate(&self) -> SurveyResult<()> {
        for key in SessionKey::ALL {
            if self.backend.get(self.investigator_id, key.as_str())?.is_none() {
                self.backend
                    .set(self.investigator_id, key.as_str(), key.default_value())?;
            }
        }
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, key: SessionKey) -> SurveyResult<T> {
        let stored = self.backend.get(self.investigator_id, key.as_str())?;
        if let Some(value) = stored {
            match serde_json::from_value(value) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    tracing::warn!(
                        investigator_id = %self.investigator_id,
                        key = key.as_str(),
                        error = %e,
                        "Undecodable session value, using default"
                    );
                }
            }
        }
        serde_json::from_value(key.default_value()).map_err(|e| {
            SessionError::Encode {
                key: key.as_str().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn write<T: Serialize>(&self, key: SessionKey, value: &T) -> SurveyResult<()> {
        let value = serde_json::to_value(value).map_err(|e| SessionError::Encode {
            key: key.as_str().to_string(),
            reason: e.to_string(),
        })?;
        self.backend.set(self.investigator_id, key.as_str(), value)
    }

    fn reset(&self, key: SessionKey) -> SurveyResult<()> {
        self.backend
            .set(self.investigator_id, key.as_str(), key.default_value())
    }

    // === Navigation ===

    pub fn state(&self) -> SurveyResult<InterviewState> {
        self.read(SessionKey::State)
    }

    /// Persist the state and keep the member-selection flag in step with it.
    pub fn set_state(&self, state: &InterviewState) -> SurveyResult<()> {
        self.write(SessionKey::State, state)?;
        self.write(
            SessionKey::IsSelectingMember,
            &matches!(state, InterviewState::MemberList { .. }),
        )
    }

    pub fn is_selecting_member(&self) -> SurveyResult<bool> {
        self.read(SessionKey::IsSelectingMember)
    }

    // === Reanswer queue ===

    pub fn reanswer_queue(&self) -> SurveyResult<Vec<QuestionId>> {
        self.read(SessionKey::Reanswer)
    }

    /// Put questions at the head of the queue in the given order. Earlier
    /// entries for the same questions are dropped.
    pub fn queue_reanswer(&self, questions: &[QuestionId]) -> SurveyResult<()> {
        let mut queue: Vec<QuestionId> = Vec::with_capacity(questions.len());
        for question_id in questions {
            if !queue.contains(question_id) {
                queue.push(*question_id);
            }
        }
        queue.extend(
            self.reanswer_queue()?
                .into_iter()
                .filter(|q| !questions.contains(q)),
        );
        self.write(SessionKey::Reanswer, &queue)
    }

    pub fn remove_reanswer(&self, question_id: QuestionId) -> SurveyResult<()> {
        let mut queue = self.reanswer_queue()?;
        queue.retain(|q| *q != question_id);
        self.write(SessionKey::Reanswer, &queue)
    }

    // === Invalid answer markers ===

    pub fn invalid_answers(&self) -> SurveyResult<Vec<QuestionId>> {
        self.read(SessionKey::InvalidAnswer)
    }

    pub fn mark_invalid(&self, question_id: QuestionId) -> SurveyResult<()> {
        let mut marked = self.invalid_answers()?;
        if !marked.contains(&question_id) {
            marked.push(question_id);
            self.write(SessionKey::InvalidAnswer, &marked)?;
        }
        Ok(())
    }

    pub fn clear_invalid(&self, question_id: QuestionId) -> SurveyResult<()> {
        let mut marked = self.invalid_answers()?;
        marked.retain(|q| *q != question_id);
        self.write(SessionKey::InvalidAnswer, &marked)
    }

    // === End-interview confirmation ===

    pub fn awaiting_end_confirmation(&self, question_id: QuestionId) -> SurveyResult<bool> {
        let pending: Vec<QuestionId> = self.read(SessionKey::ConfirmEndInterview)?;
        Ok(pending.contains(&question_id))
    }

    pub fn request_end_confirmation(&self, question_id: QuestionId) -> SurveyResult<()> {
        let mut pending: Vec<QuestionId> = self.read(SessionKey::ConfirmEndInterview)?;
        if !pending.contains(&question_id) {
            pending.push(question_id);
            self.write(SessionKey::ConfirmEndInterview, &pending)?;
        }
        Ok(())
    }

    pub fn clear_end_confirmation(&self, question_id: QuestionId) -> SurveyResult<()> {
        let mut pending: Vec<QuestionId> = self.read(SessionKey::ConfirmEndInterview)?;
        pending.retain(|q| *q != question_id);
        self.write(SessionKey::ConfirmEndInterview, &pending)
    }

    /// Sub-mode of a pending question. End confirmation wins over reanswer.
    pub fn question_mode(&self, question_id: QuestionId) -> SurveyResult<QuestionMode> {
        if self.awaiting_end_confirmation(question_id)? {
            return Ok(QuestionMode::ConfirmEndInterview);
        }
        if self.reanswer_queue()?.contains(&question_id) {
            return Ok(QuestionMode::Reanswer);
        }
        Ok(QuestionMode::Normal)
    }

    // === Flags ===

    pub fn is_head(&self) -> SurveyResult<Option<bool>> {
        self.read(SessionKey::IsHead)
    }

    pub fn set_is_head(&self, is_head: bool) -> SurveyResult<()> {
        self.write(SessionKey::IsHead, &is_head)
    }

    pub fn is_registering_household(&self) -> SurveyResult<bool> {
        self.read(SessionKey::IsRegisteringHousehold)
    }

    pub fn set_registering_household(&self, value: bool) -> SurveyResult<()> {
        self.write(SessionKey::IsRegisteringHousehold, &value)
    }

    pub fn is_reporting_non_response(&self) -> SurveyResult<bool> {
        self.read(SessionKey::IsReportingNonResponse)
    }

    pub fn set_reporting_non_response(&self, value: bool) -> SurveyResult<()> {
        self.write(SessionKey::IsReportingNonResponse, &value)
    }

    /// Reset the flags owned by flows other than the interview.
    pub fn reset_side_flows(&self) -> SurveyResult<()> {
        self.reset(SessionKey::IsRegisteringHousehold)?;
        self.reset(SessionKey::IsReportingNonResponse)?;
        self.reset(SessionKey::RegistrationFields)
    }

    pub fn registration_fields(&self) -> SurveyResult<Map<String, Value>> {
        self.read(SessionKey::RegistrationFields)
    }

    pub fn set_registration_field(&self, field: &str, value: Value) -> SurveyResult<()> {
        let mut fields = self.registration_fields()?;
        fields.insert(field.to_string(), value);
        self.write(SessionKey::RegistrationFields, &fields)
    }

    // === Timing ===

    pub fn last_request_at(&self) -> SurveyResult<Option<Timestamp>> {
        self.read(SessionKey::LastRequestAt)
    }

    pub fn set_last_request_at(&self, at: Timestamp) -> SurveyResult<()> {
        self.write(SessionKey::LastRequestAt, &at)
    }

    // === Resets ===

    /// Drop reanswer, invalid-answer and end-confirmation markers.
    pub fn clear_interview_markers(&self) -> SurveyResult<()> {
        self.reset(SessionKey::Reanswer)?;
        self.reset(SessionKey::InvalidAnswer)?;
        self.reset(SessionKey::ConfirmEndInterview)
    }

    /// Reset every key to its default except `keep`.
    pub fn clear_except(&self, keep: SessionKey) -> SurveyResult<()> {
        for key in SessionKey::ALL.into_iter().filter(|k| *k != keep) {
            self.reset(key)?;
        }
        Ok(())
    }

    /// Drop the whole session.
    pub fn clear(&self) -> SurveyResult<()> {
        self.backend.delete(self.investigator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::{EntityIdType, HouseholdId};
    use survey_storage::InMemorySessionBackend;

    fn setup() -> (InMemorySessionBackend, InvestigatorId) {
        (InMemorySessionBackend::new(), InvestigatorId::now_v7())
    }

    #[test]
    fn test_generate_fills_defaults() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        session.generate().unwrap();

        assert_eq!(backend.keys(investigator_id).unwrap().len(), SessionKey::ALL.len());
        assert_eq!(session.state().unwrap(), InterviewState::Home);
        assert!(session.reanswer_queue().unwrap().is_empty());
        assert_eq!(session.is_head().unwrap(), None);
        assert!(session.last_request_at().unwrap().is_none());
    }

    #[test]
    fn test_generate_keeps_existing_values() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        session.set_state(&InterviewState::HouseholdList { page: 3 }).unwrap();
        session.generate().unwrap();
        assert_eq!(session.state().unwrap(), InterviewState::HouseholdList { page: 3 });
    }

    #[test]
    fn test_undecodable_value_reads_default() {
        let (backend, investigator_id) = setup();
        backend
            .set(investigator_id, SessionKey::State.as_str(), json!({"state": "bogus"}))
            .unwrap();
        backend
            .set(investigator_id, SessionKey::Reanswer.as_str(), json!("not a list"))
            .unwrap();
        let session = SessionCache::new(&backend, investigator_id);
        assert_eq!(session.state().unwrap(), InterviewState::Home);
        assert!(session.reanswer_queue().unwrap().is_empty());
    }

    #[test]
    fn test_set_state_mirrors_selecting_member() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        session
            .set_state(&InterviewState::MemberList {
                household_id: HouseholdId::now_v7(),
                page: 1,
            })
            .unwrap();
        assert!(session.is_selecting_member().unwrap());
        session.set_state(&InterviewState::HouseholdList { page: 1 }).unwrap();
        assert!(!session.is_selecting_member().unwrap());
    }

    #[test]
    fn test_reanswer_queue_puts_new_targets_first() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        let q1 = QuestionId::now_v7();
        let q2 = QuestionId::now_v7();
        let q3 = QuestionId::now_v7();
        session.queue_reanswer(&[q3]).unwrap();
        session.queue_reanswer(&[q1, q2, q1]).unwrap();
        assert_eq!(session.reanswer_queue().unwrap(), vec![q1, q2, q3]);

        session.queue_reanswer(&[q2]).unwrap();
        assert_eq!(session.reanswer_queue().unwrap(), vec![q2, q1, q3]);
        assert_eq!(session.question_mode(q2).unwrap(), QuestionMode::Reanswer);

        session.remove_reanswer(q1).unwrap();
        assert_eq!(session.reanswer_queue().unwrap(), vec![q2, q3]);
        assert_eq!(session.question_mode(q1).unwrap(), QuestionMode::Normal);
    }

    #[test]
    fn test_end_confirmation_takes_precedence() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        let q = QuestionId::now_v7();
        session.queue_reanswer(&[q]).unwrap();
        session.request_end_confirmation(q).unwrap();
        assert_eq!(session.question_mode(q).unwrap(), QuestionMode::ConfirmEndInterview);
        session.clear_end_confirmation(q).unwrap();
        assert!(!session.awaiting_end_confirmation(q).unwrap());
    }

    #[test]
    fn test_clear_except_preserves_state() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        let q = QuestionId::now_v7();
        let state = InterviewState::HouseholdList { page: 2 };
        session.set_state(&state).unwrap();
        session.mark_invalid(q).unwrap();
        session.set_registering_household(true).unwrap();
        session.set_is_head(true).unwrap();

        session.clear_except(SessionKey::State).unwrap();

        assert_eq!(session.state().unwrap(), state);
        assert!(session.invalid_answers().unwrap().is_empty());
        assert!(!session.is_registering_household().unwrap());
        assert_eq!(session.is_head().unwrap(), None);
    }

    #[test]
    fn test_reset_side_flows() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        session.set_registering_household(true).unwrap();
        session.set_reporting_non_response(true).unwrap();
        session.set_registration_field("surname", json!("Okello")).unwrap();
        assert_eq!(session.registration_fields().unwrap()["surname"], json!("Okello"));

        session.reset_side_flows().unwrap();
        assert!(!session.is_registering_household().unwrap());
        assert!(!session.is_reporting_non_response().unwrap());
        assert!(session.registration_fields().unwrap().is_empty());
    }

    #[test]
    fn test_clear_drops_session() {
        let (backend, investigator_id) = setup();
        let session = SessionCache::new(&backend, investigator_id);
        session.set_last_request_at(chrono::Utc::now()).unwrap();
        session.clear().unwrap();
        assert!(backend.keys(investigator_id).unwrap().is_empty());
        assert!(session.last_request_at().unwrap().is_none());
    }
}
