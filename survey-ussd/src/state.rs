//! Explicit interview state persisted between requests.

use serde::{Deserialize, Serialize};
use survey_core::{BatchId, HouseholdId, MemberId, QuestionId, Timestamp};

/// Position of a pending question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionCursor {
    pub household_id: HouseholdId,
    pub member_id: MemberId,
    pub batch_id: BatchId,
    pub question_id: QuestionId,
    /// Option page for multichoice questions, 1-based.
    pub option_page: usize,
}

impl QuestionCursor {
    pub fn new(
        household_id: HouseholdId,
        member_id: MemberId,
        batch_id: BatchId,
        question_id: QuestionId,
    ) -> Self {
        Self {
            household_id,
            member_id,
            batch_id,
            question_id,
            option_page: 1,
        }
    }

    pub fn with_option_page(mut self, option_page: usize) -> Self {
        self.option_page = option_page.max(1);
        self
    }
}

/// Sub-mode of a pending question, derived from session markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionMode {
    Normal,
    /// The question is queued for re-collection
    Reanswer,
    /// The last answer would end the interview and awaits confirmation
    ConfirmEndInterview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    NoHouseholds,
    AllHouseholdsComplete,
    NotRegistered,
}

/// Where an investigator is in the interview.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InterviewState {
    #[default]
    Home,
    HouseholdList {
        page: usize,
    },
    MemberList {
        household_id: HouseholdId,
        page: usize,
    },
    AskingQuestion(QuestionCursor),
    HouseholdComplete {
        household_id: HouseholdId,
    },
    ResumePrompt {
        resume_to: Box<InterviewState>,
        /// Last activity before the prompt was shown.
        #[serde(default)]
        last_active: Option<Timestamp>,
    },
    Terminal {
        reason: TerminalReason,
    },
}

impl InterviewState {
    /// Mid-interview states that a fresh dial offers to resume.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            InterviewState::MemberList { .. }
                | InterviewState::AskingQuestion(_)
                | InterviewState::HouseholdComplete { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            InterviewState::Home => "home",
            InterviewState::HouseholdList { .. } => "household_list",
            InterviewState::MemberList { .. } => "member_list",
            InterviewState::AskingQuestion(_) => "asking_question",
            InterviewState::HouseholdComplete { .. } => "household_complete",
            InterviewState::ResumePrompt { .. } => "resume_prompt",
            InterviewState::Terminal { .. } => "terminal",
        }
    }

    /// Household the state refers to, if any.
    pub fn household_id(&self) -> Option<HouseholdId> {
        match self {
            InterviewState::MemberList { household_id, .. }
            | InterviewState::HouseholdComplete { household_id } => Some(*household_id),
            InterviewState::AskingQuestion(cursor) => Some(cursor.household_id),
            InterviewState::ResumePrompt { resume_to, .. } => resume_to.household_id(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use survey_core::EntityIdType;

    #[test]
    fn test_default_state_serializes_as_home() {
        let value = serde_json::to_value(InterviewState::default()).unwrap();
        assert_eq!(value, json!({"state": "home"}));
    }

    #[test]
    fn test_state_json_shape() {
        let value = serde_json::to_value(InterviewState::HouseholdList { page: 2 }).unwrap();
        assert_eq!(value, json!({"state": "household_list", "page": 2}));

        let terminal = InterviewState::Terminal {
            reason: TerminalReason::NoHouseholds,
        };
        let value = serde_json::to_value(&terminal).unwrap();
        assert_eq!(value["reason"], json!("no_households"));
    }

    #[test]
    fn test_nested_resume_state_decodes() {
        let cursor = QuestionCursor::new(
            HouseholdId::now_v7(),
            MemberId::now_v7(),
            BatchId::now_v7(),
            QuestionId::now_v7(),
        )
        .with_option_page(2);
        let state = InterviewState::ResumePrompt {
            resume_to: Box::new(InterviewState::AskingQuestion(cursor)),
            last_active: Some(chrono::Utc::now()),
        };
        let value = serde_json::to_value(&state).unwrap();
        let decoded: InterviewState = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.household_id(), Some(cursor.household_id));
    }

    #[test]
    fn test_resume_prompt_without_timestamp_decodes() {
        let value = json!({
            "state": "resume_prompt",
            "resume_to": {"state": "household_list", "page": 1}
        });
        let decoded: InterviewState = serde_json::from_value(value).unwrap();
        assert_eq!(
            decoded,
            InterviewState::ResumePrompt {
                resume_to: Box::new(InterviewState::HouseholdList { page: 1 }),
                last_active: None,
            }
        );
    }

    #[test]
    fn test_resumable_states() {
        let household_id = HouseholdId::now_v7();
        assert!(InterviewState::MemberList { household_id, page: 1 }.is_resumable());
        assert!(InterviewState::HouseholdComplete { household_id }.is_resumable());
        assert!(!InterviewState::Home.is_resumable());
        assert!(!InterviewState::HouseholdList { page: 1 }.is_resumable());
        assert!(!InterviewState::Terminal {
            reason: TerminalReason::AllHouseholdsComplete
        }
        .is_resumable());
    }

    #[test]
    fn test_option_page_never_zero() {
        let cursor = QuestionCursor::new(
            HouseholdId::nil(),
            MemberId::nil(),
            BatchId::nil(),
            QuestionId::nil(),
        )
        .with_option_page(0);
        assert_eq!(cursor.option_page, 1);
    }
}
