//! Answer Store: typed answer records on top of [`SurveyStore`].

use crate::pagination::paginate;
use survey_core::{
    Answer, AnswerId, AnswerType, AnswerValue, BatchId, EntityIdType, HouseholdMember,
    InterviewError, InvestigatorId, MemberId, Question, QuestionId, QuestionOption, SurveyResult,
    Timestamp, ValidationError,
};
use survey_storage::SurveyStore;

pub struct AnswerStore<'a, S: SurveyStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SurveyStore + ?Sized> AnswerStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Record an answer. The value variant must match the question type.
    pub fn create_answer(
        &self,
        question: &Question,
        investigator_id: InvestigatorId,
        member: &HouseholdMember,
        batch_id: BatchId,
        value: AnswerValue,
        at: Timestamp,
    ) -> SurveyResult<Answer> {
        if value.answer_type() != question.answer_type {
            return Err(ValidationError::InvalidValue {
                field: "value".to_string(),
                reason: format!(
                    "{} answer given to {} question {}",
                    value.answer_type(),
                    question.answer_type,
                    question.identifier
                ),
            }
            .into());
        }

        let answer = Answer {
            answer_id: AnswerId::now_v7(),
            investigator_id,
            question_id: question.question_id,
            member_id: member.member_id,
            household_id: member.household_id,
            batch_id,
            value,
            created_at: at,
        };
        self.store.answer_insert(&answer)?;

        tracing::info!(
            investigator_id = %investigator_id,
            question_id = %question.question_id,
            member_id = %member.member_id,
            batch_id = %batch_id,
            "Recorded answer"
        );
        Ok(answer)
    }

    /// Latest answer the investigator recorded for a question.
    pub fn latest_answer(
        &self,
        investigator_id: InvestigatorId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>> {
        self.store
            .answer_latest_by_investigator(investigator_id, question_id)
    }

    pub fn latest_for_member(
        &self,
        member_id: MemberId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>> {
        self.store.answer_latest_for_member(member_id, question_id)
    }

    pub fn delete_answer(&self, answer: &Answer) -> SurveyResult<()> {
        self.store.answer_delete(answer.answer_id)
    }

    /// Delete the member's latest answer to a question, returning it.
    pub fn delete_latest_for_member(
        &self,
        member_id: MemberId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>> {
        let latest = self.latest_for_member(member_id, question_id)?;
        if let Some(answer) = &latest {
            self.delete_answer(answer)?;
            tracing::debug!(
                member_id = %member_id,
                question_id = %question_id,
                "Deleted answer for re-collection"
            );
        }
        Ok(latest)
    }

    /// Whether the member has answered the question within the batch.
    pub fn is_answered(
        &self,
        member_id: MemberId,
        question_id: QuestionId,
        batch_id: BatchId,
    ) -> SurveyResult<bool> {
        Ok(self
            .store
            .answer_list_by_member(member_id, batch_id)?
            .iter()
            .any(|a| a.question_id == question_id))
    }

    /// Timestamp of the investigator's most recent answer.
    pub fn last_answered_at(
        &self,
        investigator_id: InvestigatorId,
    ) -> SurveyResult<Option<Timestamp>> {
        Ok(self
            .store
            .answer_last_by_investigator(investigator_id)?
            .map(|a| a.created_at))
    }
}

/// Validate raw input against a question's answer type.
///
/// Multichoice input selects an option on the displayed `option_page`,
/// either by the label shown or by its position on the page.
pub fn parse_answer(
    question: &Question,
    options: &[QuestionOption],
    option_page: usize,
    options_per_page: usize,
    raw: &str,
) -> Result<AnswerValue, InterviewError> {
    let raw = raw.trim();
    let invalid = |reason: &str| InterviewError::InvalidAnswer {
        question_id: question.question_id.as_uuid(),
        reason: reason.to_string(),
    };

    match question.answer_type {
        AnswerType::Number => raw
            .parse::<i64>()
            .map(AnswerValue::Number)
            .map_err(|_| invalid("expected a whole number")),
        AnswerType::Text => {
            if raw.is_empty() {
                Err(invalid("answer must not be empty"))
            } else {
                Ok(AnswerValue::Text(raw.to_string()))
            }
        }
        AnswerType::MultiChoice => {
            let number: usize = raw.parse().map_err(|_| invalid("expected an option number"))?;
            let page = paginate(options, option_page, options_per_page);
            let option = page
                .select(number)
                .ok_or_else(|| invalid("option not on this page"))?;
            Ok(AnswerValue::Choice {
                option_id: option.option_id,
                order: option.order,
                text: option.text.clone(),
            })
        }
    }
}
