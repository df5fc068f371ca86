//! Question Graph: ordered, applicable questions per member and batch.
//!
//! Nothing here is cached. Every answer is derived from the store so the
//! pending question can be recomputed on any request.

use crate::rules::{first_match, RuleOutcome};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use survey_core::{
    AnswerRule, AnswerValue, Batch, BatchId, CompletionSubject, HouseholdMember, MemberId,
    Question, QuestionId, SurveyResult,
};
use survey_storage::SurveyStore;

pub struct QuestionGraph<'a, S: SurveyStore + ?Sized> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S: SurveyStore + ?Sized> QuestionGraph<'a, S> {
    /// `today` drives age-based group membership.
    pub fn new(store: &'a S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    pub fn applicable_questions(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
    ) -> SurveyResult<Vec<Question>> {
        self.store.applicable_questions(batch_id, member, self.today)
    }

    pub fn first_question(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
    ) -> SurveyResult<Option<Question>> {
        Ok(self.applicable_questions(batch_id, member)?.into_iter().next())
    }

    fn answered(
        &self,
        member_id: MemberId,
        batch_id: BatchId,
    ) -> SurveyResult<HashSet<QuestionId>> {
        Ok(self
            .store
            .answer_list_by_member(member_id, batch_id)?
            .into_iter()
            .map(|a| a.question_id)
            .collect())
    }

    /// First unanswered applicable question after `after` in batch order.
    /// Starts from the top when `after` is not applicable to the member.
    pub fn next_after(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
        after: QuestionId,
    ) -> SurveyResult<Option<Question>> {
        let questions = self.applicable_questions(batch_id, member)?;
        let answered = self.answered(member.member_id, batch_id)?;
        let start = questions
            .iter()
            .position(|q| q.question_id == after)
            .map_or(0, |i| i + 1);
        Ok(questions
            .into_iter()
            .skip(start)
            .find(|q| !answered.contains(&q.question_id)))
    }

    /// First unanswered applicable question at or after a skip target.
    /// `None` when the target is not an applicable question of the batch.
    pub fn skip_target(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
        target: QuestionId,
    ) -> SurveyResult<Option<Question>> {
        let questions = self.applicable_questions(batch_id, member)?;
        let Some(start) = questions.iter().position(|q| q.question_id == target) else {
            return Ok(None);
        };
        let answered = self.answered(member.member_id, batch_id)?;
        Ok(questions
            .into_iter()
            .skip(start)
            .find(|q| !answered.contains(&q.question_id)))
    }

    /// First rule of the question, by priority, that fires for `value`.
    /// Question-comparing conditions read the member's latest answer.
    pub fn matching_rule(
        &self,
        question_id: QuestionId,
        member_id: MemberId,
        value: &AnswerValue,
    ) -> SurveyResult<Option<AnswerRule>> {
        let rules = self.store.rule_list(question_id)?;
        let matched = first_match(&rules, value, |referenced| {
            Ok(self
                .store
                .answer_latest_for_member(member_id, referenced)?
                .map(|a| a.value))
        })?;
        Ok(matched.cloned())
    }

    /// Re-derive the member's pending question in a batch from the store.
    ///
    /// A completed member has none. Otherwise it is the first applicable
    /// question, in batch order, that has no answer and that no answered
    /// question's skip rule jumps over. Answers deleted for reconfirmation
    /// therefore come back as pending even when the session is lost.
    pub fn pending_question(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
    ) -> SurveyResult<Option<Question>> {
        if self
            .store
            .completion_get(CompletionSubject::Member(member.member_id), batch_id)?
            .is_some()
        {
            return Ok(None);
        }

        let questions = self.applicable_questions(batch_id, member)?;
        let mut answers = self.store.answer_list_by_member(member.member_id, batch_id)?;
        answers.sort_by_key(|a| a.created_at);
        let latest: HashMap<QuestionId, AnswerValue> = answers
            .into_iter()
            .map(|a| (a.question_id, a.value))
            .collect();

        let mut skipped = HashSet::new();
        for (position, question) in questions.iter().enumerate() {
            let Some(value) = latest.get(&question.question_id) else {
                continue;
            };
            let Some(rule) = self.matching_rule(question.question_id, member.member_id, value)?
            else {
                continue;
            };
            if let RuleOutcome::SkipTo(target) = RuleOutcome::of(&rule) {
                if let Some(end) = questions.iter().position(|q| q.question_id == target) {
                    if end > position {
                        skipped.extend(questions[position + 1..end].iter().map(|q| q.question_id));
                    }
                }
            }
        }

        Ok(questions.into_iter().find(|q| {
            !latest.contains_key(&q.question_id) && !skipped.contains(&q.question_id)
        }))
    }

    /// Pending question in the first batch, in the given order, that has one.
    pub fn next_in_batches(
        &self,
        batches: &[Batch],
        member: &HouseholdMember,
    ) -> SurveyResult<Option<(BatchId, Question)>> {
        for batch in batches {
            if let Some(question) = self.pending_question(batch.batch_id, member)? {
                return Ok(Some((batch.batch_id, question)));
            }
        }
        Ok(None)
    }

    /// First batch in which the question applies to the member.
    pub fn locate(
        &self,
        batches: &[Batch],
        member: &HouseholdMember,
        question_id: QuestionId,
    ) -> SurveyResult<Option<BatchId>> {
        for batch in batches {
            if self
                .applicable_questions(batch.batch_id, member)?
                .iter()
                .any(|q| q.question_id == question_id)
            {
                return Ok(Some(batch.batch_id));
            }
        }
        Ok(None)
    }
}
