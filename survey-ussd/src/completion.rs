//! Completion Tracker: member and household completion per batch.

use chrono::NaiveDate;
use survey_core::{
    Batch, BatchId, CompletionRecord, CompletionSubject, HouseholdId, HouseholdMember,
    InvestigatorId, MemberId, SurveyResult, Timestamp,
};
use survey_storage::SurveyStore;

pub struct CompletionTracker<'a, S: SurveyStore + ?Sized> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S: SurveyStore + ?Sized> CompletionTracker<'a, S> {
    pub fn new(store: &'a S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    fn mark(
        &self,
        subject: CompletionSubject,
        batch_id: BatchId,
        investigator_id: InvestigatorId,
        now: Timestamp,
    ) -> SurveyResult<bool> {
        if self.store.completion_get(subject, batch_id)?.is_some() {
            return Ok(false);
        }
        self.store
            .completion_insert(&CompletionRecord::new(subject, batch_id, investigator_id, now))?;
        tracing::info!(
            subject = %subject,
            batch_id = %batch_id,
            investigator_id = %investigator_id,
            "Recorded completion"
        );
        Ok(true)
    }

    /// Record that the member finished the batch. Returns false when a record
    /// already existed.
    pub fn mark_member_complete(
        &self,
        member_id: MemberId,
        batch_id: BatchId,
        investigator_id: InvestigatorId,
        now: Timestamp,
    ) -> SurveyResult<bool> {
        self.mark(CompletionSubject::Member(member_id), batch_id, investigator_id, now)
    }

    /// Record that the household finished the batch. Returns false when a
    /// record already existed.
    pub fn mark_household_complete(
        &self,
        household_id: HouseholdId,
        batch_id: BatchId,
        investigator_id: InvestigatorId,
        now: Timestamp,
    ) -> SurveyResult<bool> {
        self.mark(
            CompletionSubject::Household(household_id),
            batch_id,
            investigator_id,
            now,
        )
    }

    pub fn is_member_complete(&self, member_id: MemberId, batch_id: BatchId) -> SurveyResult<bool> {
        Ok(self
            .store
            .completion_get(CompletionSubject::Member(member_id), batch_id)?
            .is_some())
    }

    pub fn is_household_complete(
        &self,
        household_id: HouseholdId,
        batch_id: BatchId,
    ) -> SurveyResult<bool> {
        Ok(self
            .store
            .completion_get(CompletionSubject::Household(household_id), batch_id)?
            .is_some())
    }

    /// True when there is no record, or the record is at least
    /// `timeout_minutes` old.
    pub fn can_retake(
        &self,
        subject: CompletionSubject,
        batch_id: BatchId,
        timeout_minutes: i64,
        now: Timestamp,
    ) -> SurveyResult<bool> {
        Ok(match self.store.completion_get(subject, batch_id)? {
            Some(record) => record.is_older_than(timeout_minutes, now),
            None => true,
        })
    }

    /// Clear the subject's answers and completion for a batch.
    ///
    /// A member retake also clears its household's record, since the
    /// household is no longer complete. A household retake covers all members.
    pub fn retake(&self, subject: CompletionSubject, batch_id: BatchId) -> SurveyResult<()> {
        match subject {
            CompletionSubject::Member(member_id) => {
                self.clear_member(member_id, batch_id)?;
                if let Some(member) = self.store.member_get(member_id)? {
                    self.clear_record(CompletionSubject::Household(member.household_id), batch_id)?;
                }
            }
            CompletionSubject::Household(household_id) => {
                for member in self.store.member_list_by_household(household_id)? {
                    self.clear_member(member.member_id, batch_id)?;
                }
                self.clear_record(subject, batch_id)?;
            }
        }
        tracing::info!(subject = %subject, batch_id = %batch_id, "Retake started");
        Ok(())
    }

    fn clear_member(&self, member_id: MemberId, batch_id: BatchId) -> SurveyResult<()> {
        for answer in self.store.answer_list_by_member(member_id, batch_id)? {
            self.store.answer_delete(answer.answer_id)?;
        }
        self.clear_record(CompletionSubject::Member(member_id), batch_id)
    }

    fn clear_record(&self, subject: CompletionSubject, batch_id: BatchId) -> SurveyResult<()> {
        while let Some(record) = self.store.completion_get(subject, batch_id)? {
            self.store.completion_delete(record.completion_id)?;
        }
        Ok(())
    }

    /// A member is done with a batch when it has a completion record or no
    /// applicable questions in it.
    pub fn member_done(&self, member: &HouseholdMember, batch_id: BatchId) -> SurveyResult<bool> {
        if self.is_member_complete(member.member_id, batch_id)? {
            return Ok(true);
        }
        Ok(self
            .store
            .applicable_questions(batch_id, member, self.today)?
            .is_empty())
    }

    pub fn household_done(
        &self,
        household_id: HouseholdId,
        batch_id: BatchId,
    ) -> SurveyResult<bool> {
        if self.is_household_complete(household_id, batch_id)? {
            return Ok(true);
        }
        for member in self.store.member_list_by_household(household_id)? {
            if !self.member_done(&member, batch_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Done with every given batch. Nothing is done when no batch is open.
    pub fn member_done_for_open_batches(
        &self,
        member: &HouseholdMember,
        batches: &[Batch],
    ) -> SurveyResult<bool> {
        if batches.is_empty() {
            return Ok(false);
        }
        for batch in batches {
            if !self.member_done(member, batch.batch_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn household_done_for_open_batches(
        &self,
        household_id: HouseholdId,
        batches: &[Batch],
    ) -> SurveyResult<bool> {
        if batches.is_empty() {
            return Ok(false);
        }
        for batch in batches {
            if !self.household_done(household_id, batch.batch_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Record household completion for every batch the household has
    /// finished, then report whether it finished all of them.
    pub fn record_household_progress(
        &self,
        household_id: HouseholdId,
        batches: &[Batch],
        investigator_id: InvestigatorId,
        now: Timestamp,
    ) -> SurveyResult<bool> {
        let mut all_done = !batches.is_empty();
        for batch in batches {
            if self.household_done(household_id, batch.batch_id)? {
                self.mark_household_complete(household_id, batch.batch_id, investigator_id, now)?;
            } else {
                all_done = false;
            }
        }
        Ok(all_done)
    }
}
