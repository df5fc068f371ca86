//! Survey Storage - Storage Traits and Mock Implementation
//!
//! Defines the data-access abstraction the interview engine reads and writes
//! through, plus the session-variable backend. Production deployments plug in
//! their own database; `MockStorage` and `InMemorySessionBackend` serve tests
//! and embedded use.

pub mod session;

pub use session::{session_namespace, InMemorySessionBackend, SessionBackend, SessionStats};

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use survey_core::{
    matching_groups, Answer, AnswerId, AnswerRule, Batch, BatchId, BatchQuestion,
    CompletionId, CompletionRecord, CompletionSubject, EntityIdType, EntityType, Household,
    HouseholdId, HouseholdMember, Investigator, InvestigatorId, LocationId, MemberGroup,
    MemberId, Question, QuestionId, QuestionOption, StorageError, SurveyError, SurveyId,
    SurveyResult,
};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Data access for survey entities.
///
/// List operations return entities in the order the interview presents them;
/// implementations must keep ties in insertion order.
pub trait SurveyStore: Send + Sync {
    // === Investigator Operations ===

    /// Insert a new investigator.
    fn investigator_insert(&self, i: &Investigator) -> SurveyResult<()>;

    /// Get an investigator by ID.
    fn investigator_get(&self, id: InvestigatorId) -> SurveyResult<Option<Investigator>>;

    /// Find the investigator registered under a national-format mobile number.
    fn investigator_get_by_mobile(&self, mobile_number: &str) -> SurveyResult<Option<Investigator>>;

    // === Household Operations ===

    /// Insert a new household.
    fn household_insert(&self, h: &Household) -> SurveyResult<()>;

    /// Get a household by ID.
    fn household_get(&self, id: HouseholdId) -> SurveyResult<Option<Household>>;

    /// Delete a household and its members.
    fn household_delete(&self, id: HouseholdId) -> SurveyResult<()>;

    /// Households of an investigator, oldest first, optionally limited to
    /// one survey.
    fn household_list_by_investigator(
        &self,
        investigator_id: InvestigatorId,
        survey_id: Option<SurveyId>,
    ) -> SurveyResult<Vec<Household>>;

    // === Member Operations ===

    /// Insert a new household member.
    fn member_insert(&self, m: &HouseholdMember) -> SurveyResult<()>;

    /// Get a member by ID.
    fn member_get(&self, id: MemberId) -> SurveyResult<Option<HouseholdMember>>;

    /// Delete a member.
    fn member_delete(&self, id: MemberId) -> SurveyResult<()>;

    /// Members of a household: the head first, then registration order.
    fn member_list_by_household(
        &self,
        household_id: HouseholdId,
    ) -> SurveyResult<Vec<HouseholdMember>>;

    // === Group Operations ===

    /// Insert a new member group.
    fn group_insert(&self, g: &MemberGroup) -> SurveyResult<()>;

    /// All member groups by ascending order.
    fn group_list(&self) -> SurveyResult<Vec<MemberGroup>>;

    // === Batch Operations ===

    /// Insert a new batch.
    fn batch_insert(&self, b: &Batch) -> SurveyResult<()>;

    /// Get a batch by ID.
    fn batch_get(&self, id: BatchId) -> SurveyResult<Option<Batch>>;

    /// Open a batch for a location. Opening twice is a no-op.
    fn batch_open(&self, batch_id: BatchId, location_id: LocationId) -> SurveyResult<()>;

    /// Close a batch for a location. Closing a closed batch is a no-op.
    fn batch_close(&self, batch_id: BatchId, location_id: LocationId) -> SurveyResult<()>;

    /// Batches open at a location, by ascending batch order.
    fn batch_list_open(&self, location_id: LocationId) -> SurveyResult<Vec<Batch>>;

    // === Question Operations ===

    /// Insert a new question.
    fn question_insert(&self, q: &Question) -> SurveyResult<()>;

    /// Get a question by ID.
    fn question_get(&self, id: QuestionId) -> SurveyResult<Option<Question>>;

    /// Delete a question.
    fn question_delete(&self, id: QuestionId) -> SurveyResult<()>;

    /// Place a question in a batch at the given order.
    fn batch_question_assign(&self, entry: BatchQuestion) -> SurveyResult<()>;

    /// Questions of a batch by ascending order, ties by assignment order.
    fn batch_question_list(&self, batch_id: BatchId) -> SurveyResult<Vec<Question>>;

    /// Insert a multichoice option.
    fn option_insert(&self, o: &QuestionOption) -> SurveyResult<()>;

    /// Options of a question by ascending order.
    fn option_list(&self, question_id: QuestionId) -> SurveyResult<Vec<QuestionOption>>;

    /// Insert an answer rule.
    fn rule_insert(&self, r: &AnswerRule) -> SurveyResult<()>;

    /// Rules of a question by ascending priority, then creation.
    fn rule_list(&self, question_id: QuestionId) -> SurveyResult<Vec<AnswerRule>>;

    // === Answer Operations ===

    /// Insert an answer record.
    fn answer_insert(&self, a: &Answer) -> SurveyResult<()>;

    /// Delete an answer record.
    fn answer_delete(&self, id: AnswerId) -> SurveyResult<()>;

    /// Answers of a member within a batch, in insertion order.
    fn answer_list_by_member(
        &self,
        member_id: MemberId,
        batch_id: BatchId,
    ) -> SurveyResult<Vec<Answer>>;

    /// Latest answer a member gave to a question, in any batch.
    fn answer_latest_for_member(
        &self,
        member_id: MemberId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>>;

    /// Latest answer an investigator recorded for a question.
    fn answer_latest_by_investigator(
        &self,
        investigator_id: InvestigatorId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>>;

    /// Most recent answer the investigator recorded for any question.
    fn answer_last_by_investigator(
        &self,
        investigator_id: InvestigatorId,
    ) -> SurveyResult<Option<Answer>>;

    // === Completion Operations ===

    /// Insert a completion record.
    fn completion_insert(&self, c: &CompletionRecord) -> SurveyResult<()>;

    /// Completion record of a subject for a batch.
    fn completion_get(
        &self,
        subject: CompletionSubject,
        batch_id: BatchId,
    ) -> SurveyResult<Option<CompletionRecord>>;

    /// Delete a completion record.
    fn completion_delete(&self, id: CompletionId) -> SurveyResult<()>;

    // === Derived Queries ===

    /// Batch questions targeted at a group the member belongs to on `today`,
    /// in batch order.
    fn applicable_questions(
        &self,
        batch_id: BatchId,
        member: &HouseholdMember,
        today: NaiveDate,
    ) -> SurveyResult<Vec<Question>> {
        let groups = self.group_list()?;
        let member_groups = matching_groups(&groups, &member.profile(today));
        Ok(self
            .batch_question_list(batch_id)?
            .into_iter()
            .filter(|q| member_groups.contains(&q.group_id))
            .collect())
    }
}

// ============================================================================
// LOCK HELPERS
// ============================================================================

pub(crate) fn read_guard<T>(lock: &RwLock<T>) -> SurveyResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| SurveyError::Storage(StorageError::LockPoisoned))
}

pub(crate) fn write_guard<T>(lock: &RwLock<T>) -> SurveyResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| SurveyError::Storage(StorageError::LockPoisoned))
}

fn already_exists(entity_type: EntityType) -> SurveyError {
    SurveyError::Storage(StorageError::InsertFailed {
        entity_type,
        reason: "already exists".to_string(),
    })
}

fn not_found(entity_type: EntityType, id: uuid::Uuid) -> SurveyError {
    SurveyError::Storage(StorageError::NotFound { entity_type, id })
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory storage for tests and embedding.
///
/// Ordered collections are kept as vectors so that ties keep insertion order.
#[derive(Debug, Default)]
pub struct MockStorage {
    investigators: Arc<RwLock<HashMap<InvestigatorId, Investigator>>>,
    households: Arc<RwLock<Vec<Household>>>,
    members: Arc<RwLock<Vec<HouseholdMember>>>,
    groups: Arc<RwLock<Vec<MemberGroup>>>,
    batches: Arc<RwLock<HashMap<BatchId, Batch>>>,
    open_batches: Arc<RwLock<HashSet<(BatchId, LocationId)>>>,
    questions: Arc<RwLock<HashMap<QuestionId, Question>>>,
    batch_questions: Arc<RwLock<Vec<BatchQuestion>>>,
    options: Arc<RwLock<Vec<QuestionOption>>>,
    rules: Arc<RwLock<Vec<AnswerRule>>>,
    answers: Arc<RwLock<Vec<Answer>>>,
    completions: Arc<RwLock<Vec<CompletionRecord>>>,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of stored answers.
    pub fn answer_count(&self) -> SurveyResult<usize> {
        Ok(read_guard(&self.answers)?.len())
    }

    /// Get count of stored completion records.
    pub fn completion_count(&self) -> SurveyResult<usize> {
        Ok(read_guard(&self.completions)?.len())
    }

    /// Shift every answer of an investigator back in time.
    pub fn backdate_answers(
        &self,
        investigator_id: InvestigatorId,
        by: chrono::Duration,
    ) -> SurveyResult<()> {
        let mut answers = write_guard(&self.answers)?;
        for answer in answers.iter_mut().filter(|a| a.investigator_id == investigator_id) {
            answer.created_at -= by;
        }
        Ok(())
    }

    /// Shift every completion record of a subject back in time.
    pub fn backdate_completions(
        &self,
        subject: CompletionSubject,
        by: chrono::Duration,
    ) -> SurveyResult<()> {
        let mut completions = write_guard(&self.completions)?;
        for record in completions.iter_mut().filter(|c| c.subject == subject) {
            record.created_at -= by;
        }
        Ok(())
    }
}

impl SurveyStore for MockStorage {
    // === Investigator Operations ===

    fn investigator_insert(&self, i: &Investigator) -> SurveyResult<()> {
        let mut investigators = write_guard(&self.investigators)?;
        if investigators.contains_key(&i.investigator_id) {
            return Err(already_exists(EntityType::Investigator));
        }
        investigators.insert(i.investigator_id, i.clone());
        Ok(())
    }

    fn investigator_get(&self, id: InvestigatorId) -> SurveyResult<Option<Investigator>> {
        Ok(read_guard(&self.investigators)?.get(&id).cloned())
    }

    fn investigator_get_by_mobile(
        &self,
        mobile_number: &str,
    ) -> SurveyResult<Option<Investigator>> {
        Ok(read_guard(&self.investigators)?
            .values()
            .find(|i| i.mobile_number == mobile_number)
            .cloned())
    }

    // === Household Operations ===

    fn household_insert(&self, h: &Household) -> SurveyResult<()> {
        let mut households = write_guard(&self.households)?;
        if households.iter().any(|x| x.household_id == h.household_id) {
            return Err(already_exists(EntityType::Household));
        }
        households.push(h.clone());
        Ok(())
    }

    fn household_get(&self, id: HouseholdId) -> SurveyResult<Option<Household>> {
        Ok(read_guard(&self.households)?
            .iter()
            .find(|h| h.household_id == id)
            .cloned())
    }

    fn household_delete(&self, id: HouseholdId) -> SurveyResult<()> {
        let mut households = write_guard(&self.households)?;
        let before = households.len();
        households.retain(|h| h.household_id != id);
        if households.len() == before {
            return Err(not_found(EntityType::Household, id.as_uuid()));
        }
        write_guard(&self.members)?.retain(|m| m.household_id != id);
        Ok(())
    }

    fn household_list_by_investigator(
        &self,
        investigator_id: InvestigatorId,
        survey_id: Option<SurveyId>,
    ) -> SurveyResult<Vec<Household>> {
        let mut households: Vec<Household> = read_guard(&self.households)?
            .iter()
            .filter(|h| h.investigator_id == investigator_id)
            .filter(|h| match survey_id {
                Some(id) => h.survey_id == id,
                None => true,
            })
            .cloned()
            .collect();
        households.sort_by_key(|h| h.created_at);
        Ok(households)
    }

    // === Member Operations ===

    fn member_insert(&self, m: &HouseholdMember) -> SurveyResult<()> {
        let mut members = write_guard(&self.members)?;
        if members.iter().any(|x| x.member_id == m.member_id) {
            return Err(already_exists(EntityType::Member));
        }
        members.push(m.clone());
        Ok(())
    }

    fn member_get(&self, id: MemberId) -> SurveyResult<Option<HouseholdMember>> {
        Ok(read_guard(&self.members)?
            .iter()
            .find(|m| m.member_id == id)
            .cloned())
    }

    fn member_delete(&self, id: MemberId) -> SurveyResult<()> {
        let mut members = write_guard(&self.members)?;
        let before = members.len();
        members.retain(|m| m.member_id != id);
        if members.len() == before {
            return Err(not_found(EntityType::Member, id.as_uuid()));
        }
        Ok(())
    }

    fn member_list_by_household(
        &self,
        household_id: HouseholdId,
    ) -> SurveyResult<Vec<HouseholdMember>> {
        let mut members: Vec<HouseholdMember> = read_guard(&self.members)?
            .iter()
            .filter(|m| m.household_id == household_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| (!m.is_head(), m.created_at));
        Ok(members)
    }

    // === Group Operations ===

    fn group_insert(&self, g: &MemberGroup) -> SurveyResult<()> {
        let mut groups = write_guard(&self.groups)?;
        if groups.iter().any(|x| x.group_id == g.group_id) {
            return Err(already_exists(EntityType::MemberGroup));
        }
        groups.push(g.clone());
        Ok(())
    }

    fn group_list(&self) -> SurveyResult<Vec<MemberGroup>> {
        let mut groups = read_guard(&self.groups)?.clone();
        groups.sort_by_key(|g| g.order);
        Ok(groups)
    }

    // === Batch Operations ===

    fn batch_insert(&self, b: &Batch) -> SurveyResult<()> {
        let mut batches = write_guard(&self.batches)?;
        if batches.contains_key(&b.batch_id) {
            return Err(already_exists(EntityType::Batch));
        }
        batches.insert(b.batch_id, b.clone());
        Ok(())
    }

    fn batch_get(&self, id: BatchId) -> SurveyResult<Option<Batch>> {
        Ok(read_guard(&self.batches)?.get(&id).cloned())
    }

    fn batch_open(&self, batch_id: BatchId, location_id: LocationId) -> SurveyResult<()> {
        if !read_guard(&self.batches)?.contains_key(&batch_id) {
            return Err(not_found(EntityType::Batch, batch_id.as_uuid()));
        }
        write_guard(&self.open_batches)?.insert((batch_id, location_id));
        Ok(())
    }

    fn batch_close(&self, batch_id: BatchId, location_id: LocationId) -> SurveyResult<()> {
        write_guard(&self.open_batches)?.remove(&(batch_id, location_id));
        Ok(())
    }

    fn batch_list_open(&self, location_id: LocationId) -> SurveyResult<Vec<Batch>> {
        let open = read_guard(&self.open_batches)?;
        let mut batches: Vec<Batch> = read_guard(&self.batches)?
            .values()
            .filter(|b| open.contains(&(b.batch_id, location_id)))
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.order, b.created_at, b.batch_id));
        Ok(batches)
    }

    // === Question Operations ===

    fn question_insert(&self, q: &Question) -> SurveyResult<()> {
        let mut questions = write_guard(&self.questions)?;
        if questions.contains_key(&q.question_id) {
            return Err(already_exists(EntityType::Question));
        }
        questions.insert(q.question_id, q.clone());
        Ok(())
    }

    fn question_get(&self, id: QuestionId) -> SurveyResult<Option<Question>> {
        Ok(read_guard(&self.questions)?.get(&id).cloned())
    }

    fn question_delete(&self, id: QuestionId) -> SurveyResult<()> {
        if write_guard(&self.questions)?.remove(&id).is_none() {
            return Err(not_found(EntityType::Question, id.as_uuid()));
        }
        write_guard(&self.batch_questions)?.retain(|bq| bq.question_id != id);
        Ok(())
    }

    fn batch_question_assign(&self, entry: BatchQuestion) -> SurveyResult<()> {
        if !read_guard(&self.questions)?.contains_key(&entry.question_id) {
            return Err(not_found(EntityType::Question, entry.question_id.as_uuid()));
        }
        let mut batch_questions = write_guard(&self.batch_questions)?;
        batch_questions
            .retain(|bq| !(bq.batch_id == entry.batch_id && bq.question_id == entry.question_id));
        batch_questions.push(entry);
        Ok(())
    }

    fn batch_question_list(&self, batch_id: BatchId) -> SurveyResult<Vec<Question>> {
        let mut entries: Vec<BatchQuestion> = read_guard(&self.batch_questions)?
            .iter()
            .filter(|bq| bq.batch_id == batch_id)
            .copied()
            .collect();
        entries.sort_by_key(|bq| bq.order);
        let questions = read_guard(&self.questions)?;
        Ok(entries
            .iter()
            .filter_map(|bq| questions.get(&bq.question_id).cloned())
            .collect())
    }

    fn option_insert(&self, o: &QuestionOption) -> SurveyResult<()> {
        let mut options = write_guard(&self.options)?;
        if options.iter().any(|x| x.option_id == o.option_id) {
            return Err(already_exists(EntityType::QuestionOption));
        }
        options.push(o.clone());
        Ok(())
    }

    fn option_list(&self, question_id: QuestionId) -> SurveyResult<Vec<QuestionOption>> {
        let mut options: Vec<QuestionOption> = read_guard(&self.options)?
            .iter()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| o.order);
        Ok(options)
    }

    fn rule_insert(&self, r: &AnswerRule) -> SurveyResult<()> {
        let mut rules = write_guard(&self.rules)?;
        if rules.iter().any(|x| x.rule_id == r.rule_id) {
            return Err(already_exists(EntityType::AnswerRule));
        }
        rules.push(r.clone());
        Ok(())
    }

    fn rule_list(&self, question_id: QuestionId) -> SurveyResult<Vec<AnswerRule>> {
        let mut rules: Vec<AnswerRule> = read_guard(&self.rules)?
            .iter()
            .filter(|r| r.question_id == question_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.priority, r.created_at));
        Ok(rules)
    }

    // === Answer Operations ===

    fn answer_insert(&self, a: &Answer) -> SurveyResult<()> {
        let mut answers = write_guard(&self.answers)?;
        if answers.iter().any(|x| x.answer_id == a.answer_id) {
            return Err(already_exists(EntityType::Answer));
        }
        answers.push(a.clone());
        Ok(())
    }

    fn answer_delete(&self, id: AnswerId) -> SurveyResult<()> {
        let mut answers = write_guard(&self.answers)?;
        let before = answers.len();
        answers.retain(|a| a.answer_id != id);
        if answers.len() == before {
            return Err(not_found(EntityType::Answer, id.as_uuid()));
        }
        Ok(())
    }

    fn answer_list_by_member(
        &self,
        member_id: MemberId,
        batch_id: BatchId,
    ) -> SurveyResult<Vec<Answer>> {
        Ok(read_guard(&self.answers)?
            .iter()
            .filter(|a| a.member_id == member_id && a.batch_id == batch_id)
            .cloned()
            .collect())
    }

    fn answer_latest_for_member(
        &self,
        member_id: MemberId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>> {
        // max_by_key keeps the last of equal keys, so same-instant ties go to
        // the most recently inserted record.
        Ok(read_guard(&self.answers)?
            .iter()
            .filter(|a| a.member_id == member_id && a.question_id == question_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    fn answer_latest_by_investigator(
        &self,
        investigator_id: InvestigatorId,
        question_id: QuestionId,
    ) -> SurveyResult<Option<Answer>> {
        Ok(read_guard(&self.answers)?
            .iter()
            .filter(|a| a.investigator_id == investigator_id && a.question_id == question_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    fn answer_last_by_investigator(
        &self,
        investigator_id: InvestigatorId,
    ) -> SurveyResult<Option<Answer>> {
        Ok(read_guard(&self.answers)?
            .iter()
            .filter(|a| a.investigator_id == investigator_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    // === Completion Operations ===

    fn completion_insert(&self, c: &CompletionRecord) -> SurveyResult<()> {
        let mut completions = write_guard(&self.completions)?;
        if completions.iter().any(|x| x.completion_id == c.completion_id) {
            return Err(already_exists(EntityType::Completion));
        }
        completions.push(c.clone());
        Ok(())
    }

    fn completion_get(
        &self,
        subject: CompletionSubject,
        batch_id: BatchId,
    ) -> SurveyResult<Option<CompletionRecord>> {
        Ok(read_guard(&self.completions)?
            .iter()
            .filter(|c| c.subject == subject && c.batch_id == batch_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    fn completion_delete(&self, id: CompletionId) -> SurveyResult<()> {
        let mut completions = write_guard(&self.completions)?;
        let before = completions.len();
        completions.retain(|c| c.completion_id != id);
        if completions.len() == before {
            return Err(not_found(EntityType::Completion, id.as_uuid()));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
