//! Interview State Machine.
//!
//! Every USSD request is handled from scratch: the investigator's position is
//! read from the session cache, cross-checked against the store, and the
//! next screen is rendered before the new state is persisted.
//!
//! # Flow
//!
//! ```text
//! Home -> HouseholdList -> MemberList -> AskingQuestion -> ... -> MemberList
//!                                     \-> HouseholdComplete -> MemberList | HouseholdList
//! ```
//!
//! A fresh dial into a mid-interview state, or a reply after the inactivity
//! window, goes through `ResumePrompt` first.

use crate::answers::{parse_answer, AnswerStore};
use crate::completion::CompletionTracker;
use crate::graph::QuestionGraph;
use crate::menus::{self, HouseholdEntry, MemberEntry};
use crate::messages;
use crate::pagination::{next_page, paginate, previous_page};
use crate::rules::RuleOutcome;
use crate::session::{SessionCache, SessionKey};
use crate::state::{InterviewState, QuestionCursor, QuestionMode, TerminalReason};
use crate::ussd::{normalize_msisdn, Confirmation, MenuInput, UssdRequest, UssdResponse};
use chrono::NaiveDate;
use survey_core::{
    AnswerType, AnswerValue, Batch, BatchId, CompletionSubject, EntityId, EntityIdType, EntityType,
    Household, HouseholdId, HouseholdMember, InterviewError, Investigator, InvestigatorId, Question,
    QuestionId, SurveyError, SurveyResult, Timestamp, UssdConfig,
};
use survey_storage::{SessionBackend, SurveyStore};

// ============================================================================
// ENGINE
// ============================================================================

/// USSD interview engine over a survey store and a session backend.
pub struct UssdInterview<'a, S: SurveyStore + ?Sized, B: SessionBackend + ?Sized> {
    store: &'a S,
    sessions: &'a B,
    config: UssdConfig,
}

impl<'a, S: SurveyStore + ?Sized, B: SessionBackend + ?Sized> UssdInterview<'a, S, B> {
    pub fn new(store: &'a S, sessions: &'a B) -> Self {
        Self {
            store,
            sessions,
            config: UssdConfig::default(),
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: UssdConfig) -> SurveyResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &UssdConfig {
        &self.config
    }

    /// Answer one USSD request. Never fails: backend errors end the session
    /// with a service-unavailable message.
    pub fn handle(&self, request: &UssdRequest) -> UssdResponse {
        match self.process(request) {
            Ok(response) => response,
            Err(e) if e.is_backend_failure() => {
                tracing::error!(
                    error = %e,
                    transaction_id = %request.transaction_id,
                    "Backend failure while processing USSD request"
                );
                UssdResponse::end(messages::SERVICE_UNAVAILABLE)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    transaction_id = %request.transaction_id,
                    "Failed to process USSD request"
                );
                UssdResponse::end(messages::SERVICE_UNAVAILABLE)
            }
        }
    }

    fn process(&self, request: &UssdRequest) -> SurveyResult<UssdResponse> {
        let mobile = normalize_msisdn(&request.msisdn, &self.config.country_phone_code);
        let Some(investigator) = self.store.investigator_get_by_mobile(&mobile)? else {
            tracing::info!(
                msisdn = %mobile,
                transaction_id = %request.transaction_id,
                "Request from unregistered number"
            );
            return Ok(terminal_response(TerminalReason::NotRegistered));
        };
        if investigator.is_blocked {
            tracing::info!(
                investigator_id = %investigator.investigator_id,
                "Blocked investigator dialled in"
            );
            return Ok(UssdResponse::end(messages::INVESTIGATOR_BLOCKED));
        }

        let turn = Turn {
            store: self.store,
            config: &self.config,
            session: SessionCache::new(self.sessions, investigator.investigator_id),
            investigator,
            now: request.received_at,
            today: request.received_at.date_naive(),
        };
        turn.session.generate()?;
        let response = turn.dispatch(request)?;
        turn.session.set_last_request_at(request.received_at)?;
        Ok(response)
    }
}

fn terminal_response(reason: TerminalReason) -> UssdResponse {
    UssdResponse::end(match reason {
        TerminalReason::NoHouseholds => messages::NO_HOUSEHOLDS,
        TerminalReason::AllHouseholdsComplete => messages::ALL_HOUSEHOLDS_COMPLETE,
        TerminalReason::NotRegistered => messages::USER_NOT_REGISTERED,
    })
}

/// Fallback when a state refers to something that no longer exists.
fn stable_ancestor(state: &InterviewState) -> InterviewState {
    match state {
        InterviewState::AskingQuestion(cursor) => InterviewState::MemberList {
            household_id: cursor.household_id,
            page: 1,
        },
        _ => InterviewState::HouseholdList { page: 1 },
    }
}

/// Input on a paged list: another page or an entry of the current one.
enum ListChoice<'e, T> {
    Page(usize),
    Entry(&'e T),
}

fn list_choice<'e, T>(
    items: &'e [T],
    page: usize,
    per_page: usize,
    input: &str,
    config: &UssdConfig,
) -> Result<ListChoice<'e, T>, InterviewError> {
    let choice = match MenuInput::parse(input, config) {
        MenuInput::Next => Some(ListChoice::Page(next_page(page, items.len(), per_page))),
        MenuInput::Previous => Some(ListChoice::Page(previous_page(page))),
        MenuInput::Number(n) => paginate(items, page, per_page)
            .select(n)
            .map(ListChoice::Entry),
        MenuInput::Other => None,
    };
    choice.ok_or_else(|| invalid_selection(input))
}

fn invalid_selection(input: &str) -> InterviewError {
    InterviewError::InvalidSelection {
        input: input.trim().to_string(),
    }
}

// ============================================================================
// REQUEST HANDLING
// ============================================================================

/// One request for one investigator.
struct Turn<'t, S: SurveyStore + ?Sized, B: SessionBackend + ?Sized> {
    store: &'t S,
    config: &'t UssdConfig,
    investigator: Investigator,
    session: SessionCache<'t, B>,
    now: Timestamp,
    today: NaiveDate,
}

impl<'t, S: SurveyStore + ?Sized, B: SessionBackend + ?Sized> Turn<'t, S, B> {
    fn graph(&self) -> QuestionGraph<'t, S> {
        QuestionGraph::new(self.store, self.today)
    }

    fn tracker(&self) -> CompletionTracker<'t, S> {
        CompletionTracker::new(self.store, self.today)
    }

    fn answers(&self) -> AnswerStore<'t, S> {
        AnswerStore::new(self.store)
    }

    fn investigator_id(&self) -> InvestigatorId {
        self.investigator.investigator_id
    }

    fn dispatch(&self, request: &UssdRequest) -> SurveyResult<UssdResponse> {
        let state = self.session.state()?;
        if !request.is_continuation {
            return self.on_dial(state);
        }
        if state.is_resumable() && self.timed_out()? {
            tracing::info!(
                investigator_id = %self.investigator_id(),
                state = state.name(),
                "Reply after inactivity window, offering resume"
            );
            return self.prompt_resume(state);
        }

        let input = request.input();
        match state {
            InterviewState::Home => self.on_home(input),
            InterviewState::HouseholdList { page } => self.on_household_list(page, input),
            InterviewState::MemberList { household_id, page } => {
                self.on_member_list(household_id, page, input)
            }
            InterviewState::AskingQuestion(cursor) => self.on_answer(cursor, input),
            InterviewState::HouseholdComplete { household_id } => {
                self.on_household_complete(household_id, input)
            }
            InterviewState::ResumePrompt {
                resume_to,
                last_active,
            } => self.on_resume(*resume_to, last_active, input),
            InterviewState::Terminal { .. } => self.enter(state),
        }
    }

    // === Timing ===

    /// Latest of the previous request and the last recorded answer.
    fn last_activity(&self) -> SurveyResult<Option<Timestamp>> {
        let last_request = self.session.last_request_at()?;
        let last_answer = self.answers().last_answered_at(self.investigator_id())?;
        Ok(last_request.max(last_answer))
    }

    fn timed_out(&self) -> SurveyResult<bool> {
        Ok(match self.last_activity()? {
            Some(at) => self.now - at > self.config.timeout(),
            None => false,
        })
    }

    // === Data ===

    fn open_batches(&self) -> SurveyResult<Vec<Batch>> {
        match self.investigator.location_id {
            Some(location_id) => self.store.batch_list_open(location_id),
            None => Ok(Vec::new()),
        }
    }

    /// Open batches of the household's survey.
    fn household_batches(&self, household: &Household) -> SurveyResult<Vec<Batch>> {
        Ok(self
            .open_batches()?
            .into_iter()
            .filter(|b| b.survey_id == household.survey_id)
            .collect())
    }

    /// Households with a head whose survey has an open batch.
    fn household_entries(&self) -> SurveyResult<Vec<HouseholdEntry>> {
        let batches = self.open_batches()?;
        let tracker = self.tracker();
        let mut entries = Vec::new();
        for household in self
            .store
            .household_list_by_investigator(self.investigator_id(), None)?
        {
            let survey_batches: Vec<Batch> = batches
                .iter()
                .filter(|b| b.survey_id == household.survey_id)
                .cloned()
                .collect();
            if survey_batches.is_empty() {
                continue;
            }
            let members = self.store.member_list_by_household(household.household_id)?;
            let Some(head) = members.iter().find(|m| m.is_head()) else {
                continue;
            };
            let complete =
                tracker.household_done_for_open_batches(household.household_id, &survey_batches)?;
            entries.push(HouseholdEntry {
                head_surname: head.surname.clone(),
                household,
                complete,
            });
        }
        Ok(entries)
    }

    fn member_entries(&self, household: &Household) -> SurveyResult<Vec<MemberEntry>> {
        let batches = self.household_batches(household)?;
        let tracker = self.tracker();
        let mut entries = Vec::new();
        for member in self.store.member_list_by_household(household.household_id)? {
            let complete = tracker.member_done_for_open_batches(&member, &batches)?;
            entries.push(MemberEntry { member, complete });
        }
        Ok(entries)
    }

    fn household(&self, household_id: HouseholdId) -> SurveyResult<Household> {
        self.store.household_get(household_id)?.ok_or_else(|| {
            InterviewError::InconsistentState {
                entity_type: EntityType::Household,
                id: household_id.as_uuid(),
            }
            .into()
        })
    }

    // === Rendering ===

    fn render(&self, state: &InterviewState) -> SurveyResult<UssdResponse> {
        match state {
            InterviewState::Home => Ok(UssdResponse::request(messages::welcome(
                &self.investigator.name,
                &self.config.households_menu_key,
            ))),
            InterviewState::HouseholdList { page } => {
                let entries = self.household_entries()?;
                if entries.is_empty() {
                    return Err(InterviewError::NoData {
                        reason: "no eligible households".to_string(),
                    }
                    .into());
                }
                Ok(UssdResponse::request(menus::household_list(
                    &entries,
                    *page,
                    self.config,
                )))
            }
            InterviewState::MemberList { household_id, page } => {
                let household = self.household(*household_id)?;
                let entries = self.member_entries(&household)?;
                Ok(UssdResponse::request(menus::member_list(
                    &entries,
                    *page,
                    self.config,
                )))
            }
            InterviewState::AskingQuestion(cursor) => self.render_question(cursor),
            InterviewState::HouseholdComplete { household_id } => {
                self.household(*household_id)?;
                Ok(UssdResponse::request(menus::confirmation(
                    messages::HOUSEHOLD_COMPLETION,
                    self.config,
                )))
            }
            InterviewState::ResumePrompt { .. } => Ok(UssdResponse::request(
                menus::confirmation(messages::RESUME, self.config),
            )),
            InterviewState::Terminal { reason } => Ok(terminal_response(*reason)),
        }
    }

    fn render_question(&self, cursor: &QuestionCursor) -> SurveyResult<UssdResponse> {
        let inconsistent = |entity_type: EntityType, id: EntityId| -> SurveyError {
            InterviewError::InconsistentState { entity_type, id }.into()
        };
        if self.store.member_get(cursor.member_id)?.is_none() {
            return Err(inconsistent(EntityType::Member, cursor.member_id.as_uuid()));
        }
        let question = self
            .store
            .question_get(cursor.question_id)?
            .ok_or_else(|| inconsistent(EntityType::Question, cursor.question_id.as_uuid()))?;
        let options = self.store.option_list(question.question_id)?;
        let text = menus::question_prompt(&question, &options, cursor.option_page, self.config);
        let response = UssdResponse::request(text);
        Ok(match self.session.question_mode(question.question_id)? {
            QuestionMode::Normal => response,
            QuestionMode::Reanswer | QuestionMode::ConfirmEndInterview => {
                response.with_prefix(messages::RECONFIRM)
            }
        })
    }

    /// Render `state` and persist it. States pointing at deleted entities
    /// fall back to their stable ancestor; missing data ends the session.
    fn enter(&self, state: InterviewState) -> SurveyResult<UssdResponse> {
        match self.render(&state) {
            Ok(response) => {
                self.session.set_state(&state)?;
                tracing::debug!(
                    investigator_id = %self.investigator_id(),
                    state = state.name(),
                    "Entered state"
                );
                Ok(response)
            }
            Err(SurveyError::Interview(InterviewError::InconsistentState { entity_type, id })) => {
                tracing::warn!(
                    investigator_id = %self.investigator_id(),
                    entity_type = %entity_type,
                    id = %id,
                    state = state.name(),
                    "Session refers to a missing entity, falling back"
                );
                self.enter(stable_ancestor(&state))
            }
            Err(SurveyError::Interview(InterviewError::NoData { reason })) => {
                tracing::info!(
                    investigator_id = %self.investigator_id(),
                    reason = %reason,
                    "Nothing to interview"
                );
                self.enter(InterviewState::Terminal {
                    reason: TerminalReason::NoHouseholds,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn enter_with_prefix(&self, state: InterviewState, prefix: &str) -> SurveyResult<UssdResponse> {
        Ok(self.enter(state)?.with_prefix(prefix))
    }

    fn ask(
        &self,
        household_id: HouseholdId,
        member: &HouseholdMember,
        batch_id: BatchId,
        question_id: QuestionId,
    ) -> SurveyResult<UssdResponse> {
        self.enter(InterviewState::AskingQuestion(QuestionCursor::new(
            household_id,
            member.member_id,
            batch_id,
            question_id,
        )))
    }

    // === Dial and resume ===

    fn on_dial(&self, state: InterviewState) -> SurveyResult<UssdResponse> {
        if state.is_resumable() {
            return self.prompt_resume(state);
        }
        if let InterviewState::ResumePrompt { .. } = state {
            return self.enter(state);
        }
        if self.household_entries()?.is_empty() {
            return self.enter(InterviewState::Terminal {
                reason: TerminalReason::NoHouseholds,
            });
        }
        self.session.clear()?;
        self.session.generate()?;
        self.enter(InterviewState::Home)
    }

    fn prompt_resume(&self, state: InterviewState) -> SurveyResult<UssdResponse> {
        let last_active = self.last_activity()?;
        self.enter(InterviewState::ResumePrompt {
            resume_to: Box::new(state),
            last_active,
        })
    }

    fn on_resume(
        &self,
        resume_to: InterviewState,
        last_active: Option<Timestamp>,
        input: &str,
    ) -> SurveyResult<UssdResponse> {
        match Confirmation::parse(input, self.config) {
            Some(Confirmation::Yes) => {
                let recent = last_active.is_some_and(|at| self.now - at <= self.config.timeout());
                if recent {
                    self.restore(resume_to)
                } else {
                    self.enter(InterviewState::HouseholdList { page: 1 })
                }
            }
            Some(Confirmation::No) => {
                self.session.clear_except(SessionKey::State)?;
                match resume_to.household_id() {
                    Some(household_id) => self.enter(InterviewState::MemberList {
                        household_id,
                        page: 1,
                    }),
                    None => self.enter(InterviewState::HouseholdList { page: 1 }),
                }
            }
            None => self.reject(
                InterviewState::ResumePrompt {
                    resume_to: Box::new(resume_to),
                    last_active,
                },
                invalid_selection(input),
            ),
        }
    }

    /// Return to a saved position. A pending question is re-derived.
    fn restore(&self, state: InterviewState) -> SurveyResult<UssdResponse> {
        let InterviewState::AskingQuestion(cursor) = state else {
            return self.enter(state);
        };
        let Some(household) = self.store.household_get(cursor.household_id)? else {
            return self.enter(InterviewState::HouseholdList { page: 1 });
        };
        let Some(member) = self.store.member_get(cursor.member_id)? else {
            return self.enter(stable_ancestor(&state));
        };
        let batches = self.household_batches(&household)?;
        self.advance_member(&household, &member, &batches)
    }

    // === Menus ===

    fn on_home(&self, input: &str) -> SurveyResult<UssdResponse> {
        if input == self.config.households_menu_key {
            self.enter(InterviewState::HouseholdList { page: 1 })
        } else {
            self.reject(InterviewState::Home, invalid_selection(input))
        }
    }

    fn on_household_list(&self, page: usize, input: &str) -> SurveyResult<UssdResponse> {
        let entries = self.household_entries()?;
        let per_page = self.config.households_per_page;
        match list_choice(&entries, page, per_page, input, self.config) {
            Ok(ListChoice::Page(page)) => self.enter(InterviewState::HouseholdList { page }),
            Ok(ListChoice::Entry(entry)) => self.enter(InterviewState::MemberList {
                household_id: entry.household.household_id,
                page: 1,
            }),
            Err(e) => self.reject(InterviewState::HouseholdList { page }, e),
        }
    }

    fn on_member_list(
        &self,
        household_id: HouseholdId,
        page: usize,
        input: &str,
    ) -> SurveyResult<UssdResponse> {
        let Some(household) = self.store.household_get(household_id)? else {
            return self.enter(InterviewState::MemberList { household_id, page });
        };
        let members = self.store.member_list_by_household(household_id)?;
        let per_page = self.config.members_per_page;
        match list_choice(&members, page, per_page, input, self.config) {
            Ok(ListChoice::Page(page)) => {
                self.enter(InterviewState::MemberList { household_id, page })
            }
            Ok(ListChoice::Entry(member)) => self.start_member(&household, member),
            Err(e) => self.reject(InterviewState::MemberList { household_id, page }, e),
        }
    }

    /// Re-show `state` after input it cannot accept.
    fn reject(&self, state: InterviewState, error: InterviewError) -> SurveyResult<UssdResponse> {
        tracing::debug!(
            investigator_id = %self.investigator_id(),
            state = state.name(),
            error = %error,
            "Rejected selection"
        );
        self.enter_with_prefix(state, messages::INVALID_SELECTION)
    }

    fn on_household_complete(
        &self,
        household_id: HouseholdId,
        input: &str,
    ) -> SurveyResult<UssdResponse> {
        match Confirmation::parse(input, self.config) {
            Some(Confirmation::Yes) => {
                let entries = self.household_entries()?;
                let start = entries
                    .iter()
                    .position(|e| e.household.household_id == household_id)
                    .map_or(0, |i| i + 1);
                let next = entries
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(entries.len())
                    .find(|e| !e.complete && e.household.household_id != household_id);
                match next {
                    Some(entry) => self.enter(InterviewState::MemberList {
                        household_id: entry.household.household_id,
                        page: 1,
                    }),
                    None => {
                        tracing::info!(
                            investigator_id = %self.investigator_id(),
                            "All households complete"
                        );
                        self.session.clear()?;
                        self.session.generate()?;
                        self.enter(InterviewState::Terminal {
                            reason: TerminalReason::AllHouseholdsComplete,
                        })
                    }
                }
            }
            Some(Confirmation::No) => self.enter(InterviewState::HouseholdList { page: 1 }),
            None => self.reject(
                InterviewState::HouseholdComplete { household_id },
                invalid_selection(input),
            ),
        }
    }

    // === Interview ===

    fn start_member(
        &self,
        household: &Household,
        member: &HouseholdMember,
    ) -> SurveyResult<UssdResponse> {
        self.session.clear_interview_markers()?;
        self.session.reset_side_flows()?;
        self.session.set_is_head(member.is_head())?;

        let batches = self.household_batches(household)?;
        if batches.is_empty() {
            return self.enter(InterviewState::Terminal {
                reason: TerminalReason::NoHouseholds,
            });
        }

        let graph = self.graph();
        if let Some((batch_id, question)) = graph.next_in_batches(&batches, member)? {
            return self.ask(household.household_id, member, batch_id, question.question_id);
        }

        let tracker = self.tracker();
        let subject = CompletionSubject::Member(member.member_id);
        for batch in &batches {
            if tracker.is_member_complete(member.member_id, batch.batch_id)?
                && tracker.can_retake(
                    subject,
                    batch.batch_id,
                    self.config.timeout_minutes,
                    self.now,
                )?
            {
                tracker.retake(subject, batch.batch_id)?;
                if let Some(question) = graph.pending_question(batch.batch_id, member)? {
                    return self.ask(
                        household.household_id,
                        member,
                        batch.batch_id,
                        question.question_id,
                    );
                }
            }
        }

        self.finish_member(household, member, &batches)
    }

    fn on_answer(&self, cursor: QuestionCursor, input: &str) -> SurveyResult<UssdResponse> {
        let Some(household) = self.store.household_get(cursor.household_id)? else {
            return self.enter(InterviewState::HouseholdList { page: 1 });
        };
        let Some(member) = self.store.member_get(cursor.member_id)? else {
            return self.enter(InterviewState::MemberList {
                household_id: household.household_id,
                page: 1,
            });
        };
        let batches = self.household_batches(&household)?;
        if !batches.iter().any(|b| b.batch_id == cursor.batch_id) {
            tracing::info!(
                investigator_id = %self.investigator_id(),
                batch_id = %cursor.batch_id,
                "Batch closed mid-interview, re-deriving position"
            );
            return self.advance_member(&household, &member, &batches);
        }
        let Some(question) = self.store.question_get(cursor.question_id)? else {
            return self.enter(InterviewState::AskingQuestion(cursor));
        };
        let options = self.store.option_list(question.question_id)?;

        if question.answer_type == AnswerType::MultiChoice {
            let per_page = self.config.options_per_page;
            match MenuInput::parse(input, self.config) {
                MenuInput::Next => {
                    let page = next_page(cursor.option_page, options.len(), per_page);
                    return self.enter(InterviewState::AskingQuestion(
                        cursor.with_option_page(page),
                    ));
                }
                MenuInput::Previous => {
                    let page = previous_page(cursor.option_page);
                    return self.enter(InterviewState::AskingQuestion(
                        cursor.with_option_page(page),
                    ));
                }
                MenuInput::Number(_) | MenuInput::Other => {}
            }
        }

        let question_id = question.question_id;
        let queued = self.session.reanswer_queue()?.contains(&question_id);
        if !queued
            && self
                .answers()
                .is_answered(member.member_id, question_id, cursor.batch_id)?
        {
            tracing::debug!(
                investigator_id = %self.investigator_id(),
                question_id = %question_id,
                "Question already answered, regenerating position"
            );
            return self.advance_member(&household, &member, &batches);
        }

        let value = match parse_answer(
            &question,
            &options,
            cursor.option_page,
            self.config.options_per_page,
            input,
        ) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(
                    investigator_id = %self.investigator_id(),
                    question_id = %question_id,
                    error = %e,
                    "Invalid answer"
                );
                self.session.mark_invalid(question_id)?;
                return self.enter_with_prefix(
                    InterviewState::AskingQuestion(cursor),
                    messages::INVALID_ANSWER,
                );
            }
        };
        self.session.clear_invalid(question_id)?;

        self.apply_answer(&household, &member, &batches, cursor, &question, value)
    }

    /// Rule handling and sequencing for a valid answer.
    fn apply_answer(
        &self,
        household: &Household,
        member: &HouseholdMember,
        batches: &[Batch],
        cursor: QuestionCursor,
        question: &Question,
        value: AnswerValue,
    ) -> SurveyResult<UssdResponse> {
        let question_id = question.question_id;
        let graph = self.graph();
        let rule = graph.matching_rule(question_id, member.member_id, &value)?;
        let outcome = rule.as_ref().map(RuleOutcome::of);

        let awaiting_end = self.session.awaiting_end_confirmation(question_id)?;
        if awaiting_end {
            self.session.clear_end_confirmation(question_id)?;
        }

        match &outcome {
            Some(RuleOutcome::EndInterview) if !awaiting_end => {
                self.session.request_end_confirmation(question_id)?;
                tracing::info!(
                    investigator_id = %self.investigator_id(),
                    question_id = %question_id,
                    "End of interview requested, awaiting confirmation"
                );
                return self.enter(InterviewState::AskingQuestion(cursor.with_option_page(1)));
            }
            Some(RuleOutcome::EndInterview) => {
                self.record(question, member, cursor.batch_id, value)?;
                self.session.remove_reanswer(question_id)?;
                self.tracker().mark_member_complete(
                    member.member_id,
                    cursor.batch_id,
                    self.investigator_id(),
                    self.now,
                )?;
                tracing::info!(
                    investigator_id = %self.investigator_id(),
                    member_id = %member.member_id,
                    batch_id = %cursor.batch_id,
                    "Interview ended by rule"
                );
                return self.advance_member(household, member, batches);
            }
            Some(RuleOutcome::Reanswer(targets)) => {
                let confirming_itself = rule
                    .as_ref()
                    .is_some_and(|r| r.condition.referenced_question().is_none())
                    && self.session.reanswer_queue()?.contains(&question_id);
                if !confirming_itself {
                    let answers = self.answers();
                    for target in targets {
                        answers.delete_latest_for_member(member.member_id, *target)?;
                    }
                    self.session.queue_reanswer(targets)?;
                    tracing::info!(
                        investigator_id = %self.investigator_id(),
                        question_id = %question_id,
                        queued = targets.len(),
                        "Answer queued for reconfirmation"
                    );
                    return self.ask_next_queued(household, member, batches, cursor);
                }
            }
            _ => {}
        }

        self.record(question, member, cursor.batch_id, value)?;
        self.session.remove_reanswer(question_id)?;

        if let Some(RuleOutcome::SkipTo(target)) = &outcome {
            if self.session.reanswer_queue()?.is_empty() {
                if let Some(next) = graph.skip_target(cursor.batch_id, member, *target)? {
                    return self.ask(
                        household.household_id,
                        member,
                        cursor.batch_id,
                        next.question_id,
                    );
                }
                tracing::warn!(
                    question_id = %question_id,
                    target = %target,
                    "Skip target not applicable, following batch order"
                );
            }
        }

        if let Some((batch_id, next)) = self.next_queued(member, batches)? {
            return self.ask(household.household_id, member, batch_id, next);
        }
        let next = match graph.next_after(cursor.batch_id, member, question_id)? {
            Some(next) => Some(next),
            None => graph.pending_question(cursor.batch_id, member)?,
        };
        if let Some(next) = next {
            return self.ask(household.household_id, member, cursor.batch_id, next.question_id);
        }

        self.tracker().mark_member_complete(
            member.member_id,
            cursor.batch_id,
            self.investigator_id(),
            self.now,
        )?;
        self.advance_member(household, member, batches)
    }

    fn record(
        &self,
        question: &Question,
        member: &HouseholdMember,
        batch_id: BatchId,
        value: AnswerValue,
    ) -> SurveyResult<()> {
        self.answers()
            .create_answer(question, self.investigator_id(), member, batch_id, value, self.now)?;
        Ok(())
    }

    /// Head of the reanswer queue with the batch it belongs to. Entries that
    /// no longer apply to the member are dropped.
    fn next_queued(
        &self,
        member: &HouseholdMember,
        batches: &[Batch],
    ) -> SurveyResult<Option<(BatchId, QuestionId)>> {
        let graph = self.graph();
        for question_id in self.session.reanswer_queue()? {
            match graph.locate(batches, member, question_id)? {
                Some(batch_id) => return Ok(Some((batch_id, question_id))),
                None => self.session.remove_reanswer(question_id)?,
            }
        }
        Ok(None)
    }

    fn ask_next_queued(
        &self,
        household: &Household,
        member: &HouseholdMember,
        batches: &[Batch],
        cursor: QuestionCursor,
    ) -> SurveyResult<UssdResponse> {
        match self.next_queued(member, batches)? {
            Some((batch_id, question_id)) => {
                self.ask(household.household_id, member, batch_id, question_id)
            }
            None => self.enter(InterviewState::AskingQuestion(cursor.with_option_page(1))),
        }
    }

    /// Next question for the member: queued reanswers first, then the first
    /// pending question across batches.
    fn advance_member(
        &self,
        household: &Household,
        member: &HouseholdMember,
        batches: &[Batch],
    ) -> SurveyResult<UssdResponse> {
        if let Some((batch_id, question_id)) = self.next_queued(member, batches)? {
            return self.ask(household.household_id, member, batch_id, question_id);
        }
        if let Some((batch_id, question)) = self.graph().next_in_batches(batches, member)? {
            return self.ask(household.household_id, member, batch_id, question.question_id);
        }
        self.finish_member(household, member, batches)
    }

    fn finish_member(
        &self,
        household: &Household,
        member: &HouseholdMember,
        batches: &[Batch],
    ) -> SurveyResult<UssdResponse> {
        let graph = self.graph();
        let tracker = self.tracker();
        for batch in batches {
            if !graph.applicable_questions(batch.batch_id, member)?.is_empty() {
                tracker.mark_member_complete(
                    member.member_id,
                    batch.batch_id,
                    self.investigator_id(),
                    self.now,
                )?;
            }
        }
        self.session.clear_interview_markers()?;

        if tracker.record_household_progress(
            household.household_id,
            batches,
            self.investigator_id(),
            self.now,
        )? {
            return self.enter(InterviewState::HouseholdComplete {
                household_id: household.household_id,
            });
        }
        let prefix = format!("{}\n", messages::MEMBER_SUCCESS);
        self.enter_with_prefix(
            InterviewState::MemberList {
                household_id: household.household_id,
                page: 1,
            },
            &prefix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::MemberId;
    use survey_storage::{InMemorySessionBackend, MockStorage};

    #[test]
    fn test_with_config_rejects_invalid() {
        let storage = MockStorage::new();
        let sessions = InMemorySessionBackend::new();
        let config = UssdConfig {
            options_per_page: 0,
            ..UssdConfig::default()
        };
        let result = UssdInterview::new(&storage, &sessions).with_config(config);
        assert!(matches!(result, Err(SurveyError::Config(_))));
    }

    #[test]
    fn test_with_config_keeps_valid() {
        let storage = MockStorage::new();
        let sessions = InMemorySessionBackend::new();
        let config = UssdConfig {
            timeout_minutes: 15,
            ..UssdConfig::default()
        };
        let engine = UssdInterview::new(&storage, &sessions)
            .with_config(config)
            .unwrap();
        assert_eq!(engine.config().timeout_minutes, 15);
    }

    #[test]
    fn test_stable_ancestor() {
        let household_id = HouseholdId::now_v7();
        let cursor = QuestionCursor::new(
            household_id,
            MemberId::now_v7(),
            BatchId::now_v7(),
            QuestionId::now_v7(),
        );
        assert_eq!(
            stable_ancestor(&InterviewState::AskingQuestion(cursor)),
            InterviewState::MemberList {
                household_id,
                page: 1
            }
        );
        assert_eq!(
            stable_ancestor(&InterviewState::MemberList {
                household_id,
                page: 3
            }),
            InterviewState::HouseholdList { page: 1 }
        );
    }

    #[test]
    fn test_list_choice_pages_and_entries() {
        let config = UssdConfig::default();
        let items: Vec<u32> = (1..=6).collect();
        assert!(matches!(list_choice(&items, 1, 4, "#", &config), Ok(ListChoice::Page(2))));
        assert!(matches!(list_choice(&items, 2, 4, "5", &config), Ok(ListChoice::Entry(&5))));
        assert_eq!(
            list_choice(&items, 1, 4, " 5 ", &config).err(),
            Some(InterviewError::InvalidSelection {
                input: "5".to_string()
            })
        );
        assert!(list_choice(&items, 1, 4, "abc", &config).is_err());
    }

    #[test]
    fn test_terminal_responses_end_session() {
        for reason in [
            TerminalReason::NoHouseholds,
            TerminalReason::AllHouseholdsComplete,
            TerminalReason::NotRegistered,
        ] {
            assert!(terminal_response(reason).is_end());
        }
        assert_eq!(
            terminal_response(TerminalReason::NotRegistered).text,
            messages::USER_NOT_REGISTERED
        );
    }

    #[test]
    fn test_unknown_caller_gets_not_registered() {
        let storage = MockStorage::new();
        let sessions = InMemorySessionBackend::new();
        let engine = UssdInterview::new(&storage, &sessions);

        let response = engine.handle(&UssdRequest::dial("txn-1", "256700000000"));
        assert_eq!(response.text, messages::USER_NOT_REGISTERED);
        assert_eq!(sessions.stats().unwrap().entry_count, 0);
    }
}
