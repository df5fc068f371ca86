//! Survey Test Utilities
//!
//! Shared test infrastructure for the survey workspace:
//! - Proptest generators for entity types and configuration
//! - A seeded in-memory survey world for end-to-end interview tests
//! - Assertions for survey results

// Re-export storage used by fixtures
pub use survey_storage::{InMemorySessionBackend, MockStorage, SessionBackend, SurveyStore};

// Re-export core types for convenience
pub use survey_core::{
    AnswerRule, AnswerType, AnswerValue, Batch, BatchQuestion, Comparator, CompletionSubject,
    ConditionValue, GroupAttribute, GroupCondition, Household, HouseholdMember, Investigator,
    MemberGroup, Question, QuestionOption, RuleAction, RuleCondition, Sex, SurveyError,
    SurveyResult, Timestamp, UssdConfig,
    // Strongly-typed entity IDs
    BatchId, EntityIdType, GroupId, HouseholdId, InvestigatorId, LocationId, MemberId, OptionId,
    QuestionId, SurveyId,
};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for survey entity types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Type Generators ===

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_household_id() -> impl Strategy<Value = HouseholdId> {
        arb_uuid().prop_map(HouseholdId::new)
    }

    pub fn arb_member_id() -> impl Strategy<Value = MemberId> {
        arb_uuid().prop_map(MemberId::new)
    }

    pub fn arb_question_id() -> impl Strategy<Value = QuestionId> {
        arb_uuid().prop_map(QuestionId::new)
    }

    pub fn arb_option_id() -> impl Strategy<Value = OptionId> {
        arb_uuid().prop_map(OptionId::new)
    }

    pub fn arb_batch_id() -> impl Strategy<Value = BatchId> {
        arb_uuid().prop_map(BatchId::new)
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a date of birth between 1930 and 2020.
    pub fn arb_date_of_birth() -> impl Strategy<Value = NaiveDate> {
        (1930i32..2020, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
    }

    // === Enum Generators ===

    pub fn arb_sex() -> impl Strategy<Value = Sex> {
        prop_oneof![Just(Sex::Male), Just(Sex::Female)]
    }

    pub fn arb_answer_type() -> impl Strategy<Value = AnswerType> {
        prop_oneof![
            Just(AnswerType::Number),
            Just(AnswerType::Text),
            Just(AnswerType::MultiChoice),
        ]
    }

    pub fn arb_comparator() -> impl Strategy<Value = Comparator> {
        prop_oneof![
            Just(Comparator::Equals),
            Just(Comparator::GreaterThan),
            Just(Comparator::GreaterThanOrEqual),
            Just(Comparator::LessThan),
            Just(Comparator::LessThanOrEqual),
        ]
    }

    // === Condition Generators ===

    pub fn arb_condition_value() -> impl Strategy<Value = ConditionValue> {
        prop_oneof![
            (-1000i64..1000).prop_map(ConditionValue::Number),
            "[a-zA-Z]{1,12}".prop_map(ConditionValue::Text),
        ]
    }

    /// Group conditions over every attribute, including ones that never
    /// match (ordering comparators on gender or household status).
    pub fn arb_group_condition() -> impl Strategy<Value = GroupCondition> {
        prop_oneof![
            (arb_comparator(), 0i64..100).prop_map(|(c, years)| GroupCondition::age(c, years)),
            arb_sex().prop_map(GroupCondition::gender),
            Just(GroupCondition::head()),
            (arb_comparator(), arb_condition_value())
                .prop_map(|(c, v)| GroupCondition::new(GroupAttribute::General, c, v)),
        ]
    }

    pub fn arb_rule_condition() -> impl Strategy<Value = RuleCondition> {
        prop_oneof![
            arb_condition_value().prop_map(RuleCondition::Equals),
            (-1000i64..1000).prop_map(RuleCondition::GreaterThan),
            (-1000i64..1000).prop_map(RuleCondition::LessThan),
            (-1000i64..1000, 0i64..1000)
                .prop_map(|(min, span)| RuleCondition::Between { min, max: min + span }),
            arb_option_id().prop_map(RuleCondition::EqualsOption),
            arb_question_id().prop_map(RuleCondition::GreaterThanQuestion),
            arb_question_id().prop_map(RuleCondition::LessThanQuestion),
        ]
    }

    pub fn arb_answer_value() -> impl Strategy<Value = AnswerValue> {
        prop_oneof![
            any::<i64>().prop_map(AnswerValue::Number),
            "[a-zA-Z0-9 ]{1,20}".prop_map(AnswerValue::Text),
            (arb_option_id(), 1i32..20, "[a-zA-Z]{1,10}").prop_map(|(option_id, order, text)| {
                AnswerValue::Choice {
                    option_id,
                    order,
                    text,
                }
            }),
        ]
    }

    // === Entity Generators ===

    /// Generate a member of the given household.
    pub fn arb_member(household_id: HouseholdId) -> impl Strategy<Value = HouseholdMember> {
        ("[A-Z][a-z]{2,10}", arb_date_of_birth(), arb_sex(), any::<bool>()).prop_map(
            move |(surname, dob, sex, is_head)| {
                let member = HouseholdMember::new(household_id, surname, dob, sex);
                if is_head {
                    member.as_head()
                } else {
                    member
                }
            },
        )
    }

    /// Generate a valid engine configuration.
    pub fn arb_valid_config() -> impl Strategy<Value = UssdConfig> {
        (1i64..120, 1usize..10, 1usize..10, 1usize..10).prop_map(
            |(timeout_minutes, households, members, options)| UssdConfig {
                timeout_minutes,
                households_per_page: households,
                members_per_page: members,
                options_per_page: options,
                ..UssdConfig::default()
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Seeded survey worlds for interview tests.

    use super::*;

    /// National-format number of the default investigator.
    pub const INVESTIGATOR_MOBILE: &str = "712345678";

    /// Number the gateway sends for the default investigator.
    pub const INVESTIGATOR_MSISDN: &str = "256712345678";

    /// Date of birth of an adult in any year the tests run.
    pub fn adult_dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default()
    }

    /// Date of birth of a young child, relative to now.
    pub fn child_dob() -> NaiveDate {
        let today = Utc::now().date_naive();
        today
            .checked_sub_signed(chrono::Duration::days(3 * 365))
            .unwrap_or(today)
    }

    /// An investigator working in one location of one survey, with storage
    /// and session backends.
    ///
    /// Questions added through [`SurveyWorld::add_question`] target the
    /// catch-all group, which every member belongs to.
    pub struct SurveyWorld {
        pub storage: MockStorage,
        pub sessions: InMemorySessionBackend,
        pub investigator: Investigator,
        pub location_id: LocationId,
        pub survey_id: SurveyId,
        pub everyone: MemberGroup,
    }

    impl SurveyWorld {
        pub fn new() -> SurveyResult<Self> {
            let storage = MockStorage::new();
            let location_id = LocationId::now_v7();
            let investigator =
                Investigator::new("Amina", INVESTIGATOR_MOBILE).with_location(location_id);
            storage.investigator_insert(&investigator)?;

            let everyone = MemberGroup::new("Everyone", 1);
            storage.group_insert(&everyone)?;

            Ok(Self {
                storage,
                sessions: InMemorySessionBackend::new(),
                investigator,
                location_id,
                survey_id: SurveyId::now_v7(),
                everyone,
            })
        }

        pub fn investigator_id(&self) -> InvestigatorId {
            self.investigator.investigator_id
        }

        /// Register a household with an adult head and adult members, listed
        /// in registration order.
        pub fn add_household(
            &self,
            head_surname: &str,
            member_surnames: &[&str],
        ) -> SurveyResult<(Household, Vec<HouseholdMember>)> {
            let uid = self
                .storage
                .household_list_by_investigator(self.investigator_id(), Some(self.survey_id))?
                .len() as u32
                + 1;
            let household = Household::new(self.investigator_id(), self.survey_id, uid);
            self.storage.household_insert(&household)?;

            let head = HouseholdMember::new(
                household.household_id,
                head_surname,
                adult_dob(),
                Sex::Male,
            )
            .as_head();
            self.storage.member_insert(&head)?;
            let mut members = vec![head];
            for surname in member_surnames {
                members.push(self.add_member(
                    household.household_id,
                    surname,
                    adult_dob(),
                    Sex::Female,
                )?);
            }
            Ok((household, members))
        }

        pub fn add_member(
            &self,
            household_id: HouseholdId,
            surname: &str,
            date_of_birth: NaiveDate,
            sex: Sex,
        ) -> SurveyResult<HouseholdMember> {
            let member = HouseholdMember::new(household_id, surname, date_of_birth, sex);
            self.storage.member_insert(&member)?;
            Ok(member)
        }

        pub fn add_group(&self, group: MemberGroup) -> SurveyResult<MemberGroup> {
            self.storage.group_insert(&group)?;
            Ok(group)
        }

        /// Create a batch of the world's survey and open it for the location.
        pub fn add_batch(&self, name: &str, order: i32) -> SurveyResult<Batch> {
            let batch = Batch::new(self.survey_id, name, order);
            self.storage.batch_insert(&batch)?;
            self.storage.batch_open(batch.batch_id, self.location_id)?;
            Ok(batch)
        }

        pub fn close_batch(&self, batch: &Batch) -> SurveyResult<()> {
            self.storage.batch_close(batch.batch_id, self.location_id)
        }

        /// Append a question for every member to the end of a batch.
        pub fn add_question(
            &self,
            batch: &Batch,
            identifier: &str,
            text: &str,
            answer_type: AnswerType,
        ) -> SurveyResult<Question> {
            self.add_group_question(batch, self.everyone.group_id, identifier, text, answer_type)
        }

        pub fn add_group_question(
            &self,
            batch: &Batch,
            group_id: GroupId,
            identifier: &str,
            text: &str,
            answer_type: AnswerType,
        ) -> SurveyResult<Question> {
            let question = Question::new(identifier, text, answer_type, group_id);
            self.storage.question_insert(&question)?;
            let order = self.storage.batch_question_list(batch.batch_id)?.len() as i32 + 1;
            self.storage.batch_question_assign(BatchQuestion {
                batch_id: batch.batch_id,
                question_id: question.question_id,
                order,
            })?;
            Ok(question)
        }

        /// Add options to a multichoice question, ordered from 1.
        pub fn add_options(
            &self,
            question: &Question,
            texts: &[&str],
        ) -> SurveyResult<Vec<QuestionOption>> {
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let option = QuestionOption::new(question.question_id, *text, i as i32 + 1);
                    self.storage.option_insert(&option)?;
                    Ok(option)
                })
                .collect()
        }

        pub fn add_rule(
            &self,
            question: &Question,
            condition: RuleCondition,
            action: RuleAction,
        ) -> SurveyResult<AnswerRule> {
            let rule = AnswerRule::new(question.question_id, condition, action);
            self.storage.rule_insert(&rule)?;
            Ok(rule)
        }

        pub fn answers_for(
            &self,
            member: &HouseholdMember,
            batch: &Batch,
        ) -> SurveyResult<Vec<AnswerValue>> {
            Ok(self
                .storage
                .answer_list_by_member(member.member_id, batch.batch_id)?
                .into_iter()
                .map(|a| a.value)
                .collect())
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for survey results.

    use super::*;

    /// Assert that a SurveyResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &SurveyResult<T>) {
        match result {
            Err(SurveyError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a SurveyResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &SurveyResult<T>) {
        match result {
            Err(SurveyError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a configuration passes validation.
    #[track_caller]
    pub fn assert_config_valid(config: &UssdConfig) {
        if let Err(e) = config.validate() {
            panic!("Config validation failed: {:?}", e);
        }
    }

    /// Assert that text starts with a prefix, showing the text on failure.
    #[track_caller]
    pub fn assert_starts_with(text: &str, prefix: &str) {
        assert!(
            text.starts_with(prefix),
            "Expected text starting with {:?}, got: {:?}",
            prefix,
            text
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::fixtures::SurveyWorld;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_world_households_get_sequential_uids() {
        let world = SurveyWorld::new().unwrap();
        let (first, members) = world.add_household("Okello", &["Akello"]).unwrap();
        let (second, _) = world.add_household("Mukasa", &[]).unwrap();

        assert_eq!(first.uid, 1);
        assert_eq!(second.uid, 2);
        assert!(members[0].is_head());
        assert!(!members[1].is_head());
    }

    #[test]
    fn test_world_questions_are_ordered_and_applicable() {
        let world = SurveyWorld::new().unwrap();
        let (_, members) = world.add_household("Okello", &[]).unwrap();
        let batch = world.add_batch("Batch 1", 1).unwrap();
        let q1 = world.add_question(&batch, "Q1", "Rooms?", AnswerType::Number).unwrap();
        let q2 = world.add_question(&batch, "Q2", "Roof?", AnswerType::Text).unwrap();

        let today = Utc::now().date_naive();
        let applicable = world
            .storage
            .applicable_questions(batch.batch_id, &members[0], today)
            .unwrap();
        let ids: Vec<QuestionId> = applicable.iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![q1.question_id, q2.question_id]);
    }

    #[test]
    fn test_closed_batch_not_listed() {
        let world = SurveyWorld::new().unwrap();
        let batch = world.add_batch("Batch 1", 1).unwrap();
        assert_eq!(world.storage.batch_list_open(world.location_id).unwrap().len(), 1);
        world.close_batch(&batch).unwrap();
        assert!(world.storage.batch_list_open(world.location_id).unwrap().is_empty());
    }

    #[test]
    fn test_child_is_under_five() {
        let today = Utc::now().date_naive();
        let member = HouseholdMember::new(
            HouseholdId::nil(),
            "Child",
            fixtures::child_dob(),
            Sex::Female,
        );
        assert!(member.age_on(today) < 5);
    }

    proptest! {
        #[test]
        fn prop_generated_configs_are_valid(config in generators::arb_valid_config()) {
            assertions::assert_config_valid(&config);
        }

        #[test]
        fn prop_generated_rule_ranges_are_ordered(condition in generators::arb_rule_condition()) {
            if let RuleCondition::Between { min, max } = condition {
                prop_assert!(min <= max);
            }
        }
    }
}
