//! Core entity structures

use crate::{
    AnswerId, AnswerType, BatchId, Comparator, CompletionId, EntityIdType, EntityType,
    GroupAttribute, GroupId, HouseholdId, InvestigatorId, LocationId, MemberId, MemberRole,
    OptionId, QuestionId, RuleId, Sex, SurveyId, Timestamp,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// PEOPLE
// ============================================================================

/// Field investigator, identified on the USSD channel by mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigator {
    pub investigator_id: InvestigatorId,
    pub name: String,
    /// National format, without country code.
    pub mobile_number: String,
    pub location_id: Option<LocationId>,
    pub is_blocked: bool,
    pub created_at: Timestamp,
}

impl Investigator {
    pub fn new(name: impl Into<String>, mobile_number: impl Into<String>) -> Self {
        Self {
            investigator_id: InvestigatorId::now_v7(),
            name: name.into(),
            mobile_number: mobile_number.into(),
            location_id: None,
            is_blocked: false,
            created_at: Utc::now(),
        }
    }

    /// Assign the enumeration area the investigator works in.
    pub fn with_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

/// Household registered by an investigator for a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub household_id: HouseholdId,
    pub investigator_id: InvestigatorId,
    pub survey_id: SurveyId,
    /// Short number shown on the handset as `HH-<uid>`.
    pub uid: u32,
    pub created_at: Timestamp,
}

impl Household {
    pub fn new(investigator_id: InvestigatorId, survey_id: SurveyId, uid: u32) -> Self {
        Self {
            household_id: HouseholdId::now_v7(),
            investigator_id,
            survey_id,
            uid,
            created_at: Utc::now(),
        }
    }
}

/// Person living in a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub member_id: MemberId,
    pub household_id: HouseholdId,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub role: MemberRole,
    pub created_at: Timestamp,
}

impl HouseholdMember {
    pub fn new(
        household_id: HouseholdId,
        surname: impl Into<String>,
        date_of_birth: NaiveDate,
        sex: Sex,
    ) -> Self {
        Self {
            member_id: MemberId::now_v7(),
            household_id,
            surname: surname.into(),
            date_of_birth,
            sex,
            role: MemberRole::Member,
            created_at: Utc::now(),
        }
    }

    /// Mark this member as the household head.
    pub fn as_head(mut self) -> Self {
        self.role = MemberRole::Head;
        self
    }

    pub fn is_head(&self) -> bool {
        self.role == MemberRole::Head
    }

    /// Age in whole years on the given day.
    pub fn age_on(&self, today: NaiveDate) -> i64 {
        let mut age = i64::from(today.year() - self.date_of_birth.year());
        if (today.month(), today.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age.max(0)
    }

    /// Snapshot of the attributes group conditions look at.
    pub fn profile(&self, today: NaiveDate) -> MemberProfile {
        MemberProfile {
            age: self.age_on(today),
            sex: self.sex,
            is_head: self.is_head(),
        }
    }
}

/// Derived, request-time view of a member used for group matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberProfile {
    pub age: i64,
    pub sex: Sex,
    pub is_head: bool,
}

// ============================================================================
// GROUPS
// ============================================================================

/// Right-hand side of a group condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionValue {
    Number(i64),
    Text(String),
}

impl ConditionValue {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            ConditionValue::Text(t) => t.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ConditionValue::Number(n) => n.to_string(),
            ConditionValue::Text(t) => t.clone(),
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// Typed membership condition: `attribute <comparator> value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupCondition {
    pub attribute: GroupAttribute,
    pub comparator: Comparator,
    pub value: ConditionValue,
}

impl GroupCondition {
    pub fn new(attribute: GroupAttribute, comparator: Comparator, value: ConditionValue) -> Self {
        Self {
            attribute,
            comparator,
            value,
        }
    }

    pub fn age(comparator: Comparator, years: i64) -> Self {
        Self::new(GroupAttribute::Age, comparator, ConditionValue::Number(years))
    }

    pub fn gender(sex: Sex) -> Self {
        Self::new(
            GroupAttribute::Gender,
            Comparator::Equals,
            ConditionValue::Text(sex.as_db_str().to_string()),
        )
    }

    pub fn head() -> Self {
        Self::new(
            GroupAttribute::General,
            Comparator::Equals,
            ConditionValue::Text(MemberRole::Head.as_db_str().to_string()),
        )
    }
}

/// Named set of conditions; questions are targeted at groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberGroup {
    pub group_id: GroupId,
    pub name: String,
    pub order: i32,
    pub conditions: Vec<GroupCondition>,
    pub created_at: Timestamp,
}

impl MemberGroup {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            group_id: GroupId::now_v7(),
            name: name.into(),
            order,
            conditions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_condition(mut self, condition: GroupCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

// ============================================================================
// BATCHES AND QUESTIONS
// ============================================================================

/// Ordered, location-scoped set of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: BatchId,
    pub survey_id: SurveyId,
    pub name: String,
    pub order: i32,
    pub created_at: Timestamp,
}

impl Batch {
    pub fn new(survey_id: SurveyId, name: impl Into<String>, order: i32) -> Self {
        Self {
            batch_id: BatchId::now_v7(),
            survey_id,
            name: name.into(),
            order,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub identifier: String,
    pub text: String,
    pub answer_type: AnswerType,
    pub group_id: GroupId,
    pub is_subquestion: bool,
    pub created_at: Timestamp,
}

impl Question {
    pub fn new(
        identifier: impl Into<String>,
        text: impl Into<String>,
        answer_type: AnswerType,
        group_id: GroupId,
    ) -> Self {
        Self {
            question_id: QuestionId::now_v7(),
            identifier: identifier.into(),
            text: text.into(),
            answer_type,
            group_id,
            is_subquestion: false,
            created_at: Utc::now(),
        }
    }

    pub fn as_subquestion(mut self) -> Self {
        self.is_subquestion = true;
        self
    }
}

/// Position of a question inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuestion {
    pub batch_id: BatchId,
    pub question_id: QuestionId,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub option_id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub order: i32,
    pub created_at: Timestamp,
}

impl QuestionOption {
    pub fn new(question_id: QuestionId, text: impl Into<String>, order: i32) -> Self {
        Self {
            option_id: OptionId::now_v7(),
            question_id,
            text: text.into(),
            order,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// ANSWER RULES
// ============================================================================

/// When an answer rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCondition {
    /// Answer equals the value (numbers numerically, text case-insensitively)
    Equals(ConditionValue),
    GreaterThan(i64),
    LessThan(i64),
    /// Inclusive range
    Between { min: i64, max: i64 },
    /// Multichoice answer picked this option
    EqualsOption(OptionId),
    /// Answer is greater than the member's latest answer to another question
    GreaterThanQuestion(QuestionId),
    /// Answer is less than the member's latest answer to another question
    LessThanQuestion(QuestionId),
}

impl RuleCondition {
    /// The other question this condition compares against, if any.
    pub fn referenced_question(&self) -> Option<QuestionId> {
        match self {
            RuleCondition::GreaterThanQuestion(q) | RuleCondition::LessThanQuestion(q) => Some(*q),
            _ => None,
        }
    }
}

/// What happens when an answer rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleAction {
    SkipTo(QuestionId),
    /// Delete and re-ask the referenced question (or the question itself)
    Reanswer,
    /// Ask for confirmation, then end the member's interview
    EndInterview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRule {
    pub rule_id: RuleId,
    pub question_id: QuestionId,
    pub condition: RuleCondition,
    pub action: RuleAction,
    /// Lower values are evaluated first.
    pub priority: i32,
    pub created_at: Timestamp,
}

impl AnswerRule {
    pub fn new(question_id: QuestionId, condition: RuleCondition, action: RuleAction) -> Self {
        Self {
            rule_id: RuleId::now_v7(),
            question_id,
            condition,
            action,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// ANSWERS AND COMPLETION
// ============================================================================

/// Validated answer payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerValue {
    Number(i64),
    Text(String),
    Choice {
        option_id: OptionId,
        order: i32,
        text: String,
    },
}

impl AnswerValue {
    /// Numeric view used by comparison rules; choices compare by option order.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(t) => t.trim().parse().ok(),
            AnswerValue::Choice { order, .. } => Some(i64::from(*order)),
        }
    }

    pub fn answer_type(&self) -> AnswerType {
        match self {
            AnswerValue::Number(_) => AnswerType::Number,
            AnswerValue::Text(_) => AnswerType::Text,
            AnswerValue::Choice { .. } => AnswerType::MultiChoice,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Text(t) => write!(f, "{}", t),
            AnswerValue::Choice { text, .. } => write!(f, "{}", text),
        }
    }
}

/// Immutable answer record. The latest record per question wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer_id: AnswerId,
    pub investigator_id: InvestigatorId,
    pub question_id: QuestionId,
    pub member_id: MemberId,
    pub household_id: HouseholdId,
    pub batch_id: BatchId,
    pub value: AnswerValue,
    pub created_at: Timestamp,
}

/// Who a completion record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionSubject {
    Member(MemberId),
    Household(HouseholdId),
}

impl CompletionSubject {
    pub fn entity_type(&self) -> EntityType {
        match self {
            CompletionSubject::Member(_) => EntityType::Member,
            CompletionSubject::Household(_) => EntityType::Household,
        }
    }

    pub fn as_uuid(&self) -> Uuid {
        match self {
            CompletionSubject::Member(id) => id.as_uuid(),
            CompletionSubject::Household(id) => id.as_uuid(),
        }
    }
}

impl fmt::Display for CompletionSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type(), self.as_uuid())
    }
}

/// Marker that a member or household finished a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completion_id: CompletionId,
    pub subject: CompletionSubject,
    pub batch_id: BatchId,
    pub investigator_id: InvestigatorId,
    pub created_at: Timestamp,
}

impl CompletionRecord {
    pub fn new(
        subject: CompletionSubject,
        batch_id: BatchId,
        investigator_id: InvestigatorId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            completion_id: CompletionId::now_v7(),
            subject,
            batch_id,
            investigator_id,
            created_at,
        }
    }

    /// Whether at least `minutes` have elapsed since the record was written.
    pub fn is_older_than(&self, minutes: i64, now: Timestamp) -> bool {
        now - self.created_at >= chrono::Duration::minutes(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let member = HouseholdMember::new(
            HouseholdId::now_v7(),
            "Okello",
            date(1990, 6, 15),
            Sex::Male,
        );
        assert_eq!(member.age_on(date(2024, 6, 14)), 33);
        assert_eq!(member.age_on(date(2024, 6, 15)), 34);
        assert_eq!(member.age_on(date(1989, 1, 1)), 0);
    }

    #[test]
    fn test_profile_reflects_head_status() {
        let member = HouseholdMember::new(
            HouseholdId::now_v7(),
            "Akello",
            date(2000, 1, 1),
            Sex::Female,
        )
        .as_head();
        let profile = member.profile(date(2020, 1, 1));
        assert!(profile.is_head);
        assert_eq!(profile.age, 20);
        assert_eq!(profile.sex, Sex::Female);
    }

    #[test]
    fn test_answer_value_numeric_view() {
        assert_eq!(AnswerValue::Number(7).as_number(), Some(7));
        assert_eq!(AnswerValue::Text(" 12 ".into()).as_number(), Some(12));
        assert_eq!(AnswerValue::Text("twelve".into()).as_number(), None);
        let choice = AnswerValue::Choice {
            option_id: OptionId::now_v7(),
            order: 3,
            text: "Borehole".into(),
        };
        assert_eq!(choice.as_number(), Some(3));
        assert_eq!(choice.to_string(), "Borehole");
        assert_eq!(choice.answer_type(), AnswerType::MultiChoice);
    }

    #[test]
    fn test_referenced_question() {
        let q = QuestionId::now_v7();
        assert_eq!(RuleCondition::GreaterThanQuestion(q).referenced_question(), Some(q));
        assert_eq!(RuleCondition::GreaterThan(3).referenced_question(), None);
    }

    #[test]
    fn test_completion_record_age() {
        let now = Utc::now();
        let record = CompletionRecord::new(
            CompletionSubject::Member(MemberId::now_v7()),
            BatchId::now_v7(),
            InvestigatorId::now_v7(),
            now - chrono::Duration::minutes(6),
        );
        assert!(record.is_older_than(5, now));
        assert!(!record.is_older_than(10, now));
    }
}
