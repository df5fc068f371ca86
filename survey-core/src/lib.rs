//! Survey Core - Entity Types
//!
//! Data structures shared by every crate in the workspace:
//! - Strongly-typed UUIDv7 identifiers
//! - Households, members, groups, batches, questions, rules and answers
//! - Group condition evaluation
//! - Error taxonomy and engine configuration

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod groups;
pub mod identity;

pub use config::UssdConfig;
pub use entities::{
    Answer, AnswerRule, AnswerValue, Batch, BatchQuestion, CompletionRecord, CompletionSubject,
    ConditionValue, GroupCondition, Household, HouseholdMember, Investigator, MemberGroup,
    MemberProfile, Question, QuestionOption, RuleAction, RuleCondition,
};
pub use enums::{
    AnswerType, AnswerTypeParseError, Comparator, EntityType, GroupAttribute, MemberRole, Sex,
};
pub use error::{
    ConfigError, InterviewError, SessionError, StorageError, SurveyError, SurveyResult,
    ValidationError,
};
pub use groups::{evaluator_for, matching_groups, ConditionEvaluator};
pub use identity::{
    new_entity_id, AnswerId, BatchId, CompletionId, EntityId, EntityIdType, GroupId,
    HouseholdId, InvestigatorId, LocationId, MemberId, OptionId, QuestionId, RuleId, SurveyId,
    Timestamp,
};
