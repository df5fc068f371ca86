//! Identity types for survey entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Common behaviour of the strongly-typed entity identifiers.
///
/// Every id wraps a UUID; the wrapper only exists so that a `MemberId` can
/// never be passed where a `HouseholdId` is expected.
pub trait EntityIdType:
    Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Human readable entity name, used in log fields and error messages.
    const ENTITY_NAME: &'static str;

    /// Wrap an existing UUID.
    fn new(uuid: Uuid) -> Self;

    /// Access the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable id.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The all-zero id.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident => $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifies a field investigator (the USSD caller).
    InvestigatorId => "investigator"
);
define_entity_id!(
    /// Identifies a registered household.
    HouseholdId => "household"
);
define_entity_id!(
    /// Identifies a member of a household.
    MemberId => "member"
);
define_entity_id!(
    /// Identifies a member group.
    GroupId => "member_group"
);
define_entity_id!(
    /// Identifies a survey.
    SurveyId => "survey"
);
define_entity_id!(
    /// Identifies an enumeration area.
    LocationId => "location"
);
define_entity_id!(
    /// Identifies a batch of questions.
    BatchId => "batch"
);
define_entity_id!(
    /// Identifies a question.
    QuestionId => "question"
);
define_entity_id!(
    /// Identifies a multichoice option.
    OptionId => "question_option"
);
define_entity_id!(
    /// Identifies an answer rule.
    RuleId => "answer_rule"
);
define_entity_id!(
    /// Identifies a recorded answer.
    AnswerId => "answer"
);
define_entity_id!(
    /// Identifies a completion record.
    CompletionId => "completion"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let first = QuestionId::now_v7();
        let second = QuestionId::now_v7();
        assert_ne!(first, second);
    }

    #[test]
    fn test_id_display_matches_uuid() {
        let uuid = Uuid::now_v7();
        let id = HouseholdId::new(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_eq!(Uuid::from(id), uuid);
        assert_eq!(HouseholdId::ENTITY_NAME, "household");
    }

    #[test]
    fn test_nil_id() {
        assert_eq!(MemberId::nil().as_uuid(), Uuid::nil());
    }
}
