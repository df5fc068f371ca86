//! Enum types for survey entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Entity type discriminator used in storage errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Investigator,
    Household,
    Member,
    MemberGroup,
    Batch,
    Question,
    QuestionOption,
    AnswerRule,
    Answer,
    Completion,
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::Investigator => "Investigator",
            EntityType::Household => "Household",
            EntityType::Member => "Member",
            EntityType::MemberGroup => "MemberGroup",
            EntityType::Batch => "Batch",
            EntityType::Question => "Question",
            EntityType::QuestionOption => "QuestionOption",
            EntityType::AnswerRule => "AnswerRule",
            EntityType::Answer => "Answer",
            EntityType::Completion => "Completion",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "investigator" => Ok(EntityType::Investigator),
            "household" => Ok(EntityType::Household),
            "member" | "householdmember" => Ok(EntityType::Member),
            "membergroup" | "group" => Ok(EntityType::MemberGroup),
            "batch" => Ok(EntityType::Batch),
            "question" => Ok(EntityType::Question),
            "questionoption" | "option" => Ok(EntityType::QuestionOption),
            "answerrule" | "rule" => Ok(EntityType::AnswerRule),
            "answer" => Ok(EntityType::Answer),
            "completion" => Ok(EntityType::Completion),
            _ => Err(format!("Invalid EntityType: {}", s)),
        }
    }
}

// ============================================================================
// QUESTION ENUMS
// ============================================================================

/// Expected shape of an answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerType {
    /// Whole number, parsed from the raw USSD input
    Number,
    /// Free text, must be non-empty after trimming
    Text,
    /// One option out of an ordered, paginated list
    MultiChoice,
}

impl AnswerType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AnswerType::Number => "NUMBER",
            AnswerType::Text => "TEXT",
            AnswerType::MultiChoice => "MULTICHOICE",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, AnswerTypeParseError> {
        match normalize_token(s).as_str() {
            "number" | "numerical" => Ok(AnswerType::Number),
            "text" => Ok(AnswerType::Text),
            "multichoice" => Ok(AnswerType::MultiChoice),
            _ => Err(AnswerTypeParseError(s.to_string())),
        }
    }

    /// Whether answers of this type are picked from an option list.
    pub fn has_options(&self) -> bool {
        matches!(self, AnswerType::MultiChoice)
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AnswerType {
    type Err = AnswerTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid answer type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTypeParseError(pub String);

impl fmt::Display for AnswerTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid answer type: {}", self.0)
    }
}

impl std::error::Error for AnswerTypeParseError {}

// ============================================================================
// MEMBER ENUMS
// ============================================================================

/// Sex of a household member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Sex::Male => "MALE",
            Sex::Female => "FEMALE",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(format!("Invalid Sex: {}", s)),
        }
    }
}

/// Role of a member inside the household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MemberRole {
    /// Respondent-of-record for the household
    Head,
    #[default]
    Member,
}

impl MemberRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemberRole::Head => "HEAD",
            MemberRole::Member => "MEMBER",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "head" => Ok(MemberRole::Head),
            "member" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid MemberRole: {}", s)),
        }
    }
}

// ============================================================================
// GROUP CONDITION ENUMS
// ============================================================================

/// Member attribute a group condition is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupAttribute {
    /// Age in whole years, compared numerically
    Age,
    /// Sex, compared for equality against `MALE` / `FEMALE`
    Gender,
    /// Household status, compared for equality against `HEAD`
    General,
}

impl GroupAttribute {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            GroupAttribute::Age => "AGE",
            GroupAttribute::Gender => "GENDER",
            GroupAttribute::General => "GENERAL",
        }
    }
}

impl fmt::Display for GroupAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for GroupAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "age" => Ok(GroupAttribute::Age),
            "gender" | "sex" => Ok(GroupAttribute::Gender),
            "general" => Ok(GroupAttribute::General),
            _ => Err(format!("Invalid GroupAttribute: {}", s)),
        }
    }
}

/// Comparison operator of a group condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparator {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Comparator::Equals => "EQUALS",
            Comparator::GreaterThan => "GREATER_THAN",
            Comparator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Comparator::LessThan => "LESS_THAN",
            Comparator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        }
    }

    /// Apply the operator to two numbers as `lhs <op> rhs`.
    pub fn compare(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparator::Equals => lhs == rhs,
            Comparator::GreaterThan => lhs > rhs,
            Comparator::GreaterThanOrEqual => lhs >= rhs,
            Comparator::LessThan => lhs < rhs,
            Comparator::LessThanOrEqual => lhs <= rhs,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "equals" | "eq" => Ok(Comparator::Equals),
            "greaterthan" | "gt" => Ok(Comparator::GreaterThan),
            "greaterthanorequal" | "gte" => Ok(Comparator::GreaterThanOrEqual),
            "lessthan" | "lt" => Ok(Comparator::LessThan),
            "lessthanorequal" | "lte" => Ok(Comparator::LessThanOrEqual),
            _ => Err(format!("Invalid Comparator: {}", s)),
        }
    }
}
