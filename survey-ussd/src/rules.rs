//! Answer rule evaluation.

use survey_core::{
    AnswerRule, AnswerValue, ConditionValue, QuestionId, RuleAction, RuleCondition, SurveyResult,
};

/// Whether a rule condition holds for a fresh answer.
///
/// `referenced` is the member's latest answer to the question named by a
/// question-comparing condition; without it such conditions never hold.
pub fn condition_holds(
    condition: &RuleCondition,
    value: &AnswerValue,
    referenced: Option<&AnswerValue>,
) -> bool {
    let number = value.as_number();
    match condition {
        RuleCondition::Equals(ConditionValue::Number(n)) => number == Some(*n),
        RuleCondition::Equals(ConditionValue::Text(text)) => {
            match (number, text.trim().parse::<i64>().ok()) {
                (Some(lhs), Some(rhs)) if !matches!(value, AnswerValue::Text(_)) => lhs == rhs,
                _ => value.to_string().trim().to_lowercase() == text.trim().to_lowercase(),
            }
        }
        RuleCondition::GreaterThan(n) => number.is_some_and(|v| v > *n),
        RuleCondition::LessThan(n) => number.is_some_and(|v| v < *n),
        RuleCondition::Between { min, max } => number.is_some_and(|v| (*min..=*max).contains(&v)),
        RuleCondition::EqualsOption(option_id) => {
            matches!(value, AnswerValue::Choice { option_id: chosen, .. } if chosen == option_id)
        }
        RuleCondition::GreaterThanQuestion(_) => {
            match (number, referenced.and_then(AnswerValue::as_number)) {
                (Some(lhs), Some(rhs)) => lhs > rhs,
                _ => false,
            }
        }
        RuleCondition::LessThanQuestion(_) => {
            match (number, referenced.and_then(AnswerValue::as_number)) {
                (Some(lhs), Some(rhs)) => lhs < rhs,
                _ => false,
            }
        }
    }
}

/// First rule, in list order, whose condition holds.
///
/// `referenced` resolves the answer a question-comparing condition looks at.
pub fn first_match<'r, F>(
    rules: &'r [AnswerRule],
    value: &AnswerValue,
    mut referenced: F,
) -> SurveyResult<Option<&'r AnswerRule>>
where
    F: FnMut(QuestionId) -> SurveyResult<Option<AnswerValue>>,
{
    for rule in rules {
        let other = match rule.condition.referenced_question() {
            Some(question_id) => referenced(question_id)?,
            None => None,
        };
        if condition_holds(&rule.condition, value, other.as_ref()) {
            return Ok(Some(rule));
        }
    }
    Ok(None)
}

/// Sequencing override produced by a matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    SkipTo(QuestionId),
    /// Questions to re-collect, in prompt order
    Reanswer(Vec<QuestionId>),
    EndInterview,
}

impl RuleOutcome {
    /// Reanswer targets the referenced question first, then the rule's own.
    pub fn of(rule: &AnswerRule) -> Self {
        match rule.action {
            RuleAction::SkipTo(target) => RuleOutcome::SkipTo(target),
            RuleAction::EndInterview => RuleOutcome::EndInterview,
            RuleAction::Reanswer => {
                let mut targets = Vec::with_capacity(2);
                if let Some(referenced) = rule.condition.referenced_question() {
                    targets.push(referenced);
                }
                if !targets.contains(&rule.question_id) {
                    targets.push(rule.question_id);
                }
                RuleOutcome::Reanswer(targets)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::{EntityIdType, OptionId};

    fn choice(order: i32, text: &str) -> AnswerValue {
        AnswerValue::Choice {
            option_id: OptionId::now_v7(),
            order,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_numeric_conditions() {
        let ten = AnswerValue::Number(10);
        assert!(condition_holds(&RuleCondition::Equals(ConditionValue::Number(10)), &ten, None));
        assert!(condition_holds(&RuleCondition::GreaterThan(9), &ten, None));
        assert!(!condition_holds(&RuleCondition::GreaterThan(10), &ten, None));
        assert!(condition_holds(&RuleCondition::LessThan(11), &ten, None));
        assert!(condition_holds(&RuleCondition::Between { min: 10, max: 12 }, &ten, None));
        assert!(!condition_holds(&RuleCondition::Between { min: 11, max: 12 }, &ten, None));
    }

    #[test]
    fn test_text_equality_ignores_case() {
        let yes = AnswerValue::Text("Yes".to_string());
        let rule = RuleCondition::Equals(ConditionValue::Text("yes".to_string()));
        assert!(condition_holds(&rule, &yes, None));
        assert!(!condition_holds(&RuleCondition::GreaterThan(0), &yes, None));

        let numeric_text = RuleCondition::Equals(ConditionValue::Text("1".to_string()));
        assert!(condition_holds(&numeric_text, &AnswerValue::Number(1), None));
    }

    #[test]
    fn test_option_conditions() {
        let picked = choice(2, "River");
        let option_id = match &picked {
            AnswerValue::Choice { option_id, .. } => *option_id,
            _ => unreachable!(),
        };
        assert!(condition_holds(&RuleCondition::EqualsOption(option_id), &picked, None));
        assert!(!condition_holds(&RuleCondition::EqualsOption(OptionId::now_v7()), &picked, None));
        assert!(condition_holds(
            &RuleCondition::Equals(ConditionValue::Text("river".to_string())),
            &picked,
            None
        ));
    }

    #[test]
    fn test_question_comparisons_need_reference() {
        let other = QuestionId::now_v7();
        let answer = AnswerValue::Number(8);
        let greater = RuleCondition::GreaterThanQuestion(other);
        let less = RuleCondition::LessThanQuestion(other);

        assert!(condition_holds(&greater, &answer, Some(&AnswerValue::Number(5))));
        assert!(!condition_holds(&greater, &answer, Some(&AnswerValue::Number(8))));
        assert!(condition_holds(&less, &answer, Some(&AnswerValue::Number(9))));
        assert!(!condition_holds(&greater, &answer, None));
    }

    #[test]
    fn test_first_match_respects_order() {
        let question_id = QuestionId::now_v7();
        let other = QuestionId::now_v7();
        let rules = vec![
            AnswerRule::new(
                question_id,
                RuleCondition::GreaterThanQuestion(other),
                RuleAction::Reanswer,
            ),
            AnswerRule::new(question_id, RuleCondition::GreaterThan(0), RuleAction::EndInterview),
        ];

        let matched = first_match(&rules, &AnswerValue::Number(3), |_| {
            Ok(Some(AnswerValue::Number(1)))
        })
        .unwrap()
        .unwrap();
        assert_eq!(matched.action, RuleAction::Reanswer);

        let matched = first_match(&rules, &AnswerValue::Number(3), |_| Ok(None)).unwrap().unwrap();
        assert_eq!(matched.action, RuleAction::EndInterview);

        assert!(first_match(&rules, &AnswerValue::Number(-1), |_| Ok(None)).unwrap().is_none());
    }

    #[test]
    fn test_reanswer_outcome_targets() {
        let question_id = QuestionId::now_v7();
        let other = QuestionId::now_v7();
        let comparing = AnswerRule::new(
            question_id,
            RuleCondition::GreaterThanQuestion(other),
            RuleAction::Reanswer,
        );
        assert_eq!(RuleOutcome::of(&comparing), RuleOutcome::Reanswer(vec![other, question_id]));

        let plain = AnswerRule::new(question_id, RuleCondition::LessThan(0), RuleAction::Reanswer);
        assert_eq!(RuleOutcome::of(&plain), RuleOutcome::Reanswer(vec![question_id]));

        let skip = AnswerRule::new(
            question_id,
            RuleCondition::LessThan(0),
            RuleAction::SkipTo(other),
        );
        assert_eq!(RuleOutcome::of(&skip), RuleOutcome::SkipTo(other));
    }
}
