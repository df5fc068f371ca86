//! Group condition evaluation
//!
//! Each [`GroupAttribute`] maps to one evaluator through [`evaluator_for`].
//! Age compares numerically with any [`Comparator`]; gender and household
//! status only support equality and never match under an ordering operator.

use crate::{
    Comparator, ConditionValue, GroupAttribute, GroupCondition, GroupId, MemberGroup,
    MemberProfile, MemberRole, Sex,
};

/// Signature shared by all attribute evaluators.
pub type ConditionEvaluator = fn(&MemberProfile, Comparator, &ConditionValue) -> bool;

/// Dispatch table from attribute to evaluator.
pub fn evaluator_for(attribute: GroupAttribute) -> ConditionEvaluator {
    match attribute {
        GroupAttribute::Age => evaluate_age,
        GroupAttribute::Gender => evaluate_gender,
        GroupAttribute::General => evaluate_general,
    }
}

fn evaluate_age(profile: &MemberProfile, comparator: Comparator, value: &ConditionValue) -> bool {
    value
        .as_number()
        .map(|years| comparator.compare(profile.age, years))
        .unwrap_or(false)
}

fn evaluate_gender(
    profile: &MemberProfile,
    comparator: Comparator,
    value: &ConditionValue,
) -> bool {
    if comparator != Comparator::Equals {
        return false;
    }
    value
        .as_text()
        .parse::<Sex>()
        .map(|sex| sex == profile.sex)
        .unwrap_or(false)
}

fn evaluate_general(
    profile: &MemberProfile,
    comparator: Comparator,
    value: &ConditionValue,
) -> bool {
    if comparator != Comparator::Equals {
        return false;
    }
    match value.as_text().parse::<MemberRole>() {
        Ok(MemberRole::Head) => profile.is_head,
        Ok(MemberRole::Member) => !profile.is_head,
        Err(_) => false,
    }
}

impl GroupCondition {
    /// Evaluate this condition against a member profile.
    pub fn matches(&self, profile: &MemberProfile) -> bool {
        evaluator_for(self.attribute)(profile, self.comparator, &self.value)
    }
}

impl MemberGroup {
    /// A member belongs to a group when every condition holds.
    pub fn contains(&self, profile: &MemberProfile) -> bool {
        self.conditions.iter().all(|c| c.matches(profile))
    }
}

/// Ids of all groups the profile belongs to, in the order given.
pub fn matching_groups(groups: &[MemberGroup], profile: &MemberProfile) -> Vec<GroupId> {
    groups
        .iter()
        .filter(|g| g.contains(profile))
        .map(|g| g.group_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(age: i64, sex: Sex, is_head: bool) -> MemberProfile {
        MemberProfile { age, sex, is_head }
    }

    #[test]
    fn test_age_dispatch_is_numeric() {
        let adult = GroupCondition::age(Comparator::GreaterThanOrEqual, 18);
        assert!(adult.matches(&profile(18, Sex::Male, false)));
        assert!(!adult.matches(&profile(17, Sex::Male, false)));

        let text_value = GroupCondition::new(
            GroupAttribute::Age,
            Comparator::LessThan,
            ConditionValue::Text("5".into()),
        );
        assert!(text_value.matches(&profile(4, Sex::Female, false)));
    }

    #[test]
    fn test_head_dispatch_is_equality() {
        let head = GroupCondition::head();
        assert!(head.matches(&profile(40, Sex::Male, true)));
        assert!(!head.matches(&profile(40, Sex::Male, false)));

        let ordered = GroupCondition::new(
            GroupAttribute::General,
            Comparator::GreaterThan,
            ConditionValue::Text("HEAD".into()),
        );
        assert!(!ordered.matches(&profile(40, Sex::Male, true)));
    }

    #[test]
    fn test_gender_dispatch() {
        let women = GroupCondition::gender(Sex::Female);
        assert!(women.matches(&profile(30, Sex::Female, false)));
        assert!(!women.matches(&profile(30, Sex::Male, false)));
    }

    #[test]
    fn test_group_requires_all_conditions() {
        let group = MemberGroup::new("women 15-49", 1)
            .with_condition(GroupCondition::gender(Sex::Female))
            .with_condition(GroupCondition::age(Comparator::GreaterThanOrEqual, 15))
            .with_condition(GroupCondition::age(Comparator::LessThanOrEqual, 49));
        assert!(group.contains(&profile(30, Sex::Female, false)));
        assert!(!group.contains(&profile(50, Sex::Female, false)));
        assert!(!group.contains(&profile(30, Sex::Male, false)));
    }

    #[test]
    fn test_group_without_conditions_matches_everyone() {
        let everyone = MemberGroup::new("general", 0);
        let heads = MemberGroup::new("heads", 1).with_condition(GroupCondition::head());
        let ids = matching_groups(&[everyone.clone(), heads], &profile(3, Sex::Male, false));
        assert_eq!(ids, vec![everyone.group_id]);
    }
}
