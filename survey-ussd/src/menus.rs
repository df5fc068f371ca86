//! Screen rendering.

use crate::messages::{self, COMPLETE_MARK, HEAD_SUFFIX};
use crate::pagination::{paginate, Page};
use survey_core::{AnswerType, Household, HouseholdMember, Question, QuestionOption, UssdConfig};

fn navigation<T>(page: &Page<'_, T>, config: &UssdConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if page.has_previous() {
        lines.push(messages::previous_line(&config.previous_page_key));
    }
    if page.has_next() {
        lines.push(messages::next_line(&config.next_page_key));
    }
    lines
}

/// Title, the page's entries labelled by absolute position, then paging
/// lines where applicable.
pub fn render_paged<T>(
    title: &str,
    items: &[T],
    page: usize,
    per_page: usize,
    config: &UssdConfig,
    describe: impl Fn(&T) -> String,
) -> String {
    let page = paginate(items, page, per_page);
    let mut lines = Vec::with_capacity(page.items.len() + 3);
    if !title.is_empty() {
        lines.push(title.to_string());
    }
    lines.extend(
        page.labelled()
            .map(|(label, item)| format!("{}: {}", label, describe(item))),
    );
    lines.extend(navigation(&page, config));
    lines.join("\n")
}

/// Household entry shown in the list.
#[derive(Debug, Clone)]
pub struct HouseholdEntry {
    pub household: Household,
    pub head_surname: String,
    pub complete: bool,
}

impl HouseholdEntry {
    pub fn describe(&self) -> String {
        let mut line = format!("HH-{}-{}", self.household.uid, self.head_surname);
        if self.complete {
            line.push_str(COMPLETE_MARK);
        }
        line
    }
}

/// Member entry shown in the list.
#[derive(Debug, Clone)]
pub struct MemberEntry {
    pub member: HouseholdMember,
    pub complete: bool,
}

impl MemberEntry {
    pub fn describe(&self) -> String {
        let mut line = self.member.surname.clone();
        if self.member.is_head() {
            line.push_str(HEAD_SUFFIX);
        }
        if self.complete {
            line.push_str(COMPLETE_MARK);
        }
        line
    }
}

/// Yes/no prompt using the configured confirmation keys.
pub fn confirmation(question: &str, config: &UssdConfig) -> String {
    messages::confirmation(question, &config.yes_key, &config.no_key)
}

pub fn household_list(entries: &[HouseholdEntry], page: usize, config: &UssdConfig) -> String {
    render_paged(
        messages::HOUSEHOLD_LIST,
        entries,
        page,
        config.households_per_page,
        config,
        HouseholdEntry::describe,
    )
}

pub fn member_list(entries: &[MemberEntry], page: usize, config: &UssdConfig) -> String {
    render_paged(
        messages::MEMBERS_LIST,
        entries,
        page,
        config.members_per_page,
        config,
        MemberEntry::describe,
    )
}

/// Question text, followed by the current option page for multichoice.
pub fn question_prompt(
    question: &Question,
    options: &[QuestionOption],
    option_page: usize,
    config: &UssdConfig,
) -> String {
    if question.answer_type != AnswerType::MultiChoice || options.is_empty() {
        return question.text.clone();
    }
    render_paged(
        &question.text,
        options,
        option_page,
        config.options_per_page,
        config,
        |o| o.text.clone(),
    )
}
