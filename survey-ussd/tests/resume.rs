//! Resume prompt and inactivity timeout.

mod support;

use support::{household_completion, resume_prompt, Handset};
use survey_core::{AnswerType, RuleAction, RuleCondition, UssdConfig};
use survey_test_utils::fixtures::SurveyWorld;
use survey_ussd::{messages, InterviewState};

fn interview_in_progress() -> Handset {
    let world = SurveyWorld::new().unwrap();
    world.add_household("Okello", &[]).unwrap();
    let batch = world.add_batch("Housing", 1).unwrap();
    world
        .add_question(&batch, "Q1", "How many rooms?", AnswerType::Number)
        .unwrap();
    world
        .add_question(&batch, "Q2", "How many windows?", AnswerType::Number)
        .unwrap();
    let mut handset = Handset::new(world);
    handset.dial();
    handset.replies(&["00", "1", "1"]);
    assert_eq!(handset.reply("10").text, "How many windows?");
    handset
}

#[test]
fn test_redial_offers_resume() {
    let mut handset = interview_in_progress();

    assert_eq!(handset.dial().text, resume_prompt());
    assert_eq!(handset.reply("1").text, "How many windows?");
    assert_eq!(handset.reply("5").text, household_completion());
    assert_eq!(handset.answer_count(), 2);
}

#[test]
fn test_resume_prompt_offers_configured_keys() {
    let config = UssdConfig {
        yes_key: "9".to_string(),
        no_key: "8".to_string(),
        ..UssdConfig::default()
    };
    let mut handset = interview_in_progress().with_config(config);

    assert_eq!(
        handset.dial().text,
        "Would you like to resume with the previous interview?\n9: Yes\n8: No"
    );
    assert_eq!(handset.reply("9").text, "How many windows?");
}

#[test]
fn test_redial_into_resume_prompt_repeats_it() {
    let mut handset = interview_in_progress();
    handset.dial();
    assert_eq!(handset.dial().text, resume_prompt());
    assert!(matches!(handset.state(), InterviewState::ResumePrompt { .. }));
}

#[test]
fn test_resume_declined_returns_to_member_list() {
    let mut handset = interview_in_progress();
    handset.dial();

    assert_eq!(
        handset.reply("2").text,
        "Select a household member:\n1: Okello - (HEAD)"
    );
}

#[test]
fn test_resume_prompt_rejects_other_input() {
    let mut handset = interview_in_progress();
    handset.dial();

    assert_eq!(
        handset.reply("3").text,
        format!("{}{}", messages::INVALID_SELECTION, resume_prompt())
    );
    assert_eq!(handset.reply("1").text, "How many windows?");
}

#[test]
fn test_reply_after_timeout_shows_resume() {
    let mut handset = interview_in_progress();
    handset.wait_minutes(6);

    assert_eq!(handset.reply("5").text, resume_prompt());
    assert_eq!(handset.answer_count(), 1);

    // The session went stale, so resuming starts from the household list.
    assert_eq!(handset.reply("1").text, "Select a household:\n1: HH-1-Okello");
}

#[test]
fn test_reply_within_timeout_continues() {
    let mut handset = interview_in_progress();
    handset.wait_minutes(4);

    assert_eq!(handset.reply("5").text, household_completion());
}

#[test]
fn test_redial_after_timeout_resumes_from_household_list() {
    let mut handset = interview_in_progress();
    handset.wait_minutes(30);

    assert_eq!(handset.dial().text, resume_prompt());
    assert_eq!(handset.reply("1").text, "Select a household:\n1: HH-1-Okello");
}

#[test]
fn test_timeout_ignored_outside_interview() {
    let world = SurveyWorld::new().unwrap();
    world.add_household("Okello", &[]).unwrap();
    let batch = world.add_batch("Housing", 1).unwrap();
    world
        .add_question(&batch, "Q1", "How many rooms?", AnswerType::Number)
        .unwrap();
    let mut handset = Handset::new(world);
    handset.dial();
    handset.reply("00");
    handset.wait_minutes(20);

    assert_eq!(
        handset.reply("1").text,
        "Select a household member:\n1: Okello - (HEAD)"
    );
}

#[test]
fn test_redial_from_home_shows_welcome() {
    let world = SurveyWorld::new().unwrap();
    world.add_household("Okello", &[]).unwrap();
    world.add_batch("Housing", 1).unwrap();
    let mut handset = Handset::new(world);
    handset.dial();
    handset.reply("00");

    assert_eq!(
        handset.dial().text,
        "Welcome Amina to the survey.\n00: Households list"
    );
    assert_eq!(handset.state(), InterviewState::Home);
}

#[test]
fn test_declined_resume_still_collects_reconfirmation() {
    let world = SurveyWorld::new().unwrap();
    world.add_household("Okello", &[]).unwrap();
    let batch = world.add_batch("Housing", 1).unwrap();
    let q1 = world
        .add_question(&batch, "Q1", "How many rooms?", AnswerType::Number)
        .unwrap();
    world
        .add_question(&batch, "Q2", "How many doors?", AnswerType::Number)
        .unwrap();
    let q3 = world
        .add_question(&batch, "Q3", "How many windows?", AnswerType::Number)
        .unwrap();
    world
        .add_rule(
            &q3,
            RuleCondition::GreaterThanQuestion(q1.question_id),
            RuleAction::Reanswer,
        )
        .unwrap();
    let mut handset = Handset::new(world);
    handset.dial();
    handset.replies(&["00", "1", "1", "3", "1"]);
    assert_eq!(handset.reply("5").text, "RECONFIRM: How many rooms?");
    assert_eq!(handset.answer_count(), 1);

    assert_eq!(handset.dial().text, resume_prompt());
    assert_eq!(
        handset.reply("2").text,
        "Select a household member:\n1: Okello - (HEAD)"
    );

    // The deleted answers are pending again without the session queue.
    assert_eq!(handset.reply("1").text, "How many rooms?");
    assert_eq!(handset.reply("10").text, "How many windows?");
    assert_eq!(handset.reply("5").text, household_completion());
    assert_eq!(handset.answer_count(), 3);
}
