//! Plays USSD sessions against an in-memory survey world.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use survey_core::{Timestamp, UssdConfig};
use survey_test_utils::fixtures::{SurveyWorld, INVESTIGATOR_MSISDN};
use survey_test_utils::{InMemorySessionBackend, MockStorage};
use survey_ussd::{
    menus, messages, InterviewState, SessionCache, UssdInterview, UssdRequest, UssdResponse,
};

/// Household completion prompt under the default keys.
pub fn household_completion() -> String {
    menus::confirmation(messages::HOUSEHOLD_COMPLETION, &UssdConfig::default())
}

/// Resume prompt under the default keys.
pub fn resume_prompt() -> String {
    menus::confirmation(messages::RESUME, &UssdConfig::default())
}

pub struct Handset {
    pub world: SurveyWorld,
    pub msisdn: String,
    pub now: Timestamp,
    pub config: UssdConfig,
    transactions: u32,
}

impl Handset {
    pub fn new(world: SurveyWorld) -> Self {
        Self {
            world,
            msisdn: INVESTIGATOR_MSISDN.to_string(),
            now: Utc::now(),
            config: UssdConfig::default(),
            transactions: 0,
        }
    }

    pub fn with_config(mut self, config: UssdConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(&self) -> UssdInterview<'_, MockStorage, InMemorySessionBackend> {
        UssdInterview::new(&self.world.storage, &self.world.sessions)
            .with_config(self.config.clone())
            .unwrap()
    }

    fn tick(&mut self) -> Timestamp {
        self.now += Duration::seconds(1);
        self.now
    }

    fn transaction_id(&self) -> String {
        format!("txn-{}", self.transactions)
    }

    /// Open a new USSD session.
    pub fn dial(&mut self) -> UssdResponse {
        self.transactions += 1;
        let at = self.tick();
        let request = UssdRequest::dial(self.transaction_id(), self.msisdn.clone()).at(at);
        self.engine().handle(&request)
    }

    /// Send a reply within the current session.
    pub fn reply(&mut self, input: &str) -> UssdResponse {
        let at = self.tick();
        let request = UssdRequest::reply(self.transaction_id(), self.msisdn.clone(), input).at(at);
        self.engine().handle(&request)
    }

    /// Send several replies, returning the last response.
    pub fn replies(&mut self, inputs: &[&str]) -> UssdResponse {
        let mut last = None;
        for input in inputs {
            last = Some(self.reply(input));
        }
        last.unwrap_or_else(|| panic!("no replies sent"))
    }

    pub fn wait_minutes(&mut self, minutes: i64) {
        self.now += Duration::minutes(minutes);
    }

    pub fn session(&self) -> SessionCache<'_, InMemorySessionBackend> {
        SessionCache::new(&self.world.sessions, self.world.investigator_id())
    }

    pub fn state(&self) -> InterviewState {
        self.session().state().unwrap()
    }

    pub fn answer_count(&self) -> usize {
        self.world.storage.answer_count().unwrap()
    }
}
