//! Transport boundary types for the USSD gateway.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use survey_core::{Timestamp, UssdConfig};

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// One inbound USSD exchange, already decoded from the gateway's form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssdRequest {
    pub transaction_id: String,
    /// Caller number as sent by the gateway, possibly with country code.
    pub msisdn: String,
    pub request_string: String,
    /// False on a fresh dial, true for replies within a session.
    pub is_continuation: bool,
    pub received_at: Timestamp,
}

impl UssdRequest {
    /// A fresh dial. The request string is ignored by the engine.
    pub fn dial(transaction_id: impl Into<String>, msisdn: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            msisdn: msisdn.into(),
            request_string: String::new(),
            is_continuation: false,
            received_at: Utc::now(),
        }
    }

    /// A reply within an open session.
    pub fn reply(
        transaction_id: impl Into<String>,
        msisdn: impl Into<String>,
        request_string: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            msisdn: msisdn.into(),
            request_string: request_string.into(),
            is_continuation: true,
            received_at: Utc::now(),
        }
    }

    pub fn at(mut self, received_at: Timestamp) -> Self {
        self.received_at = received_at;
        self
    }

    /// Input with surrounding whitespace removed.
    pub fn input(&self) -> &str {
        self.request_string.trim()
    }
}

/// Action token returned to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UssdAction {
    /// Keep the session open and wait for input
    Request,
    /// Terminate the session
    End,
}

impl UssdAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UssdAction::Request => "request",
            UssdAction::End => "end",
        }
    }
}

impl fmt::Display for UssdAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssdResponse {
    pub text: String,
    pub action: UssdAction,
}

impl UssdResponse {
    pub fn request(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: UssdAction::Request,
        }
    }

    pub fn end(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: UssdAction::End,
        }
    }

    /// Prepend a message prefix such as `INVALID ANSWER: `.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.text.insert_str(0, prefix);
        self
    }

    pub fn is_end(&self) -> bool {
        self.action == UssdAction::End
    }
}

// ============================================================================
// INPUT PARSING
// ============================================================================

/// Strip a leading `+`, the country code and a trunk `0` from a caller number.
pub fn normalize_msisdn(msisdn: &str, country_code: &str) -> String {
    let digits = msisdn.trim().trim_start_matches('+');
    let national = if !country_code.is_empty() && digits.len() > country_code.len() {
        digits.strip_prefix(country_code).unwrap_or(digits)
    } else {
        digits
    };
    national.trim_start_matches('0').to_string()
}

/// Menu input on a paginated screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    Next,
    Previous,
    Number(usize),
    Other,
}

impl MenuInput {
    pub fn parse(raw: &str, config: &UssdConfig) -> Self {
        let raw = raw.trim();
        if raw == config.next_page_key {
            MenuInput::Next
        } else if raw == config.previous_page_key {
            MenuInput::Previous
        } else {
            raw.parse().map(MenuInput::Number).unwrap_or(MenuInput::Other)
        }
    }
}

/// Answer to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
}

impl Confirmation {
    pub fn parse(raw: &str, config: &UssdConfig) -> Option<Self> {
        let raw = raw.trim();
        if raw == config.yes_key {
            Some(Confirmation::Yes)
        } else if raw == config.no_key {
            Some(Confirmation::No)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_msisdn() {
        assert_eq!(normalize_msisdn("256776520831", "256"), "776520831");
        assert_eq!(normalize_msisdn("+256776520831", "256"), "776520831");
        assert_eq!(normalize_msisdn("0776520831", "256"), "776520831");
        assert_eq!(normalize_msisdn(" 776520831 ", "256"), "776520831");
        assert_eq!(normalize_msisdn("256", "256"), "256");
    }

    #[test]
    fn test_menu_input_parse() {
        let config = UssdConfig::default();
        assert_eq!(MenuInput::parse("#", &config), MenuInput::Next);
        assert_eq!(MenuInput::parse(" * ", &config), MenuInput::Previous);
        assert_eq!(MenuInput::parse("3", &config), MenuInput::Number(3));
        assert_eq!(MenuInput::parse("-1", &config), MenuInput::Other);
        assert_eq!(MenuInput::parse("abc", &config), MenuInput::Other);
        assert_eq!(MenuInput::parse("", &config), MenuInput::Other);
    }

    #[test]
    fn test_confirmation_parse() {
        let config = UssdConfig::default();
        assert_eq!(Confirmation::parse("1", &config), Some(Confirmation::Yes));
        assert_eq!(Confirmation::parse("2", &config), Some(Confirmation::No));
        assert_eq!(Confirmation::parse("yes", &config), None);
    }

    #[test]
    fn test_response_prefix_and_action() {
        let response = UssdResponse::request("Q1?").with_prefix("INVALID ANSWER: ");
        assert_eq!(response.text, "INVALID ANSWER: Q1?");
        assert!(!response.is_end());
        assert_eq!(UssdResponse::end("bye").action.to_string(), "end");
        assert_eq!(UssdAction::Request.as_str(), "request");
    }

    #[test]
    fn test_request_constructors() {
        let dial = UssdRequest::dial("t1", "256776520831");
        assert!(!dial.is_continuation);
        let reply = UssdRequest::reply("t1", "256776520831", " 10 ");
        assert!(reply.is_continuation);
        assert_eq!(reply.input(), "10");
    }
}
