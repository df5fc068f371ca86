//! Configuration types

use crate::{ConfigError, SurveyError, SurveyResult};
use serde::{Deserialize, Serialize};

/// Settings for the USSD interview engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssdConfig {
    /// Inactivity window in minutes. Also the minimum age of a completion
    /// record before a retake is allowed.
    pub timeout_minutes: i64,
    pub households_per_page: usize,
    pub members_per_page: usize,
    pub options_per_page: usize,
    /// Dialling code stripped from inbound MSISDNs.
    pub country_phone_code: String,
    /// Home menu entry that opens the household list.
    pub households_menu_key: String,
    pub yes_key: String,
    pub no_key: String,
    pub next_page_key: String,
    pub previous_page_key: String,
}

impl Default for UssdConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 5,
            households_per_page: 4,
            members_per_page: 4,
            options_per_page: 3,
            country_phone_code: "256".to_string(),
            households_menu_key: "00".to_string(),
            yes_key: "1".to_string(),
            no_key: "2".to_string(),
            next_page_key: "#".to_string(),
            previous_page_key: "*".to_string(),
        }
    }
}

impl UssdConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SURVEY_USSD_TIMEOUT_MINUTES` (default: 5)
    /// - `SURVEY_USSD_HOUSEHOLDS_PER_PAGE` (default: 4)
    /// - `SURVEY_USSD_MEMBERS_PER_PAGE` (default: 4)
    /// - `SURVEY_USSD_OPTIONS_PER_PAGE` (default: 3)
    /// - `SURVEY_USSD_COUNTRY_PHONE_CODE` (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            timeout_minutes: std::env::var("SURVEY_USSD_TIMEOUT_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_minutes),
            households_per_page: std::env::var("SURVEY_USSD_HOUSEHOLDS_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.households_per_page),
            members_per_page: std::env::var("SURVEY_USSD_MEMBERS_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.members_per_page),
            options_per_page: std::env::var("SURVEY_USSD_OPTIONS_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.options_per_page),
            country_phone_code: std::env::var("SURVEY_USSD_COUNTRY_PHONE_CODE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.country_phone_code),
            ..defaults
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(SurveyError::Config) if invalid.
    ///
    /// Validates:
    /// - timeout_minutes > 0
    /// - every page size > 0
    /// - menu keys are non-empty and pairwise distinct
    pub fn validate(&self) -> SurveyResult<()> {
        if self.timeout_minutes <= 0 {
            return Err(SurveyError::Config(ConfigError::InvalidValue {
                field: "timeout_minutes".to_string(),
                value: self.timeout_minutes.to_string(),
                reason: "timeout_minutes must be greater than 0".to_string(),
            }));
        }

        for (field, size) in [
            ("households_per_page", self.households_per_page),
            ("members_per_page", self.members_per_page),
            ("options_per_page", self.options_per_page),
        ] {
            if size == 0 {
                return Err(SurveyError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: size.to_string(),
                    reason: format!("{} must be greater than 0", field),
                }));
            }
        }

        let keys = [
            ("yes_key", &self.yes_key),
            ("no_key", &self.no_key),
            ("next_page_key", &self.next_page_key),
            ("previous_page_key", &self.previous_page_key),
            ("households_menu_key", &self.households_menu_key),
        ];
        for (field, key) in keys {
            if key.trim().is_empty() {
                return Err(SurveyError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: key.clone(),
                    reason: "menu keys must not be empty".to_string(),
                }));
            }
        }

        // The yes/no answers may repeat a home menu digit, but paging keys must
        // never collide with any selection key.
        let distinct = [
            (("yes_key", &self.yes_key), ("no_key", &self.no_key)),
            (
                ("next_page_key", &self.next_page_key),
                ("previous_page_key", &self.previous_page_key),
            ),
            (("next_page_key", &self.next_page_key), ("yes_key", &self.yes_key)),
            (("next_page_key", &self.next_page_key), ("no_key", &self.no_key)),
            (("previous_page_key", &self.previous_page_key), ("yes_key", &self.yes_key)),
            (("previous_page_key", &self.previous_page_key), ("no_key", &self.no_key)),
        ];
        for ((name_a, a), (name_b, b)) in distinct {
            if a == b {
                return Err(SurveyError::Config(ConfigError::IncompatibleOptions {
                    option_a: name_a.to_string(),
                    option_b: name_b.to_string(),
                }));
            }
        }

        Ok(())
    }

    /// Timeout as a chrono duration.
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.timeout_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = UssdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let config = UssdConfig {
            options_per_page: 0,
            ..UssdConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("options_per_page"));
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        let config = UssdConfig {
            timeout_minutes: 0,
            ..UssdConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SurveyError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_rejects_clashing_keys() {
        let config = UssdConfig {
            next_page_key: "*".to_string(),
            ..UssdConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SurveyError::Config(ConfigError::IncompatibleOptions { .. }))
        ));
    }

    #[test]
    fn test_rejects_empty_key() {
        let config = UssdConfig {
            yes_key: "  ".to_string(),
            ..UssdConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
