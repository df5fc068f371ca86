//! Fixed handset texts.

pub const INVALID_SELECTION: &str = "INVALID SELECTION: ";
pub const INVALID_ANSWER: &str = "INVALID ANSWER: ";
pub const RECONFIRM: &str = "RECONFIRM: ";

pub const HOUSEHOLD_LIST: &str = "Select a household:";
pub const MEMBERS_LIST: &str = "Select a household member:";

pub const MEMBER_SUCCESS: &str = "Thank you. Member interview complete.";
pub const HOUSEHOLD_COMPLETION: &str =
    "Household completed. Would you like to start with another household?";
pub const RESUME: &str = "Would you like to resume with the previous interview?";

pub const NO_HOUSEHOLDS: &str = "Sorry, you have no households registered.";
pub const ALL_HOUSEHOLDS_COMPLETE: &str =
    "Thank you. You have completed this survey for all households.";
pub const USER_NOT_REGISTERED: &str = "Sorry, your mobile number is not registered.";
pub const INVESTIGATOR_BLOCKED: &str = "Sorry, your account is blocked. Contact your supervisor.";
pub const SERVICE_UNAVAILABLE: &str = "Sorry, the service is unavailable. Please try again later.";

pub const HEAD_SUFFIX: &str = " - (HEAD)";
pub const COMPLETE_MARK: &str = "*";

pub fn welcome(name: &str, households_menu_key: &str) -> String {
    format!(
        "Welcome {} to the survey.\n{}: Households list",
        name, households_menu_key
    )
}

pub fn previous_line(key: &str) -> String {
    format!("{}: Back", key)
}

pub fn next_line(key: &str) -> String {
    format!("{}: Next", key)
}

/// Yes/no prompt offering the configured keys.
pub fn confirmation(question: &str, yes_key: &str, no_key: &str) -> String {
    format!("{}\n{}: Yes\n{}: No", question, yes_key, no_key)
}
