//! Survey USSD - Interview Engine
//!
//! Drives household interviews over USSD. Each gateway request carries one
//! line of input; [`UssdInterview::handle`] reads the investigator's session,
//! validates the input against the current screen, records answers and
//! completion through a [`survey_storage::SurveyStore`], and returns the next
//! screen.
//!
//! Modules, bottom-up:
//! - [`pagination`]: 1-based pages and label resolution
//! - [`rules`]: answer rule conditions and outcomes
//! - [`graph`]: applicable questions and the pending-question derivation
//! - [`answers`]: answer validation and recording
//! - [`completion`]: member and household completion per batch
//! - [`session`]: typed session variables
//! - [`interview`]: the state machine

pub mod answers;
pub mod completion;
pub mod graph;
pub mod interview;
pub mod menus;
pub mod messages;
pub mod pagination;
pub mod rules;
pub mod session;
pub mod state;
pub mod ussd;

pub use answers::{parse_answer, AnswerStore};
pub use completion::CompletionTracker;
pub use graph::QuestionGraph;
pub use interview::UssdInterview;
pub use pagination::{paginate, resolve_index, Page};
pub use rules::RuleOutcome;
pub use session::{SessionCache, SessionKey};
pub use state::{InterviewState, QuestionCursor, QuestionMode, TerminalReason};
pub use ussd::{normalize_msisdn, Confirmation, MenuInput, UssdAction, UssdRequest, UssdResponse};
