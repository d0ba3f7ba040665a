pub mod report;
pub mod session;

pub use report::{
    fallback_item_key, item_tokens, normalize_secret, shares_token, MatchStatus, NewReport,
    Report, ReportKind, ReportSubmission,
};
pub use session::{ChatRole, ChatTurn, CollectedFields, Session, SessionState, Step};
