//! Test utilities for PostHere.
//!
//! Capability fakes and report fixtures so conversation, matching and HTTP tests run against
//! the in-memory store without any external service.
//!
//! - [`RecordingSender`]: captures outbound messages, optionally failing or slow
//! - [`ScriptedNlu`]: replays canned completions
//! - [`FlakyReportStore`]: a memory store whose inserts can be switched to fail

pub mod fixtures;
pub mod flaky_store;
pub mod mock_nlu;
pub mod mock_sender;

pub use fixtures::{report, submission};
pub use flaky_store::FlakyReportStore;
pub use mock_nlu::ScriptedNlu;
pub use mock_sender::RecordingSender;
