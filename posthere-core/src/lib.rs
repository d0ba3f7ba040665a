pub mod config;
pub mod db;
pub mod error;
pub mod messaging;
pub mod models;
pub mod nlu;
pub mod payload;
pub mod prompt;
pub mod store;
pub mod translate;

pub use config::PostHereConfig;
pub use error::PostHereError;
pub use messaging::{create_sender, LogSender, MessageSender, SendError, TwilioSender};
pub use nlu::{ChatCompletionClient, NluBackend, NluError};
pub use payload::{extract_payload, NluReply, ReportPayload};
pub use store::{MemoryStore, ReportStore, SessionStore};
pub use translate::{create_normalizer, normalize_item_key, Normalizer, TranslateError};
