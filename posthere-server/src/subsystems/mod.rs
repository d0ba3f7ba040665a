pub mod assistant;
pub mod claims;
pub mod conversation;
pub mod locks;
pub mod matcher;
pub mod notifier;
pub mod reports;
pub mod sessions;
pub mod status;
pub mod submission;
