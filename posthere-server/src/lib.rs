pub mod context;
pub mod http;
pub mod replies;
pub mod router;
pub mod subsystems;

pub use context::{build_context, AppContext};
pub use router::handle_inbound;
