pub mod manager;
pub mod types;

pub use manager::{ConversationCache, InFlightGuard};
pub use types::CacheLimits;
