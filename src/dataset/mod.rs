//! Dataset loading and holdout splitting.

pub mod loader;
pub mod split;

pub use loader::{InteractionData, load_content, load_interactions, load_target_users};
pub use split::split_holdout;
