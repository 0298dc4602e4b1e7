//! Model layer
//!
//! Message types, the streaming protocol, and the `ChatModel` capability the
//! supervisor drives. Provider clients live outside this crate.

pub mod model;
pub mod retry;
pub mod streaming;
pub mod types;

pub use model::{collect_response, ChatModel, ModelError};
pub use retry::{RetryConfig, RetryPreset, RetryingModel};
