//! Foreman Core - multi-agent supervisor controller
//!
//! This crate routes a conversation between a tool-calling model, a set of
//! tools, and a set of delegate agents:
//! - Supervisor loop with a single shared memory
//! - Agent handoffs with isolated memory snapshots and merge-back
//! - Tool dispatch that turns every failure into a tool message
//! - Optional retry decorator for models

pub mod agent;
pub mod ai;
pub mod config;
pub mod error;
pub mod memory;
pub mod testing;
pub mod tools;

// Re-exports for convenience
pub use agent::{
    HandoffContext, OutputMode, SubAgent, Supervisor, SupervisorBuilder, SupervisorEvent,
    SupervisorResponse, SupervisorSession,
};
pub use ai::streaming::StreamPart;
pub use ai::types::{AiTool, AiToolCall, Message, Role};
pub use ai::{ChatModel, ModelError};
pub use config::{SupervisorConfig, SystemPrompt};
pub use error::{ConfigError, SetupError, SupervisorError};
pub use memory::Memory;
pub use tools::{FunctionTool, Registry, Tool, ToolError};
