//! Tools and agent handoff tools
//!
//! Provides the registry, the synthetic handoff tools, and the dispatcher
//! that runs regular tool calls.

pub mod dispatcher;
pub mod handoff;
pub mod registry;

pub use dispatcher::{DispatchError, ToolDispatcher};
pub use registry::{parse_params, FunctionTool, Registry, Resolution, Tool, ToolError};
