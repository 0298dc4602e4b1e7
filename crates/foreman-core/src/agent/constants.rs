//! Agent module constants
//!
//! Centralized defaults for supervisor construction.

/// Supervisor defaults
pub mod defaults {
    /// Name used in handoff-back messages when none is configured
    pub const SUPERVISOR_NAME: &str = "supervisor";

    /// System prompt prepended to every model query unless overridden
    pub const SYSTEM_PROMPT: &str = "You are a supervisor agent. You will be responsible for \
managing the workflow of other agents and tools. You will receive user input and delegate tasks \
to the appropriate agents or tools. You will also handle the responses from the agents and tools, \
and provide feedback to the user.";

    /// Whether handoff-back messages are appended after a sub-agent run
    pub const ADD_HANDOFF_BACK_MESSAGES: bool = true;
}

/// Timeout configurations
pub mod timeouts {
    use std::time::Duration;

    /// Default tool execution timeout
    pub const TOOL_EXECUTION: Duration = Duration::from_secs(120);
}
