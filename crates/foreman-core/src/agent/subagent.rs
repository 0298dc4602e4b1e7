//! Delegate agents
//!
//! A sub-agent receives an owned copy of the supervisor's memory and returns
//! its updated memory. How it gets there (its own model loop, a nested
//! supervisor, a fixed pipeline) is up to the implementation.

use async_trait::async_trait;

use crate::memory::Memory;

/// Details of the handoff that started a sub-agent run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffContext {
    /// Name of the delegating supervisor
    pub supervisor: String,
    /// Normalized name of the agent being run
    pub agent: String,
    /// Call id of the handoff request
    pub call_id: String,
    pub task: Option<String>,
    pub reason: Option<String>,
}

#[async_trait]
pub trait SubAgent: Send + Sync {
    /// Display name; normalized for lookup and handoff tool naming
    fn name(&self) -> &str;

    /// One-line description shown in the handoff tool definition
    fn description(&self) -> &str {
        ""
    }

    /// Prompt injected as a leading system row of the memory the agent sees
    ///
    /// The row is removed again before a full-history merge.
    fn system_prompt(&self) -> Option<&str> {
        None
    }

    /// Run against `memory` and return the resulting memory
    async fn run(&self, ctx: &HandoffContext, memory: Memory) -> anyhow::Result<Memory>;
}
