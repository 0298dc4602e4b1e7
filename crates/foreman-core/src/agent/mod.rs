//! Supervisor and handoff orchestration
//!
//! ## Core Components
//! - `Supervisor` - Top-level model/tool/agent loop
//! - `HandoffCoordinator` - Classifies tool calls and runs at most one handoff
//! - `SubAgent` - Capability implemented by delegate agents
//!
//! ## Events
//! - `SupervisorEvent` - Deltas, tool calls and handoffs as they happen

pub mod constants;
pub mod events;
pub mod handoff;
pub mod subagent;
pub mod supervisor;

pub use events::{EventSink, SupervisorEvent};
pub use handoff::{HandoffCoordinator, OutputMode};
pub use subagent::{HandoffContext, SubAgent};
pub use supervisor::{Supervisor, SupervisorBuilder, SupervisorResponse, SupervisorSession};
