//! Handoff coordination
//!
//! Splits a turn's tool calls into regular tools and agent handoffs, runs
//! the regular ones through the dispatcher, and executes at most one handoff.
//! Everything lands in memory as correlated tool messages, regular results
//! first.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{EventSink, SupervisorEvent};
use super::subagent::{HandoffContext, SubAgent};
use crate::ai::types::{AiToolCall, Message};
use crate::error::{SetupError, SupervisorError};
use crate::memory::Memory;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::handoff::{create_handoff_back_messages, transfer_message, HandoffArgs};
use crate::tools::registry::{HandoffTarget, Registry, Resolution};

/// How much of a sub-agent's memory is merged back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// The agent's whole resulting memory replaces the supervisor's
    #[default]
    FullHistory,
    /// Only the agent's final message is appended
    LastMessage,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::FullHistory => "full_history",
            OutputMode::LastMessage => "last_message",
        }
    }
}

impl FromStr for OutputMode {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_history" => Ok(OutputMode::FullHistory),
            "last_message" => Ok(OutputMode::LastMessage),
            other => Err(SetupError::InvalidOutputMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn's calls, partitioned
pub struct ClassifiedCalls {
    pub regular: Vec<AiToolCall>,
    /// Handoffs to registered agents; only these count toward the one-per-turn limit
    pub handoffs: Vec<(AiToolCall, HandoffTarget)>,
    pub unknown_agents: Vec<AiToolCall>,
}

/// Runs tool calls and agent handoffs for the supervisor loop
pub struct HandoffCoordinator {
    registry: Arc<Registry>,
    dispatcher: ToolDispatcher,
    output_mode: OutputMode,
    add_handoff_back_messages: bool,
    supervisor_name: String,
}

impl HandoffCoordinator {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: ToolDispatcher,
        supervisor_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            output_mode: OutputMode::default(),
            add_handoff_back_messages: true,
            supervisor_name: supervisor_name.into(),
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_handoff_back_messages(mut self, enabled: bool) -> Self {
        self.add_handoff_back_messages = enabled;
        self
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Partition calls, keeping request order within each group
    pub fn classify(&self, calls: &[AiToolCall]) -> ClassifiedCalls {
        let mut regular = Vec::new();
        let mut handoffs = Vec::new();
        let mut unknown_agents = Vec::new();
        for call in calls {
            match self.registry.resolve(&call.name) {
                Resolution::Handoff(target) => handoffs.push((call.clone(), target)),
                Resolution::UnknownAgent(_) => unknown_agents.push(call.clone()),
                Resolution::Regular(_) | Resolution::NotFound => regular.push(call.clone()),
            }
        }
        ClassifiedCalls {
            regular,
            handoffs,
            unknown_agents,
        }
    }

    /// Process one turn's tool calls against `memory`
    ///
    /// Only sub-agent failures escape; every other problem is reported to
    /// the model as a tool message.
    pub async fn handle_tool_calls(
        &self,
        memory: &mut Memory,
        calls: &[AiToolCall],
        events: &EventSink,
    ) -> Result<(), SupervisorError> {
        let ClassifiedCalls {
            regular,
            handoffs,
            unknown_agents,
        } = self.classify(calls);

        for call in &regular {
            events.emit(SupervisorEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
            });
        }
        let mut pending = self.dispatcher.dispatch(&regular).await;

        for call in &unknown_agents {
            warn!(tool = %call.name, "Handoff to unknown agent");
            pending.push(Message::tool_result(
                &call.id,
                &call.name,
                format!("Agent {} does not exist", call.name),
            ));
        }

        match handoffs.len() {
            0 => {}
            1 => {
                if let Some((call, target)) = handoffs.into_iter().next() {
                    return self
                        .execute_handoff(memory, call, target, pending, events)
                        .await;
                }
            }
            _ => {
                warn!(count = handoffs.len(), "Multiple handoffs requested in one turn");
                pending.extend(multiple_handoff_errors(&handoffs));
            }
        }

        memory.extend(pending);
        Ok(())
    }

    async fn execute_handoff(
        &self,
        memory: &mut Memory,
        call: AiToolCall,
        target: HandoffTarget,
        mut pending: Vec<Message>,
        events: &EventSink,
    ) -> Result<(), SupervisorError> {
        let agent = target.agent;
        let args = HandoffArgs::from_call(&call);
        pending.push(transfer_message(&call, agent.name(), &args));
        // The agent must see a history that already accounts for this handoff
        memory.extend(pending);

        events.emit(SupervisorEvent::HandoffStarted {
            agent: agent.name().to_string(),
            task: args.task.clone(),
        });

        let ctx = HandoffContext {
            supervisor: self.supervisor_name.clone(),
            agent: target.agent_key,
            call_id: call.id.clone(),
            task: args.task,
            reason: args.reason,
        };

        let before = memory.len();
        let result = self.run_agent(agent.as_ref(), &ctx, memory).await?;
        self.merge_back(memory, result, agent.system_prompt());

        if self.add_handoff_back_messages {
            memory.extend(create_handoff_back_messages(
                agent.name(),
                &self.supervisor_name,
            ));
        }

        let messages_added = memory.len().saturating_sub(before);
        info!(
            agent = %agent.name(),
            output_mode = %self.output_mode,
            messages_added,
            "Handoff complete"
        );
        events.emit(SupervisorEvent::HandoffCompleted {
            agent: agent.name().to_string(),
            messages_added,
        });
        Ok(())
    }

    /// Run `agent` on an isolated copy of `memory`
    async fn run_agent(
        &self,
        agent: &dyn SubAgent,
        ctx: &HandoffContext,
        memory: &Memory,
    ) -> Result<Memory, SupervisorError> {
        let mut snapshot = memory.snapshot();
        if let Some(prompt) = agent.system_prompt() {
            snapshot.insert_system(prompt);
        }

        info!(
            agent = %agent.name(),
            task = ctx.task.as_deref().unwrap_or(""),
            messages = snapshot.len(),
            "Running sub-agent"
        );

        agent
            .run(ctx, snapshot)
            .await
            .map_err(|source| SupervisorError::Agent {
                agent: agent.name().to_string(),
                source,
            })
    }

    fn merge_back(&self, memory: &mut Memory, mut result: Memory, injected: Option<&str>) {
        match self.output_mode {
            OutputMode::FullHistory => {
                if let Some(prompt) = injected {
                    if !result.remove_leading_system(prompt) {
                        warn!("Sub-agent memory no longer starts with its system prompt");
                    }
                }
                memory.replace(result.into_messages());
            }
            OutputMode::LastMessage => match result.last() {
                Some(last) => memory.append(last.clone()),
                None => warn!("Sub-agent returned empty memory; nothing to merge"),
            },
        }
    }
}

fn multiple_handoff_errors(handoffs: &[(AiToolCall, HandoffTarget)]) -> Vec<Message> {
    let names: Vec<&str> = handoffs.iter().map(|(c, _)| c.name.as_str()).collect();
    let content = format!(
        "Multiple agent handoff tools selected: {} - please select only one.",
        names.join(", ")
    );
    handoffs
        .iter()
        .map(|(call, _)| Message::tool_result(&call.id, &call.name, content.clone()))
        .collect()
}
