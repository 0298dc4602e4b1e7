//! Supervisor loop
//!
//! Each run alternates between querying the model and acting on the tool
//! calls it returns:
//!
//! 1. Append the user input, if any
//! 2. Query the model with `system_prompt + memory` and the registry's tools
//! 3. No tool calls: stop and return the assistant turn
//! 4. Otherwise dispatch tools / run the handoff, then go back to 2
//!
//! A `Supervisor` is also a `SubAgent`, so supervisors can be nested.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::constants::{defaults, timeouts};
use super::events::{EventSink, SupervisorEvent};
use super::handoff::{HandoffCoordinator, OutputMode};
use super::subagent::{HandoffContext, SubAgent};
use crate::ai::model::{collect_response, ChatModel};
use crate::ai::streaming::ModelResponse;
use crate::ai::types::Message;
use crate::config::{SupervisorConfig, SystemPrompt};
use crate::error::{SetupError, SupervisorError};
use crate::memory::Memory;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::registry::{Registry, Tool};

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorResponse {
    /// Final assistant turn (no tool calls)
    pub response: Message,
    /// Number of model queries made
    pub iterations: usize,
}

/// Builder for [`Supervisor`]
///
/// All validation happens in [`SupervisorBuilder::build`].
pub struct SupervisorBuilder {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    agents: Vec<Arc<dyn SubAgent>>,
    name: String,
    description: String,
    system_prompt: Vec<Message>,
    add_handoff_back_messages: bool,
    output_mode: String,
    max_iterations: Option<usize>,
    tool_timeout: Option<Duration>,
}

impl SupervisorBuilder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            tools: Vec::new(),
            agents: Vec::new(),
            name: defaults::SUPERVISOR_NAME.to_string(),
            description: String::new(),
            system_prompt: vec![Message::system(defaults::SYSTEM_PROMPT)],
            add_handoff_back_messages: defaults::ADD_HANDOFF_BACK_MESSAGES,
            output_mode: OutputMode::default().to_string(),
            max_iterations: None,
            tool_timeout: Some(timeouts::TOOL_EXECUTION),
        }
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn agent(mut self, agent: Arc<dyn SubAgent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Arc<dyn SubAgent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Shown to a parent supervisor when this one is nested
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the default system prompt
    pub fn system_prompt(mut self, prompt: impl Into<SystemPrompt>) -> Self {
        self.system_prompt = prompt.into().into_messages();
        self
    }

    pub fn no_system_prompt(mut self) -> Self {
        self.system_prompt.clear();
        self
    }

    pub fn add_handoff_back_messages(mut self, enabled: bool) -> Self {
        self.add_handoff_back_messages = enabled;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode.to_string();
        self
    }

    /// Output mode by name; an unknown name fails at `build`
    pub fn output_mode_str(mut self, mode: impl Into<String>) -> Self {
        self.output_mode = mode.into();
        self
    }

    pub fn max_iterations(mut self, max: Option<usize>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Apply every field of `config`
    pub fn with_config(mut self, config: &SupervisorConfig) -> Self {
        self.name = config.name.clone();
        self.description = config.description.clone();
        if let Some(prompt) = &config.system_prompt {
            self.system_prompt = prompt.clone().into_messages();
        }
        self.add_handoff_back_messages = config.add_handoff_back_messages;
        self.output_mode = config.output_mode.clone();
        self.max_iterations = config.max_iterations;
        self.tool_timeout = config.tool_timeout();
        self
    }

    pub fn build(self) -> Result<Supervisor, SetupError> {
        if !self.model.supports_tool_calls() {
            return Err(SetupError::ModelLacksToolCalling(self.model.name().to_string()));
        }
        let output_mode: OutputMode = self.output_mode.parse()?;
        let registry = Arc::new(Registry::new(self.tools, self.agents)?);

        let dispatcher = ToolDispatcher::new(registry.clone()).with_timeout(self.tool_timeout);
        let coordinator = HandoffCoordinator::new(registry.clone(), dispatcher, &self.name)
            .with_output_mode(output_mode)
            .with_handoff_back_messages(self.add_handoff_back_messages);

        info!(
            supervisor = %self.name,
            model = %self.model.name(),
            tools = registry.tool_names().len(),
            agents = registry.agent_names().len(),
            output_mode = %output_mode,
            "Supervisor built"
        );

        Ok(Supervisor {
            name: self.name,
            description: self.description,
            model: self.model,
            registry,
            coordinator,
            system_prompt: self.system_prompt,
            max_iterations: self.max_iterations,
        })
    }
}

/// Top-level controller routing a conversation between model, tools and agents
pub struct Supervisor {
    name: String,
    description: String,
    model: Arc<dyn ChatModel>,
    registry: Arc<Registry>,
    coordinator: HandoffCoordinator,
    system_prompt: Vec<Message>,
    max_iterations: Option<usize>,
}

impl Supervisor {
    pub fn builder(model: Arc<dyn ChatModel>) -> SupervisorBuilder {
        SupervisorBuilder::new(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn output_mode(&self) -> OutputMode {
        self.coordinator.output_mode()
    }

    pub fn system_prompt(&self) -> &[Message] {
        &self.system_prompt
    }

    /// Run until the model answers without tool calls
    ///
    /// Empty `input` is treated as no input. Events are sent to `events` if
    /// given; a dropped receiver does not affect the run.
    pub async fn run(
        &self,
        memory: &mut Memory,
        input: Option<String>,
        events: Option<mpsc::UnboundedSender<SupervisorEvent>>,
    ) -> Result<SupervisorResponse, SupervisorError> {
        let events = EventSink::new(events);
        let mut input = input.filter(|text| !text.is_empty());
        let mut iterations = 0usize;

        info!(
            supervisor = %self.name,
            memory = memory.len(),
            has_input = input.is_some(),
            "Supervisor run started"
        );

        loop {
            if let Some(text) = input.take() {
                memory.append(Message::user(text));
            }

            if let Some(max) = self.max_iterations {
                if iterations >= max {
                    return Err(SupervisorError::IterationLimit(max));
                }
            }
            iterations += 1;

            let response = self.query_model(memory, &events).await?;
            memory.append(response.message.clone());

            if response.tool_calls().is_empty() {
                info!(
                    supervisor = %self.name,
                    iterations,
                    memory = memory.len(),
                    "Supervisor run finished"
                );
                events.emit(SupervisorEvent::Finished {
                    response: response.message.clone(),
                });
                return Ok(SupervisorResponse {
                    response: response.message,
                    iterations,
                });
            }

            self.coordinator
                .handle_tool_calls(memory, response.tool_calls(), &events)
                .await?;
        }
    }

    async fn query_model(
        &self,
        memory: &Memory,
        events: &EventSink,
    ) -> Result<ModelResponse, SupervisorError> {
        let messages: Vec<Message> = self
            .system_prompt
            .iter()
            .chain(memory.all())
            .cloned()
            .collect();
        let tools = self.registry.ai_tools();

        debug!(
            model = %self.model.name(),
            messages = messages.len(),
            tools = tools.len(),
            "Querying model"
        );

        let rx = self.model.stream_with_tools(&messages, tools).await?;
        let response = collect_response(rx, |delta| {
            events.emit(SupervisorEvent::Delta {
                delta: delta.to_string(),
            })
        })
        .await?;

        debug!(
            tool_calls = response.tool_calls().len(),
            finish_reason = ?response.finish_reason,
            "Model turn complete"
        );
        Ok(response)
    }

    /// Run on a background task, streaming events as they happen
    ///
    /// The task hands back the updated memory along with the result.
    pub fn stream(
        self: &Arc<Self>,
        mut memory: Memory,
        input: Option<String>,
    ) -> (
        mpsc::UnboundedReceiver<SupervisorEvent>,
        JoinHandle<(Memory, Result<SupervisorResponse, SupervisorError>)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = supervisor.run(&mut memory, input, Some(tx)).await;
            (memory, result)
        });
        (rx, handle)
    }
}

#[async_trait]
impl SubAgent for Supervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &HandoffContext, mut memory: Memory) -> anyhow::Result<Memory> {
        debug!(
            supervisor = %self.name,
            parent = %ctx.supervisor,
            call_id = %ctx.call_id,
            "Nested supervisor invoked"
        );
        Supervisor::run(self, &mut memory, None, None).await?;
        Ok(memory)
    }
}

/// A supervisor bound to one conversation
pub struct SupervisorSession {
    supervisor: Arc<Supervisor>,
    memory: Memory,
}

impl SupervisorSession {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self::with_memory(supervisor, Memory::new())
    }

    pub fn with_memory(supervisor: Arc<Supervisor>, memory: Memory) -> Self {
        Self { supervisor, memory }
    }

    /// Send one user turn and run to completion
    pub async fn send(
        &mut self,
        input: impl Into<String>,
    ) -> Result<SupervisorResponse, SupervisorError> {
        self.supervisor
            .run(&mut self.memory, Some(input.into()), None)
            .await
    }

    pub async fn send_with_events(
        &mut self,
        input: impl Into<String>,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<SupervisorResponse, SupervisorError> {
        self.supervisor
            .run(&mut self.memory, Some(input.into()), Some(events))
            .await
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::model::ModelError;
    use crate::ai::types::{AiToolCall, Role};
    use crate::testing::{ScriptedAgent, ScriptedModel, ScriptedTurn, StaticTool};
    use serde_json::json;

    fn search() -> Arc<dyn Tool> {
        Arc::new(StaticTool::new("search", "3 results"))
    }

    fn handoff(id: &str, agent: &str) -> AiToolCall {
        AiToolCall::new(
            id,
            format!("transfer_to_{}", agent),
            json!({"task": "write", "reason": "prose"}),
        )
    }

    #[test]
    fn test_build_requires_tool_calling_model() {
        let model = Arc::new(ScriptedModel::new(vec![]).without_tool_calls());
        // checked before anything else, even with nothing registered
        let result = Supervisor::builder(model).output_mode_str("bogus").build();
        assert!(matches!(result, Err(SetupError::ModelLacksToolCalling(_))));
    }

    #[test]
    fn test_build_validation_order() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let result = Supervisor::builder(model.clone()).output_mode_str("bogus").build();
        assert!(matches!(result, Err(SetupError::InvalidOutputMode(_))));

        let result = Supervisor::builder(model.clone()).build();
        assert_eq!(
            result.err().map(|e| e.to_string()).as_deref(),
            Some("At least one agent or tool must be provided")
        );

        let result = Supervisor::builder(model)
            .tools(vec![search(), search()])
            .build();
        assert!(matches!(result, Err(SetupError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_plain_answer_stops_loop() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("Hello there")]));
        let supervisor = Supervisor::builder(model.clone())
            .tool(search())
            .build()
            .unwrap();
        let mut memory = Memory::new();

        let result = supervisor
            .run(&mut memory, Some("hi".into()), None)
            .await
            .unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.response, Message::assistant("Hello there"));
        assert_eq!(memory.all(), &[Message::user("hi"), Message::assistant("Hello there")]);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_model_sees_system_prompt_and_tools() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("ok")]));
        let supervisor = Supervisor::builder(model.clone())
            .tool(search())
            .agent(Arc::new(ScriptedAgent::new("Writer")))
            .system_prompt(vec!["One.".to_string(), "Two.".to_string()])
            .build()
            .unwrap();

        supervisor
            .run(&mut Memory::new(), Some("go".into()), None)
            .await
            .unwrap();

        let seen = model.seen_messages();
        assert_eq!(
            seen[0],
            vec![Message::system("One."), Message::system("Two."), Message::user("go")]
        );
        assert_eq!(model.seen_tools()[0], vec!["search", "transfer_to_writer"]);
    }

    #[tokio::test]
    async fn test_default_system_prompt() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("ok")]));
        let supervisor = Supervisor::builder(model.clone()).tool(search()).build().unwrap();
        assert_eq!(
            supervisor.system_prompt(),
            &[Message::system(defaults::SYSTEM_PROMPT)]
        );

        let bare = Supervisor::builder(model)
            .tool(search())
            .no_system_prompt()
            .build()
            .unwrap();
        assert!(bare.system_prompt().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_ignored() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("still here")]));
        let supervisor = Supervisor::builder(model).tool(search()).build().unwrap();
        let mut memory = Memory::from_messages(vec![Message::user("earlier")]);

        supervisor
            .run(&mut memory, Some(String::new()), None)
            .await
            .unwrap();

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.all()[0], Message::user("earlier"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedTurn::calls(vec![
                AiToolCall::new("c1", "search", json!({"q": "rust"})),
                AiToolCall::new("c2", "send_email", json!({})),
            ]),
            ScriptedTurn::text("Found 3 results"),
        ]));
        let supervisor = Supervisor::builder(model.clone()).tool(search()).build().unwrap();
        let mut memory = Memory::new();

        let result = supervisor
            .run(&mut memory, Some("look it up".into()), None)
            .await
            .unwrap();

        assert_eq!(result.iterations, 2);
        assert_eq!(result.response.content, "Found 3 results");
        let roles: Vec<Role> = memory.all().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(memory.all()[2].content, "3 results");
        assert_eq!(memory.all()[3].content, "Tool send_email does not exist");

        // the second query saw both results
        let second = &model.seen_messages()[1];
        assert_eq!(second.last().unwrap().tool_call_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_handoff_then_answer() {
        let writer = Arc::new(
            ScriptedAgent::new("Writer").with_replies(vec![Message::assistant("A poem.")]),
        );
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedTurn::calls(vec![handoff("h1", "writer")]),
            ScriptedTurn::text("Done: A poem."),
        ]));
        let supervisor = Supervisor::builder(model)
            .agent(writer.clone())
            .name("Lead")
            .output_mode(OutputMode::LastMessage)
            .build()
            .unwrap();
        let mut memory = Memory::new();

        let result = supervisor
            .run(&mut memory, Some("write a poem".into()), None)
            .await
            .unwrap();

        assert_eq!(writer.run_count(), 1);
        assert_eq!(result.response.content, "Done: A poem.");
        let contents: Vec<&str> = memory.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "write a poem",
                "",
                "Successfully transferred to Writer for task: write, reason: prose",
                "A poem.",
                "Transferring back to Lead",
                "Successfully transferred back to Lead",
                "Done: A poem.",
            ]
        );
        assert_eq!(
            memory.all()[4].tool_calls[0].name,
            "transfer_back_to_lead"
        );
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let supervisor = Supervisor::builder(model).tool(search()).build().unwrap();

        let err = supervisor
            .run(&mut Memory::new(), Some("hi".into()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::Model(ModelError::Other(_))));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let looping = (0..5)
            .map(|i| {
                ScriptedTurn::calls(vec![AiToolCall::new(format!("c{}", i), "search", json!({}))])
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(looping));
        let supervisor = Supervisor::builder(model)
            .tool(search())
            .max_iterations(Some(2))
            .build()
            .unwrap();

        let err = supervisor
            .run(&mut Memory::new(), Some("loop".into()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::IterationLimit(2)));
    }

    #[tokio::test]
    async fn test_stream_emits_deltas_and_finish() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("two words")]));
        let supervisor = Arc::new(Supervisor::builder(model).tool(search()).build().unwrap());

        let (mut rx, handle) = supervisor.stream(Memory::new(), Some("hi".into()));
        let mut text = String::new();
        let mut finished = None;
        while let Some(event) = rx.recv().await {
            match event {
                SupervisorEvent::Delta { delta } => text.push_str(&delta),
                SupervisorEvent::Finished { response } => finished = Some(response),
                _ => {}
            }
        }
        let (memory, result) = handle.await.unwrap();

        assert_eq!(text, "two words");
        assert_eq!(finished, Some(Message::assistant("two words")));
        assert_eq!(result.unwrap().response.content, "two words");
        assert_eq!(memory.len(), 2);
    }

    #[tokio::test]
    async fn test_session_keeps_memory() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedTurn::text("first"),
            ScriptedTurn::text("second"),
        ]));
        let supervisor = Arc::new(Supervisor::builder(model).tool(search()).build().unwrap());
        let mut session = SupervisorSession::new(supervisor);

        session.send("one").await.unwrap();
        let reply = session.send("two").await.unwrap();

        assert_eq!(reply.response.content, "second");
        assert_eq!(session.memory().len(), 4);
    }

    #[tokio::test]
    async fn test_nested_supervisor_as_agent() {
        let inner_model = Arc::new(ScriptedModel::new(vec![ScriptedTurn::text("inner answer")]));
        let inner: Arc<dyn SubAgent> = Arc::new(
            Supervisor::builder(inner_model.clone())
                .name("Research Team")
                .description("Handles research")
                .tool(search())
                .build()
                .unwrap(),
        );
        let outer_model = Arc::new(ScriptedModel::new(vec![
            ScriptedTurn::calls(vec![handoff("h1", "research_team")]),
            ScriptedTurn::text("outer answer"),
        ]));
        let outer = Supervisor::builder(outer_model)
            .agent(inner)
            .add_handoff_back_messages(false)
            .build()
            .unwrap();
        let mut memory = Memory::new();

        let result = outer
            .run(&mut memory, Some("research this".into()), None)
            .await
            .unwrap();

        assert_eq!(result.response.content, "outer answer");
        // inner run saw the transfer message at the end of its history
        let inner_seen = &inner_model.seen_messages()[0];
        assert!(inner_seen
            .last()
            .unwrap()
            .content
            .starts_with("Successfully transferred to Research Team"));
        // full history: inner answer merged before the outer answer
        let n = memory.len();
        assert_eq!(memory.all()[n - 2].content, "inner answer");
    }

    #[test]
    fn test_with_config() {
        let config = SupervisorConfig::from_toml_str(
            r#"
            name = "lead"
            output_mode = "last_message"
            system_prompt = "Short."
            tool_timeout_secs = 0
            "#,
        )
        .unwrap();
        let model = Arc::new(ScriptedModel::new(vec![]));
        let supervisor = Supervisor::builder(model)
            .tool(search())
            .with_config(&config)
            .build()
            .unwrap();

        assert_eq!(supervisor.name(), "lead");
        assert_eq!(supervisor.output_mode(), OutputMode::LastMessage);
        assert_eq!(supervisor.system_prompt(), &[Message::system("Short.")]);
    }
}
