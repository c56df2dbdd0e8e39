//! Tool-calling cooking assistant.
//!
//! One chat turn runs a small state machine: `reasoning` calls a
//! tool-capable model, `tool_execution` answers every call it requested and
//! returns to `reasoning`, and `formatting` turns the transcript into an
//! [`AgentResponse`]. The turn holds no memory of its own; the caller
//! supplies prior history with each request.

pub mod tools;

pub use tools::{Backends, Builtin, BuiltinTool, Tool, ToolBox, ToolContext};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::model::{agent_response_schema, AgentResponse, Recipe};
use crate::providers::{Attachment, LlmProvider, LlmRequest, Message, Models, Role};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REASONING_PROMPT: &str = include_str!("prompts/reasoning.txt");
const USER_CONTEXT_HINT: &str = include_str!("prompts/user_context_hint.txt");
const WAITER_PROMPT: &str = include_str!("prompts/waiter.txt");

/// Words that make a message worth checking the user's saved profile for
const PROFILE_KEYWORDS: [&str; 8] = [
    "pantry",
    "preference",
    "allerg",
    "substitut",
    "diet",
    "vegan",
    "vegetarian",
    "gluten",
];

/// One chat turn as sent by the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Recipe the user is cooking, if any
    #[serde(default)]
    pub recipe: Option<Recipe>,
    /// Zero-based index into `recipe.steps`
    #[serde(default)]
    pub current_step: i64,
    /// Base64 JPEG from the camera
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Earlier messages of the conversation, oldest first
    #[serde(default)]
    pub history: Vec<Message>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        ChatRequest {
            message: message.into(),
            ..Default::default()
        }
    }

    /// What the user is working on, as told to the reasoning model
    pub fn step_context(&self) -> String {
        match self.recipe.as_ref().filter(|r| !r.steps.is_empty()) {
            None => "General Cooking Support".to_string(),
            Some(recipe) => usize::try_from(self.current_step)
                .ok()
                .and_then(|index| recipe.steps.get(index).map(|step| (index, step)))
                .map_or_else(
                    || "Unknown step index.".to_string(),
                    |(index, step)| {
                        format!("Step {} of {}: {}", index + 1, recipe.steps.len(), step.instruction)
                    },
                ),
        }
    }

    fn wants_profile(&self) -> bool {
        let message = self.message.to_lowercase();
        self.user_id.is_some() && PROFILE_KEYWORDS.iter().any(|k| message.contains(k))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Reasoning,
    ToolExecution,
    Formatting,
}

/// Everything one completed turn produced
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub response: AgentResponse,
    /// States in the order they were entered
    pub transitions: Vec<LoopState>,
    pub tool_rounds: usize,
    /// Conversation after the turn, for the caller to persist
    pub messages: Vec<Message>,
}

/// The cooking assistant
pub struct Assistant {
    reasoner: Arc<dyn LlmProvider>,
    formatter: Arc<dyn LlmProvider>,
    tools: ToolBox,
    max_tool_rounds: usize,
    turn_budget: Duration,
}

impl Assistant {
    pub fn new(models: &Models, tools: ToolBox) -> Self {
        Assistant {
            reasoner: models.reasoner.clone(),
            formatter: models.formatter.clone(),
            tools,
            max_tool_rounds: 6,
            turn_budget: Duration::from_secs(120),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let models = Models::from_config(config)?;
        let tools = ToolBox::from_config(config).await?;
        Ok(Assistant::new(&models, tools)
            .with_limits(config.assistant.max_tool_rounds, config.assistant.turn_budget()))
    }

    /// Cap on tool rounds per turn and on the turn's wall-clock time
    pub fn with_limits(mut self, max_tool_rounds: usize, turn_budget: Duration) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self.turn_budget = turn_budget;
        self
    }

    /// Run one turn and return only the response
    pub async fn chat(&self, request: ChatRequest) -> Result<AgentResponse> {
        Ok(self.run_turn(request).await?.response)
    }

    /// Run one turn to its terminal state. Any failure aborts the turn with
    /// [`Error::Agent`]; nothing from a failed turn is returned.
    pub async fn run_turn(&self, request: ChatRequest) -> Result<TurnReport> {
        match tokio::time::timeout(self.turn_budget, self.drive(request)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(Error::Agent(message))) => Err(Error::Agent(message)),
            Ok(Err(e)) => Err(Error::Agent(e.to_string())),
            Err(_) => Err(Error::Agent(format!(
                "turn exceeded its budget of {}s",
                self.turn_budget.as_secs()
            ))),
        }
    }

    async fn drive(&self, request: ChatRequest) -> Result<TurnReport> {
        let ctx = ToolContext {
            user_id: request.user_id.clone(),
        };
        let system = self.system_messages(&request);
        let mut messages = conversation(&request);
        let definitions = self.tools.definitions();

        let mut state = LoopState::Reasoning;
        let mut transitions = vec![state];
        let mut tool_rounds = 0;
        info!("Chat turn started ({} prior messages)", request.history.len());

        loop {
            state = match state {
                LoopState::Reasoning => {
                    let mut prompt = system.clone();
                    prompt.extend(messages.iter().cloned());
                    let reply = self
                        .reasoner
                        .complete(&LlmRequest::new(prompt).with_tools(definitions.clone()))
                        .await?;
                    if reply.wants_tools() {
                        debug!("Reasoning requested {} tool call(s)", reply.tool_calls.len());
                        messages.push(Message::assistant_tool_calls(reply.content, reply.tool_calls));
                        LoopState::ToolExecution
                    } else {
                        if !reply.content.trim().is_empty() {
                            messages.push(Message::assistant(reply.content));
                        }
                        LoopState::Formatting
                    }
                }
                LoopState::ToolExecution => {
                    let calls = messages.last().map(|m| m.tool_calls.clone()).unwrap_or_default();
                    for call in &calls {
                        let output = self.tools.execute(call, &ctx).await;
                        messages.push(Message::tool_result(call, output));
                    }
                    tool_rounds += 1;
                    if tool_rounds >= self.max_tool_rounds {
                        warn!("Reached {} tool rounds, formatting what we have", tool_rounds);
                        LoopState::Formatting
                    } else {
                        LoopState::Reasoning
                    }
                }
                LoopState::Formatting => {
                    let response = self.format(&messages).await?;
                    info!("Chat turn finished as {:?} after {} tool round(s)", response.ui_type, tool_rounds);
                    return Ok(TurnReport {
                        response,
                        transitions,
                        tool_rounds,
                        messages,
                    });
                }
            };
            transitions.push(state);
        }
    }

    fn system_messages(&self, request: &ChatRequest) -> Vec<Message> {
        let mut system = vec![Message::system(
            REASONING_PROMPT
                .trim()
                .replace("{step_context}", &request.step_context()),
        )];
        if let (true, Some(user_id)) = (request.wants_profile(), request.user_id.as_deref()) {
            system.push(Message::system(
                USER_CONTEXT_HINT.trim().replace("{user_id}", user_id),
            ));
        }
        system
    }

    /// The waiter: transcript in, validated [`AgentResponse`] out
    async fn format(&self, messages: &[Message]) -> Result<AgentResponse> {
        let request = LlmRequest::prompt(WAITER_PROMPT.trim(), transcript(messages))
            .with_schema("agent_response", agent_response_schema());
        let reply = self.formatter.complete(&request).await?;
        debug!("Waiter output: {}", reply.content);
        AgentResponse::from_model_json(&reply.content)
    }
}

/// Prior history plus the new user message, carrying the camera image if any
fn conversation(request: &ChatRequest) -> Vec<Message> {
    let mut messages: Vec<Message> = request
        .history
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    let mut latest = Message::user(request.message.trim());
    if let Some(image) = request.image_data.as_deref().filter(|data| !data.is_empty()) {
        latest = latest.with_attachment(Attachment::jpeg(image));
    }
    messages.push(latest);
    messages
}

/// Flatten the conversation into plain text for the structured-output model
fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(format!("User: {}", m.content)),
            Role::Assistant if m.tool_calls.is_empty() => Some(format!("Assistant: {}", m.content)),
            Role::Assistant => {
                let calls: Vec<String> = m
                    .tool_calls
                    .iter()
                    .map(|call| format!("{}({})", call.name, call.arguments))
                    .collect();
                Some(format!("Assistant called: {}", calls.join(", ")))
            }
            Role::Tool => Some(format!(
                "Tool result ({}):\n{}",
                m.name.as_deref().unwrap_or("tool"),
                m.content
            )),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecipeStep;
    use crate::providers::ToolCall;
    use serde_json::json;

    fn recipe() -> Recipe {
        Recipe {
            name: "Omelette".to_string(),
            steps: vec![RecipeStep::new("Whisk the eggs."), RecipeStep::new("Cook gently.")],
            ..Default::default()
        }
    }

    #[test]
    fn test_step_context() {
        let mut request = ChatRequest::new("is this done?");
        assert_eq!(request.step_context(), "General Cooking Support");

        request.recipe = Some(recipe());
        assert_eq!(request.step_context(), "Step 1 of 2: Whisk the eggs.");
        request.current_step = 1;
        assert_eq!(request.step_context(), "Step 2 of 2: Cook gently.");
        request.current_step = 2;
        assert_eq!(request.step_context(), "Unknown step index.");
        request.current_step = -1;
        assert_eq!(request.step_context(), "Unknown step index.");
    }

    #[test]
    fn test_profile_hint_needs_user_and_keyword() {
        let mut request = ChatRequest::new("What can I substitute for butter?");
        assert!(!request.wants_profile());
        request.user_id = Some("u1".to_string());
        assert!(request.wants_profile());
        request.message = "How long do I boil pasta?".to_string();
        assert!(!request.wants_profile());
    }

    #[test]
    fn test_conversation_attaches_image_to_latest_message() {
        let request = ChatRequest {
            image_data: Some("aGVsbG8=".to_string()),
            history: vec![Message::system("old"), Message::user("hi"), Message::assistant("hello")],
            ..ChatRequest::new("does this look right?")
        };
        let messages = conversation(&request);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].attachments.is_empty());
        assert_eq!(messages[2].content, "does this look right?");
        assert_eq!(messages[2].attachments, vec![Attachment::jpeg("aGVsbG8=")]);
    }

    #[test]
    fn test_transcript_shows_tool_traffic() {
        let call = ToolCall {
            id: "c1".to_string(),
            name: "search_youtube".to_string(),
            arguments: json!({"query": "ramen"}),
        };
        let messages = vec![
            Message::user("ramen videos?"),
            Message::assistant_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call, "Title: Ramen"),
            Message::assistant("Here are some."),
        ];
        assert_eq!(
            transcript(&messages),
            "User: ramen videos?\n\n\
             Assistant called: search_youtube({\"query\":\"ramen\"})\n\n\
             Tool result (search_youtube):\nTitle: Ramen\n\n\
             Assistant: Here are some."
        );
    }
}
