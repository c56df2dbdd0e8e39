mod common;

use async_trait::async_trait;
use common::Roles;
use plateit::assistant::{Assistant, ChatRequest, LoopState, Tool, ToolBox, ToolContext};
use plateit::error::{Error, Result};
use plateit::model::contains_url;
use plateit::providers::{Attachment, Role, ToolDefinition};
use plateit::{Recipe, RecipeStep, UiType};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const VIDEO_RESULTS: &str = "Title: Tonkotsu Ramen at Home\nLink: https://www.youtube.com/watch?v=r1\n\
Thumbnail: https://i.ytimg.com/vi/r1/hqdefault.jpg\nChannel: Way of Ramen\nViews: 1.2M\nLength: 12:03\n";

const VIDEO_LIST_RESPONSE: &str = r#"{
    "chat_bubble": "I found a great tonkotsu video for you: https://www.youtube.com/watch?v=r1",
    "ui_type": "video_list",
    "video_data": {"items": [{
        "title": "Tonkotsu Ramen at Home",
        "url": "https://www.youtube.com/watch?v=r1",
        "thumbnail": "https://i.ytimg.com/vi/r1/hqdefault.jpg"
    }]}
}"#;

/// Stand-in for the YouTube search tool
struct VideoSearch {
    delay: Duration,
    calls: AtomicUsize,
}

impl VideoSearch {
    fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(VideoSearch {
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for VideoSearch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_youtube".to_string(),
            description: "Search YouTube".to_string(),
            parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }
    }

    async fn call(&self, _args: &Value, _ctx: &ToolContext) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(VIDEO_RESULTS.to_string())
    }
}

fn assistant(roles: &Roles, tool: Arc<VideoSearch>) -> Assistant {
    Assistant::new(&roles.models(), ToolBox::new(vec![tool as Arc<dyn Tool>]))
}

#[tokio::test]
async fn test_single_tool_round_trip() {
    let roles = Roles::new();
    roles
        .reasoner
        .call_tool("search_youtube", json!({"query": "tonkotsu ramen"}))
        .reply("Here's a great tonkotsu video.");
    roles.formatter.reply(VIDEO_LIST_RESPONSE);
    let tool = VideoSearch::new();

    let report = assistant(&roles, tool.clone())
        .run_turn(ChatRequest::new("Show me how to make ramen"))
        .await
        .unwrap();

    assert_eq!(
        report.transitions,
        vec![
            LoopState::Reasoning,
            LoopState::ToolExecution,
            LoopState::Reasoning,
            LoopState::Formatting,
        ]
    );
    assert_eq!(report.tool_rounds, 1);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.response.ui_type, UiType::VideoList);
    assert_eq!(report.response.video_data.as_ref().unwrap().items.len(), 1);
    assert!(!contains_url(&report.response.chat_bubble));
    assert_eq!(report.response.chat_bubble, "I found a great tonkotsu video for you:");

    let requests = roles.reasoner.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].name, "search_youtube");
    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.content, VIDEO_RESULTS);

    let waiter = roles.formatter.requests().remove(0);
    assert_eq!(waiter.response_schema.as_ref().unwrap().name, "agent_response");
    assert!(waiter.messages[1].content.contains("Tool result (search_youtube)"));
}

#[tokio::test]
async fn test_plain_answer_skips_tools() {
    let roles = Roles::new();
    roles.reasoner.reply("Keep stirring until it coats the spoon.");
    roles
        .formatter
        .reply(r#"{"chat_bubble": "Keep stirring until it coats the spoon.", "ui_type": "none"}"#);

    let request = ChatRequest {
        recipe: Some(Recipe {
            name: "Custard".to_string(),
            steps: vec![RecipeStep::new("Heat the milk."), RecipeStep::new("Stir in the yolks.")],
            ..Default::default()
        }),
        current_step: 1,
        ..ChatRequest::new("Is it thick enough?")
    };
    let report = assistant(&roles, VideoSearch::new()).run_turn(request).await.unwrap();

    assert_eq!(report.transitions, vec![LoopState::Reasoning, LoopState::Formatting]);
    assert_eq!(report.response.ui_type, UiType::None);
    let system = roles.reasoner.requests().remove(0).messages.remove(0);
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("\"Step 2 of 2: Stir in the yolks.\""));
}

#[tokio::test]
async fn test_tool_rounds_are_capped() {
    let roles = Roles::new();
    for _ in 0..5 {
        roles.reasoner.call_tool("search_youtube", json!({"query": "ramen"}));
    }
    roles.formatter.reply(VIDEO_LIST_RESPONSE);
    let tool = VideoSearch::new();

    let report = assistant(&roles, tool.clone())
        .with_limits(2, Duration::from_secs(30))
        .run_turn(ChatRequest::new("ramen videos please"))
        .await
        .unwrap();

    assert_eq!(
        report.transitions,
        vec![
            LoopState::Reasoning,
            LoopState::ToolExecution,
            LoopState::Reasoning,
            LoopState::ToolExecution,
            LoopState::Formatting,
        ]
    );
    assert_eq!(report.tool_rounds, 2);
    assert_eq!(roles.reasoner.calls(), 2);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_the_model() {
    let roles = Roles::new();
    roles
        .reasoner
        .call_tool("order_groceries", json!({}))
        .reply("I can't order groceries, but here is a list.");
    roles
        .formatter
        .reply(r#"{"chat_bubble": "I can't order groceries.", "ui_type": "none"}"#);

    let report = assistant(&roles, VideoSearch::new())
        .run_turn(ChatRequest::new("order me eggs"))
        .await
        .unwrap();

    let requests = roles.reasoner.requests();
    let tool_message = &requests[1].messages.last().unwrap().content;
    assert_eq!(tool_message, "Error: unknown tool 'order_groceries'");
    assert_eq!(report.tool_rounds, 1);
}

#[tokio::test]
async fn test_inconsistent_response_fails_the_turn() {
    let roles = Roles::new();
    roles.reasoner.reply("Here are some recipes.");
    roles
        .formatter
        .reply(r#"{"chat_bubble": "Here you go", "ui_type": "recipe_list"}"#);

    let result = assistant(&roles, VideoSearch::new())
        .run_turn(ChatRequest::new("dinner ideas"))
        .await;

    assert!(matches!(result, Err(Error::Agent(_))));
}

#[tokio::test]
async fn test_reasoning_failure_is_an_agent_error() {
    let roles = Roles::new();

    let result = assistant(&roles, VideoSearch::new())
        .chat(ChatRequest::new("hello"))
        .await;

    match result {
        Err(Error::Agent(message)) => assert!(message.contains("script exhausted")),
        other => panic!("expected agent error, got {other:?}"),
    }
    assert_eq!(roles.formatter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_turn_budget_is_enforced() {
    let roles = Roles::new();
    roles.reasoner.call_tool("search_youtube", json!({"query": "ramen"}));
    let tool = VideoSearch::slow(Duration::from_secs(600));

    let result = assistant(&roles, tool)
        .with_limits(6, Duration::from_secs(5))
        .run_turn(ChatRequest::new("ramen"))
        .await;

    match result {
        Err(Error::Agent(message)) => assert!(message.contains("budget")),
        other => panic!("expected budget error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_profile_hint_and_image_reach_reasoning() {
    let roles = Roles::new();
    roles.reasoner.reply("Use olive oil instead.");
    roles
        .formatter
        .reply(r#"{"chat_bubble": "Use olive oil instead.", "ui_type": "none"}"#);

    let request = ChatRequest {
        user_id: Some("u42".to_string()),
        image_data: Some("aGVsbG8=".to_string()),
        ..ChatRequest::new("What can I substitute for butter?")
    };
    assistant(&roles, VideoSearch::new()).run_turn(request).await.unwrap();

    let sent = roles.reasoner.requests().remove(0).messages;
    assert!(sent[1].role == Role::System && sent[1].content.contains("get_user_context"));
    assert!(sent[1].content.contains("\"u42\""));
    let latest = sent.last().unwrap();
    assert_eq!(latest.role, Role::User);
    assert_eq!(latest.attachments, vec![Attachment::jpeg("aGVsbG8=")]);
}

#[tokio::test]
async fn test_bare_links_are_scrubbed_from_the_bubble() {
    let roles = Roles::new();
    roles.reasoner.reply("Watch youtu.be/r1 or read allrecipes.com/recipe/1.");
    roles.formatter.reply(
        r#"{"chat_bubble": "Watch youtu.be/r1 or read allrecipes.com/recipe/1 or youtube.com/watch?v=abc", "ui_type": "none"}"#,
    );

    let report = assistant(&roles, VideoSearch::new())
        .run_turn(ChatRequest::new("ramen links?"))
        .await
        .unwrap();

    assert!(!contains_url(&report.response.chat_bubble), "{}", report.response.chat_bubble);
    assert_eq!(report.response.chat_bubble, "Watch or read or");
}
