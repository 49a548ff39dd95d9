//! Bounded tool execution loop with partial-result salvage.
//!
//! Flow: prompt → LLM → if tool_use → execute tools → inject results → LLM
//! → repeat. Stops when the model emits a plain content response or the
//! round budget runs out; in the latter case the caller synthesizes a
//! closing message from whatever the tools did return.

use tracing::{debug, info, warn};

use argus_core::provider::{ProviderError, ToolCall, ToolChatRequest, ToolCompleter};

use super::{to_definitions, Tool, ToolResult};

const MAX_TOKENS: u32 = 1024;
/// Cap on how much of one tool result is kept for the salvage buffer.
const PARTIAL_RESULT_CHARS: usize = 800;

/// What the loop produced.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    /// Final plain-content reply, or `None` when the round budget ran out.
    pub reply: Option<String>,
    /// Successful tool outputs accumulated across rounds.
    pub partial_results: Vec<String>,
    pub rounds_used: usize,
}

/// Run up to `max_rounds` tool rounds and return what came out.
pub async fn run_tool_loop(
    completer: &dyn ToolCompleter,
    system: &str,
    initial_messages: Vec<serde_json::Value>,
    tools: &[Box<dyn Tool>],
    max_rounds: usize,
) -> Result<ToolLoopOutcome, ProviderError> {
    let mut messages = initial_messages;
    let mut partial_results: Vec<String> = Vec::new();
    let definitions = to_definitions(tools);

    for round in 0..max_rounds {
        let req = ToolChatRequest {
            system: system.to_string(),
            messages: messages.clone(),
            tools: definitions.clone(),
            max_tokens: MAX_TOKENS,
        };

        debug!(round, "tool loop round");
        let response = completer.complete_with_tools(&req).await?;

        if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
            info!(round, "tool loop complete");
            return Ok(ToolLoopOutcome {
                reply: Some(response.content),
                partial_results,
                rounds_used: round,
            });
        }

        // Assistant turn: any text plus the tool_use blocks.
        let mut assistant_content: Vec<serde_json::Value> = Vec::new();
        if !response.content.is_empty() {
            assistant_content.push(serde_json::json!({
                "type": "text",
                "text": response.content,
            }));
        }
        for call in &response.tool_calls {
            assistant_content.push(serde_json::json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }));
        }
        messages.push(serde_json::json!({
            "role": "assistant",
            "content": assistant_content,
        }));

        // Execute each call and append all results as one user turn.
        let mut result_content: Vec<serde_json::Value> = Vec::new();
        for call in &response.tool_calls {
            let result = execute_tool(tools, call).await;
            if !result.is_error && !result.content.trim().is_empty() {
                partial_results.push(clip(&result.content, PARTIAL_RESULT_CHARS));
            }
            result_content.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": call.id,
                "content": result.content,
                "is_error": result.is_error,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": result_content,
        }));
    }

    warn!(max_rounds, "tool loop exhausted its round budget");
    Ok(ToolLoopOutcome {
        reply: None,
        partial_results,
        rounds_used: max_rounds,
    })
}

/// Find and execute the named tool. Unknown names become error results.
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone()).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::provider::ToolChatResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed script of responses.
    struct ScriptedCompleter {
        script: Mutex<Vec<ToolChatResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedCompleter {
        fn new(mut script: Vec<ToolChatResponse>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolCompleter for ScriptedCompleter {
        async fn complete_with_tools(
            &self,
            _req: &ToolChatRequest,
        ) -> Result<ToolChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::Unavailable("script exhausted".into()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input back"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, input: serde_json::Value) -> ToolResult {
            ToolResult::success(input["text"].as_str().unwrap_or("").to_string())
        }
    }

    fn tool_use_response(text: &str) -> ToolChatResponse {
        ToolChatResponse {
            content: String::new(),
            stop_reason: "tool_use".to_string(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "echo".to_string(),
                input: serde_json::json!({"text": text}),
            }],
        }
    }

    fn final_response(text: &str) -> ToolChatResponse {
        ToolChatResponse {
            content: text.to_string(),
            stop_reason: "end_turn".to_string(),
            tool_calls: vec![],
        }
    }

    fn user_message(text: &str) -> Vec<serde_json::Value> {
        vec![serde_json::json!({"role": "user", "content": text})]
    }

    #[tokio::test]
    async fn loop_ends_on_plain_content() {
        let completer = ScriptedCompleter::new(vec![
            tool_use_response("first lookup"),
            final_response("here is your answer"),
        ]);
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];

        let outcome = run_tool_loop(&completer, "sys", user_message("hi"), &tools, 5)
            .await
            .unwrap();

        assert_eq!(outcome.reply.as_deref(), Some("here is your answer"));
        assert_eq!(outcome.rounds_used, 1);
        assert_eq!(outcome.partial_results, vec!["first lookup".to_string()]);
    }

    #[tokio::test]
    async fn budget_exhaustion_keeps_partials() {
        let script: Vec<ToolChatResponse> =
            (0..5).map(|i| tool_use_response(&format!("result {i}"))).collect();
        let completer = ScriptedCompleter::new(script);
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];

        let outcome = run_tool_loop(&completer, "sys", user_message("hi"), &tools, 5)
            .await
            .unwrap();

        assert!(outcome.reply.is_none());
        assert_eq!(outcome.rounds_used, 5);
        assert_eq!(outcome.partial_results.len(), 5);
        // Exactly max_rounds completions, never more.
        assert_eq!(completer.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_not_partial() {
        let completer = ScriptedCompleter::new(vec![
            ToolChatResponse {
                content: String::new(),
                stop_reason: "tool_use".to_string(),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "missing".to_string(),
                    input: serde_json::Value::Null,
                }],
            },
            final_response("done"),
        ]);
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];

        let outcome = run_tool_loop(&completer, "sys", user_message("hi"), &tools, 5)
            .await
            .unwrap();

        assert_eq!(outcome.reply.as_deref(), Some("done"));
        assert!(outcome.partial_results.is_empty());
    }
}
