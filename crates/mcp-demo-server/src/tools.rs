use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_core::server::{Peer, ToolHandler};
use mcp_core::McpCoreError;
use mcp_protocol::{ContentBlock, EnumOption, PrimitiveSchema, RequestSchema};
use serde_json::Value;

/// Echoes its `text` argument back as a single text content block. Exercised
/// synchronously — demonstrates the plain (non task-augmented) `tools/call` path.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the `text` argument back as a text content block."
    }

    fn input_schema(&self) -> RequestSchema {
        RequestSchema {
            properties: vec![(
                "text".to_string(),
                PrimitiveSchema::String {
                    min_length: Some(1),
                    max_length: None,
                    format: None,
                    default: None,
                },
            )],
            required: vec!["text".to_string()],
        }
    }

    async fn call(&self, arguments: Value, _peer: Arc<Peer>) -> Result<Vec<ContentBlock>, McpCoreError> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| McpCoreError::InvalidParams {
                method: "tools/call".to_string(),
                reason: "echo requires a string `text` argument".to_string(),
            })?;
        Ok(vec![ContentBlock::text(text)])
    }
}

/// Counts from 1 to `count`, pausing between ticks. Meant to be called with
/// `task` set: run synchronously it just blocks for `count * 200ms`,
/// but its point is to demonstrate the task-augmented path completing in the
/// background while the caller polls `tasks/get`, and to emit a
/// `notifications/progress` per tick when the caller passed a progress token.
pub struct SlowCountTool;

#[async_trait]
impl ToolHandler for SlowCountTool {
    fn name(&self) -> &str {
        "slow_count"
    }

    fn description(&self) -> &str {
        "Counts up to `count`, one tick per 200ms. Intended for task-augmented calls."
    }

    fn input_schema(&self) -> RequestSchema {
        RequestSchema {
            properties: vec![(
                "count".to_string(),
                PrimitiveSchema::Integer {
                    minimum: Some(1),
                    maximum: Some(100),
                    default: Some(5),
                },
            )],
            required: vec![],
        }
    }

    async fn call(&self, arguments: Value, peer: Arc<Peer>) -> Result<Vec<ContentBlock>, McpCoreError> {
        let count = arguments.get("count").and_then(Value::as_u64).unwrap_or(5).min(100);
        for tick in 1..=count {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tracing::debug!(tick, count, "slow_count tick");
            peer.send_progress(tick as f64, Some(count as f64))?;
        }
        Ok(vec![ContentBlock::text(format!("counted to {count}"))])
    }
}

/// A single-select form elicitation demo: asks the client to pick a color,
/// then echoes the choice back. Exercises `Peer::elicit_form`.
pub struct ChooseColorTool;

#[async_trait]
impl ToolHandler for ChooseColorTool {
    fn name(&self) -> &str {
        "choose_color"
    }

    fn description(&self) -> &str {
        "Asks the client to elicit a color choice from its user, then reports it."
    }

    fn input_schema(&self) -> RequestSchema {
        RequestSchema::default()
    }

    async fn call(&self, _arguments: Value, peer: Arc<Peer>) -> Result<Vec<ContentBlock>, McpCoreError> {
        let schema = RequestSchema {
            properties: vec![(
                "color".to_string(),
                PrimitiveSchema::SingleSelect {
                    options: vec![
                        EnumOption::titled("red", "Red"),
                        EnumOption::titled("green", "Green"),
                        EnumOption::titled("blue", "Blue"),
                    ],
                    default: None,
                    title_style: Some(mcp_protocol::TitleStyle::OneOf),
                },
            )],
            required: vec!["color".to_string()],
        };

        let response = peer.elicit_form("Pick a color", schema).await?;
        Ok(vec![ContentBlock::text(format!("client chose: {response}"))])
    }
}
