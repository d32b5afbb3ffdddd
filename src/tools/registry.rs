use crate::access::AccessPolicy;
use crate::config::AccessConfig;
use crate::error::ToolError;
use crate::rate_limit::RateLimiter;
use crate::tools::types::{ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Upper bound on error text surfaced to the model.
const MAX_ERROR_LEN: usize = 500;

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition for the AI API
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with the given parameters
    async fn execute(&self, params: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;

    /// Returns the tool's name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Registry that holds all available tools and gates dispatch behind the
/// access policy and the rate limiter.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    access: AccessPolicy,
    limiter: Arc<RateLimiter>,
}

impl ToolRegistry {
    pub fn new(access: AccessConfig, limiter: Arc<RateLimiter>) -> Self {
        ToolRegistry {
            tools: HashMap::new(),
            access: AccessPolicy::new(access),
            limiter,
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get tool definitions (for sending to the AI)
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get count of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name. Every dispatch passes the access policy and
    /// counts against the caller's rate budget before the tool runs; domain
    /// errors come back as failed results, never panics.
    pub async fn execute(&self, name: &str, params: Value, context: &ToolContext) -> ToolResult {
        let tool = match self.get(name) {
            Some(t) => t,
            None => return ToolResult::error(format!("Tool '{}' not found", name)),
        };

        if let Err(e) = self.access.check(name, &context.caller) {
            return error_result(e);
        }
        if let Err(e) = self.limiter.check(name, &context.caller) {
            return error_result(e);
        }

        match tool.execute(params, context).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("[tools] '{}' failed: {}", name, e);
                error_result(e)
            }
        }
    }
}

fn error_result(err: ToolError) -> ToolResult {
    let mut msg = err.to_string();
    if msg.len() > MAX_ERROR_LEN {
        msg.truncate(MAX_ERROR_LEN);
        msg.push_str("...");
    }
    let result = ToolResult::error(msg);
    match err {
        // Give the model enough to schedule a retry
        ToolError::RateLimited { retry_after_secs } => result.with_metadata(serde_json::json!({
            "rate_limited": true,
            "retry_after_secs": retry_after_secs,
        })),
        ToolError::SourceUnavailable(_) => {
            result.with_metadata(serde_json::json!({ "retryable": true }))
        }
        _ => result,
    }
}
