//! Issue a wallet-ownership challenge for a counterpart agent.

use crate::error::ToolError;
use crate::ton;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::verify::VerificationService;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct CreateChallengeTool {
    definition: ToolDefinition,
    challenges: Arc<VerificationService>,
}

impl CreateChallengeTool {
    pub fn new(challenges: Arc<VerificationService>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "agent_id".to_string(),
            PropertySchema::string("Identifier of the agent claiming the wallet"),
        );
        properties.insert(
            "wallet".to_string(),
            PropertySchema::string("TON address the agent claims to control"),
        );
        properties.insert(
            "amount_ton".to_string(),
            PropertySchema::string("Challenge amount in TON (default 0.01)"),
        );
        properties.insert(
            "ttl_secs".to_string(),
            PropertySchema::integer("Seconds until the challenge expires (default 900)"),
        );

        CreateChallengeTool {
            definition: ToolDefinition {
                name: "create_challenge".to_string(),
                description: "Issue a wallet-ownership challenge: the agent proves control of a \
                    claimed TON wallet by sending a small tagged transfer from it. Returns the \
                    exact comment and payment links to hand to the agent."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["agent_id".to_string(), "wallet".to_string()],
                },
            },
            challenges,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateChallengeParams {
    agent_id: String,
    wallet: String,
    amount_ton: Option<String>,
    ttl_secs: Option<i64>,
}

#[async_trait]
impl Tool for CreateChallengeTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let p: CreateChallengeParams = super::parse_params(params)?;

        let challenge = self.challenges.create_challenge(
            &p.agent_id,
            &p.wallet,
            p.amount_ton.as_deref(),
            p.ttl_secs,
        )?;

        let amount_nano = ton::nano_or_zero(&challenge.amount_nano);
        let receive_wallet = self.challenges.receive_wallet().to_string();
        let links = ton::payment_links(&receive_wallet, amount_nano, &challenge.tag);

        let content = format!(
            "Challenge issued for agent '{}'. Ask them to send {} TON from {} to {} with the \
             exact comment '{}' before {}.",
            challenge.agent_id,
            ton::format_nano(amount_nano),
            challenge.wallet,
            receive_wallet,
            challenge.tag,
            challenge.expires_at.to_rfc3339(),
        );

        Ok(ToolResult::success(content).with_metadata(json!({
            "agent_id": challenge.agent_id,
            "wallet": challenge.wallet,
            "tag": challenge.tag,
            "amount_nano": challenge.amount_nano,
            "amount_ton": ton::format_nano(amount_nano),
            "receive_wallet": receive_wallet,
            "expires_at": challenge.expires_at.to_rfc3339(),
            "links": links,
        })))
    }
}
