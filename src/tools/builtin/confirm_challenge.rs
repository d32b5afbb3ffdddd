//! Check whether a wallet-ownership challenge has been satisfied on chain.

use crate::error::ToolError;
use crate::models::ChallengeStatus;
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

pub struct ConfirmChallengeTool {
    definition: ToolDefinition,
    challenges: Arc<VerificationService>,
}

impl ConfirmChallengeTool {
    pub fn new(challenges: Arc<VerificationService>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "agent_id".to_string(),
            PropertySchema::string("Identifier of the agent whose challenge to confirm"),
        );

        ConfirmChallengeTool {
            definition: ToolDefinition {
                name: "confirm_challenge".to_string(),
                description: "Check whether the challenge transfer has arrived from the claimed \
                    wallet. Safe to poll: verification happens at most once, and a still-pending \
                    challenge just reports pending."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["agent_id".to_string()],
                },
            },
            challenges,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfirmChallengeParams {
    agent_id: String,
}

#[async_trait]
impl Tool for ConfirmChallengeTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let p: ConfirmChallengeParams = super::parse_params(params)?;

        let outcome = self.challenges.confirm_challenge(&p.agent_id).await?;

        let content = match outcome.status {
            ChallengeStatus::Verified => {
                format!("Agent '{}' has verified wallet ownership.", p.agent_id)
            }
            ChallengeStatus::Expired => {
                format!("Challenge for agent '{}' expired without payment.", p.agent_id)
            }
            ChallengeStatus::Pending if outcome.throttled => format!(
                "Challenge for agent '{}' is still pending; the chain cache was synced \
                 recently, try again shortly.",
                p.agent_id
            ),
            ChallengeStatus::Pending => {
                format!("Challenge for agent '{}' is still pending.", p.agent_id)
            }
        };

        let mut metadata = json!({
            "agent_id": p.agent_id,
            "status": outcome.status.as_str(),
            "throttled": outcome.throttled,
        });
        if let Some(proof) = &outcome.proof {
            metadata["proof_event_id"] = json!(proof.event_id);
            metadata["proof_sender"] = json!(proof.sender);
        }

        Ok(ToolResult::success(content).with_metadata(metadata))
    }
}
