//! Issue a payment invoice with a correlation comment and deep links.

use crate::error::ToolError;
use crate::invoice::{CreateInvoiceRequest, InvoiceService};
use crate::ton;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct CreateInvoiceTool {
    definition: ToolDefinition,
    invoices: Arc<InvoiceService>,
}

impl CreateInvoiceTool {
    pub fn new(invoices: Arc<InvoiceService>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "amount_ton".to_string(),
            PropertySchema::string("Amount due in TON, e.g. \"1.5\""),
        );
        properties.insert(
            "description".to_string(),
            PropertySchema::string("What the invoice is for (free text)"),
        );
        properties.insert(
            "payer_agent".to_string(),
            PropertySchema::string("Agent id expected to pay, if known"),
        );
        properties.insert(
            "payer_wallet".to_string(),
            PropertySchema::string("Wallet the payment must come from (enables strict matching)"),
        );
        properties.insert(
            "strict".to_string(),
            PropertySchema::boolean(
                "Require the payment to come from the expected sender wallet",
                false,
            ),
        );
        properties.insert(
            "ttl_secs".to_string(),
            PropertySchema::integer("Seconds until the invoice expires (default 3600)"),
        );

        CreateInvoiceTool {
            definition: ToolDefinition {
                name: "create_invoice".to_string(),
                description: "Create a TON invoice. Returns the payment comment the payer must \
                    attach verbatim, plus ton:// and Tonkeeper payment links. Use strict mode \
                    when the payment must provably come from a specific wallet."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["amount_ton".to_string()],
                },
            },
            invoices,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceParams {
    amount_ton: String,
    description: Option<String>,
    payer_agent: Option<String>,
    payer_wallet: Option<String>,
    #[serde(default)]
    strict: bool,
    ttl_secs: Option<i64>,
}

#[async_trait]
impl Tool for CreateInvoiceTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let p: CreateInvoiceParams = super::parse_params(params)?;

        let invoice = self.invoices.create_invoice(&CreateInvoiceRequest {
            amount_ton: p.amount_ton,
            description: p.description,
            payer_agent: p.payer_agent,
            payer_wallet: p.payer_wallet,
            strict: p.strict,
            ttl_secs: p.ttl_secs,
        })?;

        let amount_nano = ton::nano_or_zero(&invoice.amount_nano);
        let links = ton::payment_links(&invoice.recipient, amount_nano, &invoice.comment);

        let content = format!(
            "Invoice {} created: {} TON to {} with comment '{}', valid until {}.",
            invoice.invoice_id,
            ton::format_nano(amount_nano),
            invoice.recipient,
            invoice.comment,
            invoice.expires_at.to_rfc3339(),
        );

        Ok(ToolResult::success(content).with_metadata(json!({
            "invoice_id": invoice.invoice_id,
            "amount_nano": invoice.amount_nano,
            "amount_ton": ton::format_nano(amount_nano),
            "recipient": invoice.recipient,
            "comment": invoice.comment,
            "strict_sender": invoice.strict_sender,
            "expected_sender": invoice.expected_sender,
            "expires_at": invoice.expires_at.to_rfc3339(),
            "links": links,
        })))
    }
}
