//! Settlement receipt for a paid invoice.

use crate::error::ToolError;
use crate::invoice::InvoiceService;
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

pub struct GetReceiptTool {
    definition: ToolDefinition,
    invoices: Arc<InvoiceService>,
}

impl GetReceiptTool {
    pub fn new(invoices: Arc<InvoiceService>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "invoice_id".to_string(),
            PropertySchema::string("Id of the paid invoice"),
        );

        GetReceiptTool {
            definition: ToolDefinition {
                name: "get_receipt".to_string(),
                description: "Fetch the settlement receipt for a paid invoice: who paid, how \
                    much, when, and the on-chain event id. Fails for unpaid invoices."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["invoice_id".to_string()],
                },
            },
            invoices,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetReceiptParams {
    invoice_id: String,
}

#[async_trait]
impl Tool for GetReceiptTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let p: GetReceiptParams = super::parse_params(params)?;

        let invoice = self.invoices.receipt(&p.invoice_id)?;
        let identity_level = self.invoices.identity_level(&invoice)?;
        let paid_amount = ton::nano_or_zero(invoice.tx_amount_nano.as_deref().unwrap_or("0"));

        let content = format!(
            "Receipt for invoice {}: {} TON received from {} at {} (event {}).",
            invoice.invoice_id,
            ton::format_nano(paid_amount),
            invoice.tx_sender.as_deref().unwrap_or("unknown"),
            invoice
                .paid_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string()),
            invoice.tx_event_id.as_deref().unwrap_or("unknown"),
        );

        Ok(ToolResult::success(content).with_metadata(json!({
            "invoice_id": invoice.invoice_id,
            "description": invoice.description,
            "amount_due_nano": invoice.amount_nano,
            "amount_due_ton": ton::format_nano(ton::nano_or_zero(&invoice.amount_nano)),
            "amount_paid_nano": invoice.tx_amount_nano,
            "amount_paid_ton": ton::format_nano(paid_amount),
            "recipient": invoice.recipient,
            "payer_agent_id": invoice.payer_agent_id,
            "identity_level": identity_level.as_str(),
            "paid_at": invoice.paid_at.map(|t| t.to_rfc3339()),
            "tx_event_id": invoice.tx_event_id,
            "tx_sender": invoice.tx_sender,
        })))
    }
}
