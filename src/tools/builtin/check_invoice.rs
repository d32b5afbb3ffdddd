//! Resolve an invoice against the chain: paid, pending or expired.

use crate::error::ToolError;
use crate::invoice::InvoiceService;
use crate::models::InvoiceStatus;
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

pub struct CheckInvoiceTool {
    definition: ToolDefinition,
    invoices: Arc<InvoiceService>,
}

impl CheckInvoiceTool {
    pub fn new(invoices: Arc<InvoiceService>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "invoice_id".to_string(),
            PropertySchema::string("Id of the invoice to check"),
        );

        CheckInvoiceTool {
            definition: ToolDefinition {
                name: "check_invoice".to_string(),
                description: "Check whether an invoice has been paid on chain. Safe to poll: a \
                    paid invoice stays paid with the same settlement proof, and a pending one \
                    just reports pending."
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
struct CheckInvoiceParams {
    invoice_id: String,
}

#[async_trait]
impl Tool for CheckInvoiceTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let p: CheckInvoiceParams = super::parse_params(params)?;

        let outcome = self.invoices.check_invoice(&p.invoice_id).await?;
        let invoice = &outcome.invoice;

        let content = match invoice.status {
            InvoiceStatus::Paid => format!(
                "Invoice {} is paid: {} TON from {}.",
                invoice.invoice_id,
                ton::format_nano(ton::nano_or_zero(
                    invoice.tx_amount_nano.as_deref().unwrap_or("0")
                )),
                invoice.tx_sender.as_deref().unwrap_or("unknown"),
            ),
            InvoiceStatus::Expired => {
                format!("Invoice {} expired without payment.", invoice.invoice_id)
            }
            InvoiceStatus::Pending if outcome.throttled => format!(
                "Invoice {} is still pending; the chain cache was synced recently, try again \
                 shortly.",
                invoice.invoice_id
            ),
            InvoiceStatus::Pending => {
                format!("Invoice {} is still pending.", invoice.invoice_id)
            }
        };

        Ok(ToolResult::success(content).with_metadata(json!({
            "invoice_id": invoice.invoice_id,
            "status": invoice.status.as_str(),
            "identity_level": outcome.identity_level.as_str(),
            "throttled": outcome.throttled,
            "paid_at": invoice.paid_at.map(|t| t.to_rfc3339()),
            "tx_event_id": invoice.tx_event_id,
            "tx_sender": invoice.tx_sender,
            "tx_amount_nano": invoice.tx_amount_nano,
            "tx_amount_ton": invoice
                .tx_amount_nano
                .as_deref()
                .map(|n| ton::format_nano(ton::nano_or_zero(n))),
        })))
    }
}
