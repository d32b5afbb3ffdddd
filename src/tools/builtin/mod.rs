//! Built-in payment tools exposed to the agent runtime.

mod check_invoice;
mod confirm_challenge;
mod create_challenge;
mod create_invoice;
mod receipt;

pub use check_invoice::CheckInvoiceTool;
pub use confirm_challenge::ConfirmChallengeTool;
pub use create_challenge::CreateChallengeTool;
pub use create_invoice::CreateInvoiceTool;
pub use receipt::GetReceiptTool;

use crate::invoice::InvoiceService;
use crate::tools::registry::ToolRegistry;
use crate::verify::VerificationService;
use std::sync::Arc;

/// Register the payment tool set
pub fn register_payment_tools(
    registry: &mut ToolRegistry,
    invoices: Arc<InvoiceService>,
    challenges: Arc<VerificationService>,
) {
    // Wallet-ownership verification
    registry.register(Arc::new(CreateChallengeTool::new(challenges.clone())));
    registry.register(Arc::new(ConfirmChallengeTool::new(challenges)));

    // Invoicing
    registry.register(Arc::new(CreateInvoiceTool::new(invoices.clone())));
    registry.register(Arc::new(CheckInvoiceTool::new(invoices.clone())));
    registry.register(Arc::new(GetReceiptTool::new(invoices)));
}

/// Parse tool params out of the model-supplied JSON value.
fn parse_params<T: serde::de::DeserializeOwned>(
    params: serde_json::Value,
) -> Result<T, crate::error::ToolError> {
    serde_json::from_value(params)
        .map_err(|e| crate::error::ToolError::validation(format!("invalid parameters: {}", e)))
}
