//! Invoice issue / check / receipt lifecycle.
//!
//! `create_invoice` mints a row with a fresh server-generated id and the
//! payment comment the payer must attach; `check_invoice` resolves the row
//! against the transfer cache and settles it; `receipt` projects a settled
//! row for handing to the counterpart.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::config::PaymentConfig;
use crate::db::Database;
use crate::error::ToolError;
use crate::matcher::{MatchOutcome, Matcher, TransferQuery};
use crate::models::{IdentityLevel, Invoice, InvoiceStatus};
use crate::ton::{self, normalize_address};

/// Server-generated invoice ids are short hex tokens, comfortable to put in
/// a transfer comment.
const INVOICE_ID_LEN: usize = 12;

#[derive(Debug, Clone, Default)]
pub struct CreateInvoiceRequest {
    /// Human-readable TON amount, e.g. "1.5".
    pub amount_ton: String,
    pub description: Option<String>,
    pub payer_agent: Option<String>,
    pub payer_wallet: Option<String>,
    /// Require the payment to come from the resolved expected sender.
    pub strict: bool,
    pub ttl_secs: Option<i64>,
}

#[derive(Debug)]
pub struct CheckOutcome {
    /// Invoice state after this check (expiry and settlement applied).
    pub invoice: Invoice,
    pub identity_level: IdentityLevel,
    pub throttled: bool,
}

pub struct InvoiceService {
    db: Arc<Database>,
    matcher: Arc<Matcher>,
    clock: Arc<dyn Clock>,
    config: PaymentConfig,
}

impl InvoiceService {
    pub fn new(
        db: Arc<Database>,
        matcher: Arc<Matcher>,
        clock: Arc<dyn Clock>,
        config: PaymentConfig,
    ) -> Self {
        InvoiceService {
            db,
            matcher,
            clock,
            config,
        }
    }

    pub fn create_invoice(&self, req: &CreateInvoiceRequest) -> Result<Invoice, ToolError> {
        let amount_nano = ton::parse_ton_amount(&req.amount_ton).map_err(ToolError::Validation)?;
        if amount_nano == 0 {
            return Err(ToolError::validation("amount must be positive"));
        }
        if self.config.receive_wallet.is_empty() {
            return Err(ToolError::validation("receive wallet is not configured"));
        }
        let ttl = req.ttl_secs.unwrap_or(self.config.invoice_ttl_secs);
        if ttl <= 0 {
            return Err(ToolError::validation("ttl_secs must be positive"));
        }

        let payer_agent = req
            .payer_agent
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());

        // Resolve who the payment must come from. An explicit wallet wins;
        // otherwise a strict invoice can borrow the payer agent's verified
        // wallet. A strict invoice with no resolvable sender is unpayable,
        // so reject it at creation.
        let expected_sender = match req.payer_wallet.as_deref().map(normalize_address) {
            Some(w) if !w.is_empty() => Some(w),
            _ => match payer_agent {
                Some(agent) => self.db.get_verified_wallet(agent)?,
                None => None,
            },
        };
        if req.strict && expected_sender.is_none() {
            return Err(ToolError::validation(
                "strict invoice needs a payer_wallet or a verified payer_agent",
            ));
        }

        let invoice_id = Uuid::new_v4().simple().to_string()[..INVOICE_ID_LEN].to_string();
        let mut comment = ton::invoice_tag(&invoice_id);
        if let Some(agent) = payer_agent {
            comment = format!("{} from:{}", comment, agent);
        }

        let now = self.clock.now();
        let invoice = Invoice {
            invoice_id: invoice_id.clone(),
            amount_nano: amount_nano.to_string(),
            recipient: normalize_address(&self.config.receive_wallet),
            expected_sender,
            payer_agent_id: payer_agent.map(str::to_string),
            description: req.description.clone(),
            comment,
            status: InvoiceStatus::Pending,
            strict_sender: req.strict,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
            paid_at: None,
            tx_event_id: None,
            tx_sender: None,
            tx_amount_nano: None,
        };
        self.db.insert_invoice(&invoice)?;

        log::info!(
            "[invoice] Created {} for {} TON (strict: {})",
            invoice_id,
            req.amount_ton.trim(),
            req.strict
        );
        Ok(invoice)
    }

    /// Check whether the invoice has been paid, settling it if a qualifying
    /// transfer is found. Paid and expired are terminal; expiry is evaluated
    /// lazily, before any matching.
    pub async fn check_invoice(&self, invoice_id: &str) -> Result<CheckOutcome, ToolError> {
        let invoice = self.load(invoice_id)?;

        match invoice.status {
            InvoiceStatus::Paid | InvoiceStatus::Expired => {
                return self.outcome(invoice, false);
            }
            InvoiceStatus::Pending => {}
        }

        let now = self.clock.now();
        if now > invoice.expires_at {
            self.db.mark_invoice_expired(invoice_id)?;
            return self.outcome(self.load(invoice_id)?, false);
        }

        let query = TransferQuery {
            wallet: invoice.recipient.clone(),
            tag: invoice.tag(),
            min_amount_nano: ton::nano_or_zero(&invoice.amount_nano),
            expected_sender: invoice.expected_sender.clone(),
            strict: invoice.strict_sender,
            start_ts: invoice.created_at.timestamp(),
            end_ts: now.timestamp().min(invoice.expires_at.timestamp()),
        };

        match self.matcher.find_transfer(&query).await? {
            MatchOutcome::Found { transfer, source } => {
                self.db.mark_invoice_paid(
                    invoice_id,
                    now,
                    &transfer.event_id,
                    &transfer.sender,
                    &transfer.amount_nano,
                )?;
                log::info!(
                    "[invoice] {} paid by event {} (via {})",
                    invoice_id,
                    transfer.event_id,
                    source.as_str()
                );
                self.outcome(self.load(invoice_id)?, false)
            }
            MatchOutcome::Throttled => self.outcome(invoice, true),
            MatchOutcome::NotFound => self.outcome(invoice, false),
        }
    }

    /// Settled-payment projection. Only a paid invoice has a receipt.
    pub fn receipt(&self, invoice_id: &str) -> Result<Invoice, ToolError> {
        let invoice = self.load(invoice_id)?;
        if invoice.status != InvoiceStatus::Paid {
            return Err(ToolError::InvalidState(format!(
                "invoice '{}' is {}, not paid",
                invoice_id,
                invoice.status.as_str()
            )));
        }
        Ok(invoice)
    }

    fn load(&self, invoice_id: &str) -> Result<Invoice, ToolError> {
        self.db
            .get_invoice(invoice_id)?
            .ok_or_else(|| ToolError::NotFound(format!("no invoice '{}'", invoice_id)))
    }

    fn outcome(&self, invoice: Invoice, throttled: bool) -> Result<CheckOutcome, ToolError> {
        let identity_level = self.identity_level(&invoice)?;
        Ok(CheckOutcome {
            invoice,
            identity_level,
            throttled,
        })
    }

    /// How strongly the settled payment identifies the payer. Only sender
    /// matching carries identity; the comment tag alone is copyable.
    pub fn identity_level(&self, invoice: &Invoice) -> Result<IdentityLevel, ToolError> {
        if invoice.status != InvoiceStatus::Paid {
            return Ok(IdentityLevel::None);
        }
        if !invoice.strict_sender {
            return Ok(IdentityLevel::CommentOnly);
        }
        if let (Some(agent), Some(expected)) = (&invoice.payer_agent_id, &invoice.expected_sender) {
            let verified = self
                .db
                .get_verified_wallet(agent)?
                .map(|w| normalize_address(&w));
            if verified.as_deref() == Some(expected.as_str()) {
                return Ok(IdentityLevel::WalletVerified);
            }
        }
        Ok(IdentityLevel::Wallet)
    }
}
