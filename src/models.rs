//! Domain rows shared across the storage, sync and tool layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a wallet-ownership challenge. Verified and expired are
/// terminal; a row never regresses from verified back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Verified,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Verified => "verified",
            ChallengeStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<ChallengeStatus> {
        match s {
            "pending" => Some(ChallengeStatus::Pending),
            "verified" => Some(ChallengeStatus::Verified),
            "expired" => Some(ChallengeStatus::Expired),
            _ => None,
        }
    }
}

/// Lifecycle of an invoice. Paid and expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Expired,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<InvoiceStatus> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "expired" => Some(InvoiceStatus::Expired),
            _ => None,
        }
    }
}

/// How strongly a paid invoice ties the payment to a payer identity.
/// `CommentOnly` means the tag matched but any wallet could have sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityLevel {
    None,
    CommentOnly,
    Wallet,
    WalletVerified,
}

impl IdentityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityLevel::None => "none",
            IdentityLevel::CommentOnly => "comment_only",
            IdentityLevel::Wallet => "wallet",
            IdentityLevel::WalletVerified => "wallet_verified",
        }
    }
}

/// A wallet-ownership challenge row (one live row per agent id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub agent_id: String,
    /// The wallet the counterpart claims to control.
    pub wallet: String,
    pub status: ChallengeStatus,
    pub tag: String,
    pub amount_nano: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub proof_event_id: Option<String>,
    pub proof_sender: Option<String>,
}

/// An issued invoice row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    /// Integer nano-TON string; never a float.
    pub amount_nano: String,
    pub recipient: String,
    /// Sender the payment must come from when `strict_sender` is set.
    pub expected_sender: Option<String>,
    pub payer_agent_id: Option<String>,
    pub description: Option<String>,
    /// The comment the payer is asked to attach; its first token is the tag.
    pub comment: String,
    pub status: InvoiceStatus,
    pub strict_sender: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub tx_event_id: Option<String>,
    pub tx_sender: Option<String>,
    pub tx_amount_nano: Option<String>,
}

impl Invoice {
    pub fn tag(&self) -> String {
        crate::ton::derive_tag(&self.comment)
    }
}

/// A normalized native transfer held in the local cache.
/// Keyed by (wallet, event_id, action_index); ingest is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTransfer {
    /// The tracked wallet this row was synced for.
    pub wallet: String,
    pub event_id: String,
    pub action_index: i64,
    pub lt: i64,
    /// Unix seconds, as reported by the chain indexer.
    pub ts: i64,
    pub sender: String,
    pub recipient: String,
    pub amount_nano: String,
    pub comment: String,
    pub tag: String,
}

/// Per-wallet pagination watermarks. Widen monotonically, never shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSyncState {
    pub last_sync_ts: i64,
    pub max_lt: i64,
    pub min_lt: i64,
    pub max_ts: i64,
    pub min_ts: i64,
}
