//! Wallet-ownership verification challenges.
//!
//! An agent claiming wallet W is asked to send a small transfer from W to the
//! trading agent's wallet with a challenge tag in the comment. The strict
//! sender match against W is what proves control of the wallet - a matching
//! tag from any other sender proves nothing and leaves the challenge pending.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PaymentConfig;
use crate::db::Database;
use crate::error::ToolError;
use crate::matcher::{MatchOutcome, Matcher, TransferQuery};
use crate::models::{Challenge, ChallengeStatus};
use crate::ton::{self, normalize_address};

/// Proof recorded when a challenge verifies: which event settled it and who
/// actually sent it.
#[derive(Debug, Clone)]
pub struct ChallengeProof {
    pub event_id: String,
    pub sender: String,
}

#[derive(Debug)]
pub struct ConfirmOutcome {
    pub status: ChallengeStatus,
    pub proof: Option<ChallengeProof>,
    /// The cache could not be refreshed because a sync ran too recently.
    pub throttled: bool,
}

pub struct VerificationService {
    db: Arc<Database>,
    matcher: Arc<Matcher>,
    clock: Arc<dyn Clock>,
    config: PaymentConfig,
}

impl VerificationService {
    pub fn new(
        db: Arc<Database>,
        matcher: Arc<Matcher>,
        clock: Arc<dyn Clock>,
        config: PaymentConfig,
    ) -> Self {
        VerificationService {
            db,
            matcher,
            clock,
            config,
        }
    }

    /// The wallet challenge transfers must be sent to.
    pub fn receive_wallet(&self) -> &str {
        &self.config.receive_wallet
    }

    /// Issue (or reissue) the challenge for an agent. A pending or expired
    /// challenge is overwritten; a verified agent keeps its proof.
    pub fn create_challenge(
        &self,
        agent_id: &str,
        wallet: &str,
        amount_ton: Option<&str>,
        ttl_secs: Option<i64>,
    ) -> Result<Challenge, ToolError> {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() || agent_id.len() > 64 || agent_id.contains(char::is_whitespace) {
            return Err(ToolError::validation(
                "agent_id must be a non-empty token of at most 64 characters",
            ));
        }
        let wallet = normalize_address(wallet);
        if wallet.is_empty() {
            return Err(ToolError::validation("wallet must not be empty"));
        }
        if self.config.receive_wallet.is_empty() {
            return Err(ToolError::validation("receive wallet is not configured"));
        }

        let amount_nano = match amount_ton {
            Some(raw) => ton::parse_ton_amount(raw).map_err(ToolError::Validation)?,
            None => self.config.challenge_amount_nano,
        };
        if amount_nano == 0 {
            return Err(ToolError::validation("challenge amount must be positive"));
        }
        let ttl = ttl_secs.unwrap_or(self.config.challenge_ttl_secs);
        if ttl <= 0 {
            return Err(ToolError::validation("ttl_secs must be positive"));
        }

        if let Some(existing) = self.db.get_challenge(agent_id)? {
            if existing.status == ChallengeStatus::Verified {
                return Err(ToolError::InvalidState(format!(
                    "agent '{}' is already verified",
                    agent_id
                )));
            }
        }

        let now = self.clock.now();
        let challenge = Challenge {
            agent_id: agent_id.to_string(),
            wallet,
            status: ChallengeStatus::Pending,
            tag: ton::challenge_tag(agent_id),
            amount_nano: amount_nano.to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
            verified_at: None,
            proof_event_id: None,
            proof_sender: None,
        };
        self.db.upsert_challenge(&challenge)?;

        log::info!(
            "[verify] Challenge issued for agent '{}' wallet {} tag {}",
            agent_id,
            challenge.wallet,
            challenge.tag
        );
        Ok(challenge)
    }

    /// Check whether the challenge transfer has arrived. Lazy-expires a stale
    /// challenge first; a verified challenge is terminal and simply
    /// reconfirms.
    pub async fn confirm_challenge(&self, agent_id: &str) -> Result<ConfirmOutcome, ToolError> {
        let challenge = self
            .db
            .get_challenge(agent_id)?
            .ok_or_else(|| ToolError::NotFound(format!("no challenge for agent '{}'", agent_id)))?;

        match challenge.status {
            ChallengeStatus::Verified => return Ok(Self::settled(&challenge)),
            ChallengeStatus::Expired => return Ok(Self::settled(&challenge)),
            ChallengeStatus::Pending => {}
        }

        let now = self.clock.now();
        if now > challenge.expires_at {
            self.db.mark_challenge_expired(agent_id)?;
            return Ok(ConfirmOutcome {
                status: ChallengeStatus::Expired,
                proof: None,
                throttled: false,
            });
        }

        let query = TransferQuery {
            wallet: normalize_address(&self.config.receive_wallet),
            tag: challenge.tag.clone(),
            min_amount_nano: ton::nano_or_zero(&challenge.amount_nano),
            expected_sender: Some(challenge.wallet.clone()),
            // Ownership proof lives here: the payment must come from the
            // claimed wallet itself.
            strict: true,
            start_ts: challenge.created_at.timestamp(),
            end_ts: now.timestamp().min(challenge.expires_at.timestamp()),
        };

        match self.matcher.find_transfer(&query).await? {
            MatchOutcome::Found { transfer, source } => {
                self.db.mark_challenge_verified(
                    agent_id,
                    now,
                    &transfer.event_id,
                    &transfer.sender,
                )?;
                log::info!(
                    "[verify] Agent '{}' verified by event {} (via {})",
                    agent_id,
                    transfer.event_id,
                    source.as_str()
                );
                // Reload so a lost race still reports the winning proof
                let updated = self.db.get_challenge(agent_id)?.ok_or_else(|| {
                    ToolError::NotFound(format!("challenge for '{}' vanished", agent_id))
                })?;
                Ok(Self::settled(&updated))
            }
            MatchOutcome::Throttled => Ok(ConfirmOutcome {
                status: ChallengeStatus::Pending,
                proof: None,
                throttled: true,
            }),
            MatchOutcome::NotFound => Ok(ConfirmOutcome {
                status: ChallengeStatus::Pending,
                proof: None,
                throttled: false,
            }),
        }
    }

    fn settled(challenge: &Challenge) -> ConfirmOutcome {
        let proof = match (&challenge.proof_event_id, &challenge.proof_sender) {
            (Some(event_id), Some(sender)) => Some(ChallengeProof {
                event_id: event_id.clone(),
                sender: sender.clone(),
            }),
            _ => None,
        };
        ConfirmOutcome {
            status: challenge.status,
            proof,
            throttled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SyncConfig;
    use crate::sync::SyncEngine;
    use crate::testutil::{transfer_with_amount, StubSource};

    const RECEIVE: &str = "0:agentwallet";
    const CLAIMED: &str = "0:claimed";

    struct Harness {
        service: VerificationService,
        db: Arc<Database>,
        clock: Arc<ManualClock>,
        source: Arc<StubSource>,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at_ts(1_000_000));
        let source = Arc::new(StubSource::new());
        let sync = Arc::new(SyncEngine::new(
            db.clone(),
            source.clone(),
            SyncConfig::default(),
            clock.clone(),
        ));
        let matcher = Arc::new(Matcher::new(db.clone(), sync));
        let config = PaymentConfig {
            receive_wallet: RECEIVE.to_string(),
            ..Default::default()
        };
        let service = VerificationService::new(db.clone(), matcher, clock.clone(), config);
        Harness {
            service,
            db,
            clock,
            source,
        }
    }

    fn inject_payment(h: &Harness, tag: &str, sender: &str, ts: i64, amount: u128) {
        h.db.insert_transfer(&transfer_with_amount(
            RECEIVE,
            &format!("ev-{}-{}", sender, ts),
            ts,
            tag,
            sender,
            amount,
        ))
        .unwrap();
    }

    #[test]
    fn test_create_challenge_validates_input() {
        let h = harness();
        assert!(matches!(
            h.service.create_challenge("", CLAIMED, None, None),
            Err(ToolError::Validation(_))
        ));
        assert!(matches!(
            h.service.create_challenge("has space", CLAIMED, None, None),
            Err(ToolError::Validation(_))
        ));
        assert!(matches!(
            h.service.create_challenge("alice", "", None, None),
            Err(ToolError::Validation(_))
        ));
        assert!(matches!(
            h.service.create_challenge("alice", CLAIMED, Some("nope"), None),
            Err(ToolError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_correct_sender_verifies() {
        let h = harness();
        let c = h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        inject_payment(&h, &c.tag, CLAIMED, 1_000_100, 10_000_000);
        h.clock.advance_secs(200);

        let outcome = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(outcome.status, ChallengeStatus::Verified);
        assert_eq!(outcome.proof.unwrap().sender, CLAIMED);
    }

    #[tokio::test]
    async fn test_wrong_sender_stays_pending() {
        // Scenario: correctly tagged transfer, but from W2 != W
        let h = harness();
        let c = h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        inject_payment(&h, &c.tag, "0:impostor", 1_000_100, 10_000_000);
        h.clock.advance_secs(200);

        let outcome = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(outcome.status, ChallengeStatus::Pending);
        assert!(outcome.proof.is_none());
    }

    #[tokio::test]
    async fn test_verified_is_terminal_and_reconfirms() {
        let h = harness();
        let c = h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        inject_payment(&h, &c.tag, CLAIMED, 1_000_100, 10_000_000);
        h.clock.advance_secs(200);

        let first = h.service.confirm_challenge("alice").await.unwrap();
        let first_proof = first.proof.unwrap();

        // A second, different payment to the same tag changes nothing
        inject_payment(&h, &c.tag, CLAIMED, 1_000_200, 99_000_000);
        let second = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(second.status, ChallengeStatus::Verified);
        assert_eq!(second.proof.unwrap().event_id, first_proof.event_id);
    }

    #[tokio::test]
    async fn test_expiry_beats_late_payment() {
        let h = harness();
        let c = h.service
            .create_challenge("alice", CLAIMED, None, Some(100))
            .unwrap();
        inject_payment(&h, &c.tag, CLAIMED, 1_000_050, 10_000_000);

        h.clock.advance_secs(101);
        let outcome = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(outcome.status, ChallengeStatus::Expired);
    }

    #[tokio::test]
    async fn test_reissue_overwrites_pending_but_not_verified() {
        let h = harness();
        let first = h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        let second = h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        assert_ne!(first.tag, second.tag);

        inject_payment(&h, &second.tag, CLAIMED, 1_000_100, 10_000_000);
        h.clock.advance_secs(200);
        h.service.confirm_challenge("alice").await.unwrap();

        assert!(matches!(
            h.service.create_challenge("alice", CLAIMED, None, None),
            Err(ToolError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_underpaid_challenge_stays_pending() {
        let h = harness();
        let c = h.service
            .create_challenge("alice", CLAIMED, Some("0.05"), None)
            .unwrap();
        assert_eq!(c.amount_nano, "50000000");
        inject_payment(&h, &c.tag, CLAIMED, 1_000_100, 49_999_999);
        h.clock.advance_secs(200);

        let outcome = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(outcome.status, ChallengeStatus::Pending);
    }

    #[tokio::test]
    async fn test_throttled_sync_reports_throttled() {
        let h = harness();
        h.service.create_challenge("alice", CLAIMED, None, None).unwrap();
        // A sync for the receive wallet just ran
        h.db.touch_wallet_sync(RECEIVE, 1_000_000).unwrap();

        let outcome = h.service.confirm_challenge("alice").await.unwrap();
        assert_eq!(outcome.status, ChallengeStatus::Pending);
        assert!(outcome.throttled);
        assert!(h.source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent_is_not_found() {
        let h = harness();
        assert!(matches!(
            h.service.confirm_challenge("ghost").await,
            Err(ToolError::NotFound(_))
        ));
    }
}
