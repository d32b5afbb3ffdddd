//! Resolves a (wallet, tag, amount, sender, window) query against the cache,
//! pulling sync only on a miss.
//!
//! The earliest qualifying transfer is authoritative: a later second payment
//! to the same tag never retroactively changes an already-resolved state, so
//! idempotent re-checks simply reconfirm.

use std::sync::Arc;

use crate::db::Database;
use crate::error::ToolError;
use crate::models::CachedTransfer;
use crate::sync::{SyncEngine, SyncOutcome};
use crate::ton::{nano_or_zero, normalize_address};

/// Where the winning transfer was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Cache,
    SyncNew,
    SyncOld,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Cache => "cache",
            MatchSource::SyncNew => "sync_new",
            MatchSource::SyncOld => "sync_old",
        }
    }
}

#[derive(Debug)]
pub enum MatchOutcome {
    Found {
        transfer: CachedTransfer,
        source: MatchSource,
    },
    /// Cache miss inside the sync throttle window; try again later.
    Throttled,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct TransferQuery {
    pub wallet: String,
    pub tag: String,
    pub min_amount_nano: u128,
    pub expected_sender: Option<String>,
    /// When set, only a transfer from `expected_sender` qualifies. This is
    /// the trust boundary; the tag alone is forgeable.
    pub strict: bool,
    pub start_ts: i64,
    pub end_ts: i64,
}

impl TransferQuery {
    fn qualifies(&self, t: &CachedTransfer) -> bool {
        if nano_or_zero(&t.amount_nano) < self.min_amount_nano {
            return false;
        }
        if self.strict {
            let Some(expected) = &self.expected_sender else {
                return false;
            };
            if normalize_address(&t.sender) != normalize_address(expected) {
                return false;
            }
        }
        true
    }
}

pub struct Matcher {
    db: Arc<Database>,
    sync: Arc<SyncEngine>,
}

impl Matcher {
    pub fn new(db: Arc<Database>, sync: Arc<SyncEngine>) -> Self {
        Matcher { db, sync }
    }

    /// Earliest cached transfer satisfying the query, or None.
    fn query_cache(&self, q: &TransferQuery) -> Result<Option<CachedTransfer>, ToolError> {
        let rows = self
            .db
            .transfers_by_tag(&q.wallet, &q.tag, q.start_ts, q.end_ts)?;
        Ok(rows.into_iter().find(|t| q.qualifies(t)))
    }

    pub async fn find_transfer(&self, q: &TransferQuery) -> Result<MatchOutcome, ToolError> {
        // Fast path: already cached
        if let Some(transfer) = self.query_cache(q)? {
            return Ok(MatchOutcome::Found {
                transfer,
                source: MatchSource::Cache,
            });
        }

        // Inside the throttle window the cache is all there is
        if self.sync.is_throttled(&q.wallet)? {
            return Ok(MatchOutcome::Throttled);
        }

        // Catch up on new events. An unavailable source is "not found yet",
        // never a hard failure.
        let mut source_down = false;
        match self.sync.sync_forward(&q.wallet).await {
            Ok(SyncOutcome::Synced { .. }) => {}
            Ok(SyncOutcome::Throttled) => {
                // Lost a race with a concurrent caller; serve the cache
                if let Some(transfer) = self.query_cache(q)? {
                    return Ok(MatchOutcome::Found {
                        transfer,
                        source: MatchSource::Cache,
                    });
                }
                return Ok(MatchOutcome::Throttled);
            }
            Err(ToolError::SourceUnavailable(msg)) => {
                log::warn!("[matcher] Forward sync unavailable for {}: {}", q.wallet, msg);
                source_down = true;
            }
            Err(e) => return Err(e),
        }

        if let Some(transfer) = self.query_cache(q)? {
            return Ok(MatchOutcome::Found {
                transfer,
                source: MatchSource::SyncNew,
            });
        }

        // Backfill older history, unless the low watermark already predates
        // the window start (nothing older could qualify).
        if !source_down && !self.sync.covers_window_start(&q.wallet, q.start_ts)? {
            match self.sync.backfill(&q.wallet, q.start_ts).await {
                Ok(_) => {
                    if let Some(transfer) = self.query_cache(q)? {
                        return Ok(MatchOutcome::Found {
                            transfer,
                            source: MatchSource::SyncOld,
                        });
                    }
                }
                Err(ToolError::SourceUnavailable(msg)) => {
                    log::warn!("[matcher] Backfill unavailable for {}: {}", q.wallet, msg);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(MatchOutcome::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SyncConfig;
    use crate::testutil::{page_of, transfer_at, transfer_with_amount, StubSource};

    const WALLET: &str = "0:wallet";

    fn matcher_with(source: Arc<StubSource>) -> (Matcher, Arc<Database>, Arc<ManualClock>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at_ts(1_000_000));
        let sync = Arc::new(SyncEngine::new(
            db.clone(),
            source,
            SyncConfig {
                min_sync_interval_secs: 30,
                page_size: 10,
                max_forward_pages: 3,
                max_backward_pages: 6,
            },
            clock.clone(),
        ));
        (Matcher::new(db.clone(), sync), db, clock)
    }

    fn query(tag: &str) -> TransferQuery {
        TransferQuery {
            wallet: WALLET.to_string(),
            tag: tag.to_string(),
            min_amount_nano: 1_500_000_000,
            expected_sender: None,
            strict: false,
            start_ts: 100,
            end_ts: 10_000,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source.clone());
        db.insert_transfer(&transfer_at(WALLET, "ev1", 200, "INV#a", "0:x"))
            .unwrap();

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        match outcome {
            MatchOutcome::Found { transfer, source: s } => {
                assert_eq!(transfer.event_id, "ev1");
                assert_eq!(s, MatchSource::Cache);
            }
            other => panic!("expected Found, got {:?}", other),
        }
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_miss_triggers_forward_sync() {
        let source = Arc::new(StubSource::new());
        source.push_page(page_of(vec![transfer_at(WALLET, "ev1", 200, "INV#a", "0:x")]));
        let (matcher, _, _) = matcher_with(source.clone());

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        assert!(matches!(
            outcome,
            MatchOutcome::Found {
                source: MatchSource::SyncNew,
                ..
            }
        ));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_miss_falls_back_to_backfill() {
        let source = Arc::new(StubSource::new());
        // Forward sync finds nothing new
        source.push_page(page_of(vec![]));
        // Backfill uncovers the old transfer
        source.push_page(page_of(vec![transfer_at(WALLET, "old", 150, "INV#a", "0:x")]));
        let (matcher, _, _) = matcher_with(source.clone());

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        assert!(matches!(
            outcome,
            MatchOutcome::Found {
                source: MatchSource::SyncOld,
                ..
            }
        ));
        assert_eq!(source.calls().len(), 2);
        assert!(!source.calls()[1].ascending);
    }

    #[tokio::test]
    async fn test_backfill_skipped_when_watermark_covers_window() {
        let source = Arc::new(StubSource::new());
        source.push_page(page_of(vec![])); // forward sync only
        let (matcher, db, _) = matcher_with(source.clone());
        // Low watermark predates the window start of 100
        db.widen_wallet_sync(WALLET, 10, 20, 50, 60).unwrap();

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::NotFound));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_throttled_miss_returns_throttled() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source.clone());
        // A sync just happened
        db.touch_wallet_sync(WALLET, 1_000_000).unwrap();

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Throttled));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_source_unavailable_is_not_found_not_error() {
        let source = Arc::new(StubSource::new());
        source.push_error("upstream down");
        let (matcher, _, _) = matcher_with(source);

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_earliest_qualifying_wins() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source);
        db.insert_transfer(&transfer_at(WALLET, "late", 300, "INV#a", "0:x"))
            .unwrap();
        db.insert_transfer(&transfer_at(WALLET, "early", 200, "INV#a", "0:y"))
            .unwrap();
        // Earlier still, but below the minimum amount
        db.insert_transfer(&transfer_with_amount(
            WALLET, "small", 150, "INV#a", "0:z", 100,
        ))
        .unwrap();

        let outcome = matcher.find_transfer(&query("INV#a")).await.unwrap();
        match outcome {
            MatchOutcome::Found { transfer, .. } => assert_eq!(transfer.event_id, "early"),
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strict_sender_filters_non_strict_does_not() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source);
        // Same tag and amount, different senders; the wrong one is earlier
        db.insert_transfer(&transfer_at(WALLET, "wrong", 200, "INV#a", "0:mallory"))
            .unwrap();
        db.insert_transfer(&transfer_at(WALLET, "right", 300, "INV#a", "0:alice"))
            .unwrap();

        let mut q = query("INV#a");
        q.strict = true;
        q.expected_sender = Some("0:ALICE".to_string()); // case-insensitive
        match matcher.find_transfer(&q).await.unwrap() {
            MatchOutcome::Found { transfer, .. } => assert_eq!(transfer.event_id, "right"),
            other => panic!("expected Found, got {:?}", other),
        }

        // Non-strict: earliest wins regardless of sender
        match matcher.find_transfer(&query("INV#a")).await.unwrap() {
            MatchOutcome::Found { transfer, .. } => assert_eq!(transfer.event_id, "wrong"),
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source);
        db.insert_transfer(&transfer_at(WALLET, "at-start", 100, "INV#a", "0:x"))
            .unwrap();

        match matcher.find_transfer(&query("INV#a")).await.unwrap() {
            MatchOutcome::Found { transfer, .. } => assert_eq!(transfer.event_id, "at-start"),
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strict_without_expected_sender_never_matches() {
        let source = Arc::new(StubSource::new());
        let (matcher, db, _) = matcher_with(source);
        db.insert_transfer(&transfer_at(WALLET, "ev1", 200, "INV#a", "0:x"))
            .unwrap();

        let mut q = query("INV#a");
        q.strict = true;
        q.expected_sender = None;
        // Services validate this away up front; the matcher still refuses to
        // treat it as a wildcard.
        assert!(matches!(
            matcher.find_transfer(&q).await.unwrap(),
            MatchOutcome::Throttled | MatchOutcome::NotFound
        ));
    }
}
