//! On-demand sync of a wallet's on-chain history into the local cache.
//!
//! There is no background poller: every sync is pull-triggered by a matcher
//! miss. Forward sync catches up from the high watermark; backward sync
//! backfills older history until a requested window is covered. Both ingest
//! idempotently and only ever widen the per-wallet watermark, so concurrent
//! callers inside the throttle window can safely serve the shared cache.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::db::Database;
use crate::error::ToolError;
use crate::tonapi::{EventPage, EventQuery, EventSource};

/// What a sync pass did. `Throttled` means the per-wallet minimum interval
/// has not elapsed and the existing cache is all the caller gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { new_rows: usize },
    Throttled,
}

pub struct SyncEngine {
    db: Arc<Database>,
    source: Arc<dyn EventSource>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn EventSource>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SyncEngine {
            db,
            source,
            config,
            clock,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Whether a sync for this wallet started inside the minimum interval.
    pub fn is_throttled(&self, wallet: &str) -> Result<bool, ToolError> {
        let Some(state) = self.db.get_wallet_sync(wallet)? else {
            return Ok(false);
        };
        Ok(self.clock.now_ts() - state.last_sync_ts < self.config.min_sync_interval_secs)
    }

    /// Low watermark already at or before `window_start_ts`, i.e. backfill
    /// would not uncover anything new for that window.
    pub fn covers_window_start(&self, wallet: &str, window_start_ts: i64) -> Result<bool, ToolError> {
        let Some(state) = self.db.get_wallet_sync(wallet)? else {
            return Ok(false);
        };
        Ok(state.min_ts > 0 && state.min_ts <= window_start_ts)
    }

    /// Catch up on events newer than the high watermark. Pages ascending from
    /// `max_lt`, stops on a short page or after the page cap.
    ///
    /// The throttle slot is claimed atomically before the first network call,
    /// so of several callers racing on the same wallet exactly one syncs and
    /// the rest short-circuit to the shared cache.
    pub async fn sync_forward(&self, wallet: &str) -> Result<SyncOutcome, ToolError> {
        if !self.db.try_claim_wallet_sync(
            wallet,
            self.clock.now_ts(),
            self.config.min_sync_interval_secs,
        )? {
            log::debug!("[sync] Forward sync for {} throttled", wallet);
            return Ok(SyncOutcome::Throttled);
        }

        let mut cursor = self
            .db
            .get_wallet_sync(wallet)?
            .map(|s| s.max_lt)
            .unwrap_or(0);
        let mut new_rows = 0;

        for _ in 0..self.config.max_forward_pages {
            let query = EventQuery {
                after_lt: (cursor > 0).then_some(cursor),
                limit: self.config.page_size,
                ascending: true,
                ..Default::default()
            };
            let page = self.source.fetch_events(wallet, &query).await?;
            new_rows += self.ingest_page(wallet, &page)?;

            if page.event_count < self.config.page_size as usize {
                break;
            }
            if page.max_lt <= cursor {
                // Upstream did not advance; stop rather than loop on the
                // same page forever.
                break;
            }
            cursor = page.max_lt;
        }

        log::info!("[sync] Forward sync for {}: {} new transfers", wallet, new_rows);
        Ok(SyncOutcome::Synced { new_rows })
    }

    /// Backfill history older than the low watermark until the requested
    /// window start is covered or the page cap is hit.
    ///
    /// No throttle check here: backfill only runs inside a matcher pass that
    /// already claimed the wallet's sync slot via [`Self::sync_forward`].
    pub async fn backfill(
        &self,
        wallet: &str,
        window_start_ts: i64,
    ) -> Result<SyncOutcome, ToolError> {
        if self.covers_window_start(wallet, window_start_ts)? {
            return Ok(SyncOutcome::Synced { new_rows: 0 });
        }

        let mut cursor = self
            .db
            .get_wallet_sync(wallet)?
            .map(|s| s.min_lt)
            .unwrap_or(0);
        let mut new_rows = 0;

        for _ in 0..self.config.max_backward_pages {
            let query = EventQuery {
                before_lt: (cursor > 0).then_some(cursor),
                limit: self.config.page_size,
                ascending: false,
                ..Default::default()
            };
            let page = self.source.fetch_events(wallet, &query).await?;
            new_rows += self.ingest_page(wallet, &page)?;

            if page.event_count == 0 {
                break;
            }
            if page.min_ts != 0 && page.min_ts <= window_start_ts {
                // Oldest event in this page predates the window; covered.
                break;
            }
            if page.event_count < self.config.page_size as usize {
                // Short page going backward means history is exhausted.
                break;
            }
            if cursor != 0 && page.min_lt >= cursor {
                break;
            }
            cursor = page.min_lt;
        }

        log::info!(
            "[sync] Backfill for {} down to ts {}: {} new transfers",
            wallet,
            window_start_ts,
            new_rows
        );
        Ok(SyncOutcome::Synced { new_rows })
    }

    /// Insert a page's transfers and widen the watermark. Both operations are
    /// idempotent, so re-ingesting an already-seen page changes nothing.
    fn ingest_page(&self, wallet: &str, page: &EventPage) -> Result<usize, ToolError> {
        let mut new_rows = 0;
        for transfer in &page.transfers {
            if self.db.insert_transfer(transfer)? {
                new_rows += 1;
            }
        }
        if page.event_count > 0 {
            self.db
                .widen_wallet_sync(wallet, page.min_lt, page.max_lt, page.min_ts, page.max_ts)?;
        }
        Ok(new_rows)
    }
}
