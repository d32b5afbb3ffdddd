//! Shared test fixtures: a scripted event source and transfer builders.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::ToolError;
use crate::models::CachedTransfer;
use crate::tonapi::{EventPage, EventQuery, EventSource};

/// Event source that serves pre-scripted pages in order and records every
/// query it was asked. Returns an empty page when the script runs out.
pub struct StubSource {
    pages: Mutex<VecDeque<Result<EventPage, ToolError>>>,
    calls: Mutex<Vec<EventQuery>>,
}

impl StubSource {
    pub fn new() -> Self {
        StubSource {
            pages: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_page(&self, page: EventPage) {
        self.pages.lock().push_back(Ok(page));
    }

    pub fn push_error(&self, msg: &str) {
        self.pages
            .lock()
            .push_back(Err(ToolError::SourceUnavailable(msg.to_string())));
    }

    pub fn calls(&self) -> Vec<EventQuery> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EventSource for StubSource {
    async fn fetch_events(
        &self,
        _wallet: &str,
        query: &EventQuery,
    ) -> Result<EventPage, ToolError> {
        self.calls.lock().push(query.clone());
        self.pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(EventPage::default()))
    }
}

/// A cached transfer at unix second `ts`, with lt derived as `ts * 1000` so
/// lt ordering follows time ordering in fixtures.
pub fn transfer_at(
    wallet: &str,
    event_id: &str,
    ts: i64,
    tag: &str,
    sender: &str,
) -> CachedTransfer {
    CachedTransfer {
        wallet: wallet.to_string(),
        event_id: event_id.to_string(),
        action_index: 0,
        lt: ts * 1000,
        ts,
        sender: sender.to_string(),
        recipient: wallet.to_string(),
        amount_nano: "1500000000".to_string(),
        comment: tag.to_string(),
        tag: tag.to_string(),
    }
}

pub fn transfer_with_amount(
    wallet: &str,
    event_id: &str,
    ts: i64,
    tag: &str,
    sender: &str,
    amount_nano: u128,
) -> CachedTransfer {
    let mut t = transfer_at(wallet, event_id, ts, tag, sender);
    t.amount_nano = amount_nano.to_string();
    t
}

/// Build a page whose lt/ts bounds are derived from its transfers, the way
/// the adapter derives them from a real response.
pub fn page_of(transfers: Vec<CachedTransfer>) -> EventPage {
    let mut page = EventPage {
        event_count: transfers.len(),
        ..Default::default()
    };
    for t in &transfers {
        if page.min_lt == 0 || t.lt < page.min_lt {
            page.min_lt = t.lt;
        }
        if t.lt > page.max_lt {
            page.max_lt = t.lt;
        }
        if page.min_ts == 0 || t.ts < page.min_ts {
            page.min_ts = t.ts;
        }
        if t.ts > page.max_ts {
            page.max_ts = t.ts;
        }
    }
    page.transfers = transfers;
    page
}
