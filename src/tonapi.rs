//! Event Source Adapter for a tonapi-style indexing API.
//!
//! Fetches a wallet's event history via `GET /accounts/{wallet}/events`,
//! retries transient failures with capped exponential backoff, and enforces a
//! single serialized in-flight request with a minimum spacing between calls -
//! deliberate backpressure against the upstream quota, independent of the
//! tool-boundary rate limiter.
//!
//! Upstream JSON is loosely typed; [`normalize_event`] is the strict boundary
//! that turns it into cacheable rows. Malformed records are skipped with a
//! warning, never silently propagated.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::SourceConfig;
use crate::error::ToolError;
use crate::models::CachedTransfer;
use crate::ton::{derive_tag, normalize_address};

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;

/// Pagination window for one fetch.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub after_lt: Option<i64>,
    pub before_lt: Option<i64>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub limit: u32,
    pub ascending: bool,
}

/// One fetched page. lt/ts bounds cover every event in the page, including
/// events that carried no matching transfer action - the sync watermark must
/// advance over those too.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub transfers: Vec<CachedTransfer>,
    pub event_count: usize,
    pub min_lt: i64,
    pub max_lt: i64,
    pub min_ts: i64,
    pub max_ts: i64,
}

/// Seam between the sync engine and the network. Tests substitute a scripted
/// implementation.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, wallet: &str, query: &EventQuery) -> Result<EventPage, ToolError>;
}

// ---------------------------------------------------------------------------
// Upstream wire shapes (loose on purpose - the API omits fields freely)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event_id: String,
    timestamp: i64,
    lt: i64,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(rename = "TonTransfer")]
    ton_transfer: Option<RawTonTransfer>,
}

#[derive(Debug, Deserialize)]
struct RawTonTransfer {
    sender: Option<RawAccount>,
    recipient: Option<RawAccount>,
    amount: Option<i64>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    address: Option<String>,
}

/// Normalize one raw event into cache rows for the tracked wallet.
/// Only native `TonTransfer` actions addressed to the wallet survive; jetton
/// transfers, outgoing transfers and malformed actions are dropped.
fn normalize_event(wallet: &str, event: &RawEvent) -> Vec<CachedTransfer> {
    let wallet_norm = normalize_address(wallet);
    let mut out = Vec::new();

    for (idx, action) in event.actions.iter().enumerate() {
        if action.action_type != "TonTransfer" {
            continue;
        }
        let Some(transfer) = &action.ton_transfer else {
            log::warn!(
                "[tonapi] Event {} action {} is TonTransfer without a body, skipping",
                event.event_id,
                idx
            );
            continue;
        };
        let (Some(sender), Some(recipient)) = (
            transfer.sender.as_ref().and_then(|a| a.address.as_deref()),
            transfer.recipient.as_ref().and_then(|a| a.address.as_deref()),
        ) else {
            log::warn!(
                "[tonapi] Event {} action {} missing sender/recipient, skipping",
                event.event_id,
                idx
            );
            continue;
        };
        let Some(amount) = transfer.amount.filter(|a| *a > 0) else {
            continue;
        };
        if normalize_address(recipient) != wallet_norm {
            continue;
        }

        let comment = transfer.comment.clone().unwrap_or_default();
        out.push(CachedTransfer {
            wallet: wallet_norm.clone(),
            event_id: event.event_id.clone(),
            action_index: idx as i64,
            lt: event.lt,
            ts: event.timestamp,
            sender: normalize_address(sender),
            recipient: wallet_norm.clone(),
            amount_nano: amount.to_string(),
            tag: derive_tag(&comment),
            comment,
        });
    }

    out
}

fn page_from_events(wallet: &str, events: &[RawEvent]) -> EventPage {
    let mut page = EventPage {
        event_count: events.len(),
        ..Default::default()
    };

    for event in events {
        if page.min_lt == 0 || event.lt < page.min_lt {
            page.min_lt = event.lt;
        }
        if event.lt > page.max_lt {
            page.max_lt = event.lt;
        }
        if page.min_ts == 0 || event.timestamp < page.min_ts {
            page.min_ts = event.timestamp;
        }
        if event.timestamp > page.max_ts {
            page.max_ts = event.timestamp;
        }
        page.transfers.extend(normalize_event(wallet, event));
    }

    page
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct TonApiClient {
    http: reqwest::Client,
    config: SourceConfig,
    /// Serializes requests and carries the time of the previous one; held
    /// across the await so at most one request is in flight.
    slot: tokio::sync::Mutex<Option<Instant>>,
}

impl TonApiClient {
    pub fn new(config: &crate::config::Config) -> Self {
        let source = config.source.clone();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[tonapi] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        TonApiClient {
            http,
            config: source,
            slot: tokio::sync::Mutex::new(None),
        }
    }

    fn events_url(&self, wallet: &str) -> String {
        format!(
            "{}/accounts/{}/events",
            self.config.base_url.trim_end_matches('/'),
            wallet
        )
    }

    fn query_params(query: &EventQuery) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), query.limit.to_string()),
            (
                "sort_order".to_string(),
                if query.ascending { "asc" } else { "desc" }.to_string(),
            ),
        ];
        if let Some(lt) = query.after_lt {
            params.push(("after_lt".to_string(), lt.to_string()));
        }
        if let Some(lt) = query.before_lt {
            params.push(("before_lt".to_string(), lt.to_string()));
        }
        if let Some(ts) = query.start_ts {
            params.push(("start_date".to_string(), ts.to_string()));
        }
        if let Some(ts) = query.end_ts {
            params.push(("end_date".to_string(), ts.to_string()));
        }
        params
    }

    /// One attempt. Distinguishes retryable failures (429/5xx/timeout) from
    /// permanent ones so the retry loop can stop early on caller bugs.
    async fn request_once(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<EventsResponse, RequestFailure> {
        let mut req = self.http.get(url).query(params);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        // Timeouts, refused connections and dropped sockets all retry
        let resp = req
            .send()
            .await
            .map_err(|e| RequestFailure::Retryable(format!("network: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(RequestFailure::Retryable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestFailure::Permanent(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json::<EventsResponse>()
            .await
            .map_err(|e| RequestFailure::Permanent(format!("bad response body: {}", e)))
    }
}

enum RequestFailure {
    Retryable(String),
    Permanent(String),
}

#[async_trait]
impl EventSource for TonApiClient {
    async fn fetch_events(&self, wallet: &str, query: &EventQuery) -> Result<EventPage, ToolError> {
        let url = self.events_url(wallet);
        let params = Self::query_params(query);
        let spacing = Duration::from_millis(self.config.min_request_interval_ms);

        // The slot guard lives for the whole retry loop: one upstream request
        // in flight, globally, with minimum spacing between sends.
        let mut slot = self.slot.lock().await;

        let mut last_error = String::new();
        for attempt in 0..=self.config.max_retries {
            if let Some(prev) = *slot {
                let elapsed = prev.elapsed();
                if elapsed < spacing {
                    tokio::time::sleep(spacing - elapsed).await;
                }
            }
            *slot = Some(Instant::now());

            match self.request_once(&url, &params).await {
                Ok(body) => {
                    log::debug!(
                        "[tonapi] Fetched {} events for {} (attempt {})",
                        body.events.len(),
                        wallet,
                        attempt + 1
                    );
                    return Ok(page_from_events(wallet, &body.events));
                }
                Err(RequestFailure::Permanent(msg)) => {
                    log::warn!("[tonapi] Permanent fetch failure for {}: {}", wallet, msg);
                    return Err(ToolError::SourceUnavailable(msg));
                }
                Err(RequestFailure::Retryable(msg)) => {
                    log::warn!(
                        "[tonapi] Attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        wallet,
                        msg
                    );
                    last_error = msg;
                    if attempt < self.config.max_retries {
                        let backoff = (BACKOFF_BASE_MS << attempt).min(BACKOFF_CAP_MS);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(ToolError::SourceUnavailable(format!(
            "retries exhausted: {}",
            last_error
        )))
    }
}
