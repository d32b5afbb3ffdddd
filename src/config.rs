//! Environment-driven configuration.

use std::collections::HashMap;
use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const TONAPI_BASE_URL: &str = "TONAPI_BASE_URL";
    pub const TONAPI_KEY: &str = "TONAPI_KEY";
    pub const RECEIVE_WALLET: &str = "TONPAY_WALLET";
    pub const MIN_REQUEST_INTERVAL_MS: &str = "TONPAY_MIN_REQUEST_INTERVAL_MS";
    pub const SYNC_INTERVAL_SECS: &str = "TONPAY_SYNC_INTERVAL_SECS";
    pub const PAGE_SIZE: &str = "TONPAY_PAGE_SIZE";
    pub const CHALLENGE_AMOUNT_NANO: &str = "TONPAY_CHALLENGE_AMOUNT_NANO";
    pub const CHALLENGE_TTL_SECS: &str = "TONPAY_CHALLENGE_TTL_SECS";
    pub const INVOICE_TTL_SECS: &str = "TONPAY_INVOICE_TTL_SECS";
    pub const RATE_LIMIT_MAX_CALLS: &str = "TONPAY_RATE_LIMIT_MAX_CALLS";
    pub const RATE_LIMIT_WINDOW_SECS: &str = "TONPAY_RATE_LIMIT_WINDOW_SECS";
    pub const ADMIN_CALLERS: &str = "TONPAY_ADMIN_CALLERS";
    pub const OPEN_ACCESS: &str = "TONPAY_OPEN_ACCESS";
    pub const TOOL_ALLOWLISTS: &str = "TONPAY_TOOL_ALLOWLISTS";
}

/// Default values
pub mod defaults {
    pub const TONAPI_BASE_URL: &str = "https://tonapi.io/v2";
    /// Spacing with a bearer token configured.
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 150;
    /// Spacing without a token - tonapi's unauthenticated tier is ~1 rps.
    pub const MIN_REQUEST_INTERVAL_UNAUTH_MS: u64 = 1100;
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const MAX_RETRIES: u32 = 3;
    pub const SYNC_INTERVAL_SECS: i64 = 30;
    pub const PAGE_SIZE: u32 = 50;
    pub const MAX_FORWARD_PAGES: u32 = 3;
    pub const MAX_BACKWARD_PAGES: u32 = 6;
    /// 0.01 TON - enough to be visible, cheap enough to ask for.
    pub const CHALLENGE_AMOUNT_NANO: u128 = 10_000_000;
    pub const CHALLENGE_TTL_SECS: i64 = 900;
    pub const INVOICE_TTL_SECS: i64 = 3600;
    pub const RATE_LIMIT_MAX_CALLS: u32 = 20;
    pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;
}

/// Upstream indexing API settings.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub min_request_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            base_url: defaults::TONAPI_BASE_URL.to_string(),
            api_key: None,
            min_request_interval_ms: defaults::MIN_REQUEST_INTERVAL_UNAUTH_MS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

/// Sync engine pacing and page caps.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub min_sync_interval_secs: i64,
    pub page_size: u32,
    pub max_forward_pages: u32,
    pub max_backward_pages: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            min_sync_interval_secs: defaults::SYNC_INTERVAL_SECS,
            page_size: defaults::PAGE_SIZE,
            max_forward_pages: defaults::MAX_FORWARD_PAGES,
            max_backward_pages: defaults::MAX_BACKWARD_PAGES,
        }
    }
}

/// Payment-side settings shared by invoices and verification challenges.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// The agent's own wallet - the recipient of invoice payments and
    /// challenge transfers. Wallet-scoped caching hangs off this address.
    pub receive_wallet: String,
    pub challenge_amount_nano: u128,
    pub challenge_ttl_secs: i64,
    pub invoice_ttl_secs: i64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig {
            receive_wallet: String::new(),
            challenge_amount_nano: defaults::CHALLENGE_AMOUNT_NANO,
            challenge_ttl_secs: defaults::CHALLENGE_TTL_SECS,
            invoice_ttl_secs: defaults::INVOICE_TTL_SECS,
        }
    }
}

/// Tool-boundary fixed-window budgets.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub default_max_calls: u32,
    pub window_secs: i64,
    /// Per-tool overrides of the call budget.
    pub per_tool: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            default_max_calls: defaults::RATE_LIMIT_MAX_CALLS,
            window_secs: defaults::RATE_LIMIT_WINDOW_SECS,
            per_tool: HashMap::new(),
        }
    }
}

/// Caller access policy.
#[derive(Clone, Debug, Default)]
pub struct AccessConfig {
    pub admin_callers: Vec<String>,
    /// Permit any caller when no allowlist matches.
    pub open_access: bool,
    /// tool name -> callers explicitly permitted for it
    pub tool_allowlists: HashMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub payments: PaymentConfig,
    pub rate_limits: RateLimitConfig,
    pub access: AccessConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = env::var(env_vars::TONAPI_KEY).ok().filter(|k| !k.is_empty());

        // Unauthenticated callers get a much slower default request rate.
        let default_interval = if api_key.is_some() {
            defaults::MIN_REQUEST_INTERVAL_MS
        } else {
            defaults::MIN_REQUEST_INTERVAL_UNAUTH_MS
        };

        let source = SourceConfig {
            base_url: env::var(env_vars::TONAPI_BASE_URL)
                .unwrap_or_else(|_| defaults::TONAPI_BASE_URL.to_string()),
            api_key,
            min_request_interval_ms: parse_env(env_vars::MIN_REQUEST_INTERVAL_MS, default_interval),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        };

        let sync = SyncConfig {
            min_sync_interval_secs: parse_env(
                env_vars::SYNC_INTERVAL_SECS,
                defaults::SYNC_INTERVAL_SECS,
            ),
            page_size: parse_env(env_vars::PAGE_SIZE, defaults::PAGE_SIZE),
            max_forward_pages: defaults::MAX_FORWARD_PAGES,
            max_backward_pages: defaults::MAX_BACKWARD_PAGES,
        };

        let payments = PaymentConfig {
            receive_wallet: env::var(env_vars::RECEIVE_WALLET).unwrap_or_default(),
            challenge_amount_nano: parse_env(
                env_vars::CHALLENGE_AMOUNT_NANO,
                defaults::CHALLENGE_AMOUNT_NANO,
            ),
            challenge_ttl_secs: parse_env(
                env_vars::CHALLENGE_TTL_SECS,
                defaults::CHALLENGE_TTL_SECS,
            ),
            invoice_ttl_secs: parse_env(env_vars::INVOICE_TTL_SECS, defaults::INVOICE_TTL_SECS),
        };

        let rate_limits = RateLimitConfig {
            default_max_calls: parse_env(
                env_vars::RATE_LIMIT_MAX_CALLS,
                defaults::RATE_LIMIT_MAX_CALLS,
            ),
            window_secs: parse_env(
                env_vars::RATE_LIMIT_WINDOW_SECS,
                defaults::RATE_LIMIT_WINDOW_SECS,
            ),
            per_tool: HashMap::new(),
        };

        let access = AccessConfig {
            admin_callers: parse_list(&env::var(env_vars::ADMIN_CALLERS).unwrap_or_default()),
            open_access: env::var(env_vars::OPEN_ACCESS)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            tool_allowlists: parse_allowlists(
                &env::var(env_vars::TOOL_ALLOWLISTS).unwrap_or_default(),
            ),
        };

        Self {
            source,
            sync,
            payments,
            rate_limits,
            access,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `tool=caller|caller;tool2=caller` into per-tool allowlists.
fn parse_allowlists(raw: &str) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((tool, callers)) = entry.split_once('=') else {
            log::warn!("[config] Ignoring malformed allowlist entry '{}'", entry);
            continue;
        };
        let callers: Vec<String> = callers
            .split('|')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !callers.is_empty() {
            map.insert(tool.trim().to_string(), callers);
        }
    }
    map
}
