//! TON payment tooling for a Telegram-native trading agent.
//!
//! Two jobs: prove a counterpart controls a claimed wallet before trusting
//! their identity, and confirm that an issued invoice has been paid without
//! requiring the payer to call back. Both are resolved against a local cache
//! of the agent wallet's on-chain activity, synced on demand from a
//! tonapi-style indexing API.
//!
//! The embedding agent runtime constructs a [`tools::registry::ToolRegistry`]
//! via [`build_registry`] and dispatches tool calls into it; everything else
//! (custody, chat, scheduling) lives outside this crate.

pub mod access;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod invoice;
pub mod matcher;
pub mod models;
pub mod rate_limit;
pub mod sync;
pub mod ton;
pub mod tonapi;
pub mod tools;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::invoice::InvoiceService;
use crate::matcher::Matcher;
use crate::rate_limit::RateLimiter;
use crate::sync::SyncEngine;
use crate::tonapi::TonApiClient;
use crate::tools::registry::ToolRegistry;
use crate::verify::VerificationService;

/// Wire up the full tool registry from a config and an open database.
///
/// The runtime calls this once at startup and keeps the registry for the
/// lifetime of the process.
pub fn build_registry(config: Config, db: Arc<Database>) -> ToolRegistry {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let source = Arc::new(TonApiClient::new(&config));
    let sync = Arc::new(SyncEngine::new(
        db.clone(),
        source,
        config.sync.clone(),
        clock.clone(),
    ));
    let matcher = Arc::new(Matcher::new(db.clone(), sync));
    let invoices = Arc::new(InvoiceService::new(
        db.clone(),
        matcher.clone(),
        clock.clone(),
        config.payments.clone(),
    ));
    let challenges = Arc::new(VerificationService::new(
        db.clone(),
        matcher,
        clock.clone(),
        config.payments.clone(),
    ));
    let limiter = Arc::new(RateLimiter::new(db, config.rate_limits.clone(), clock));

    let mut registry = ToolRegistry::new(config.access.clone(), limiter);
    tools::builtin::register_payment_tools(&mut registry, invoices, challenges);
    registry
}
