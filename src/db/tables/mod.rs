//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for one table group.

mod agents;      // agents (wallet-ownership challenges)
mod invoices;    // invoices
mod rate_limits;     // rate_limits (fixed-window tool counters)
mod transfers;   // transfers (cached native transfers)
mod wallet_sync; // wallet_sync (per-wallet pagination watermarks)
