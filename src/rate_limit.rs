//! Per-caller, per-tool fixed-window rate limiting.
//!
//! Windows are persisted in sqlite so budgets survive a process restart;
//! a crash never grants a fresh window.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::db::Database;
use crate::error::ToolError;

pub struct RateLimiter {
    db: Arc<Database>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(db: Arc<Database>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        RateLimiter { db, config, clock }
    }

    fn budget_for(&self, tool: &str) -> u32 {
        self.config
            .per_tool
            .get(tool)
            .copied()
            .unwrap_or(self.config.default_max_calls)
    }

    /// Count one call against the caller's window for this tool. The
    /// reset-or-increment is one keyed upsert, so concurrent callers can
    /// never both slip under the budget with the same count. Returns
    /// `RateLimited` with a positive retry hint once the budget is spent.
    pub fn check(&self, tool: &str, caller: &str) -> Result<(), ToolError> {
        let max_calls = self.budget_for(tool);
        if max_calls == 0 {
            return Err(ToolError::RateLimited {
                retry_after_secs: self.config.window_secs.max(1),
            });
        }

        let key = format!("{}:{}", tool, caller);
        let now = self.clock.now_ts();
        let window = self
            .db
            .bump_rate_window(&key, now, self.config.window_secs)?;

        if window.count > max_calls {
            let retry_after_secs = (window.window_start + self.config.window_secs - now).max(1);
            log::warn!(
                "[rate_limit] '{}' over budget for {} (retry in {}s)",
                caller,
                tool,
                retry_after_secs
            );
            return Err(ToolError::RateLimited { retry_after_secs });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max_calls: u32, window_secs: i64) -> (RateLimiter, Arc<ManualClock>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at_ts(1_000_000));
        let config = RateLimitConfig {
            default_max_calls: max_calls,
            window_secs,
            ..Default::default()
        };
        (RateLimiter::new(db, config, clock.clone()), clock)
    }

    #[test]
    fn test_budget_is_enforced() {
        let (limiter, _clock) = limiter(3, 60);
        for _ in 0..3 {
            limiter.check("check_invoice", "alice").unwrap();
        }
        match limiter.check("check_invoice", "alice") {
            Err(ToolError::RateLimited { retry_after_secs }) => assert!(retry_after_secs > 0),
            other => panic!("expected RateLimited, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_window_lapses() {
        let (limiter, clock) = limiter(1, 60);
        limiter.check("check_invoice", "alice").unwrap();
        assert!(limiter.check("check_invoice", "alice").is_err());

        clock.advance_secs(60);
        limiter.check("check_invoice", "alice").unwrap();
    }

    #[test]
    fn test_budgets_are_per_tool_and_caller() {
        let (limiter, _clock) = limiter(1, 60);
        limiter.check("check_invoice", "alice").unwrap();
        // Different caller and different tool each get their own window
        limiter.check("check_invoice", "bob").unwrap();
        limiter.check("get_receipt", "alice").unwrap();
        assert!(limiter.check("check_invoice", "alice").is_err());
    }

    #[test]
    fn test_concurrent_callers_cannot_exceed_budget() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let (limiter, _clock) = limiter(4, 60);
        let limiter = Arc::new(limiter);
        let passed = AtomicU32::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                let limiter = limiter.clone();
                let passed = &passed;
                s.spawn(move || {
                    if limiter.check("check_invoice", "alice").is_ok() {
                        passed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        // Exactly the budget passes, never more
        assert_eq!(passed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_per_tool_override() {
        let db = Arc::new(Database::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at_ts(1_000_000));
        let mut config = RateLimitConfig {
            default_max_calls: 10,
            window_secs: 60,
            ..Default::default()
        };
        config.per_tool.insert("create_invoice".to_string(), 1);
        let limiter = RateLimiter::new(db, config, clock);

        limiter.check("create_invoice", "alice").unwrap();
        assert!(limiter.check("create_invoice", "alice").is_err());
        // Untouched tools keep the default budget
        limiter.check("check_invoice", "alice").unwrap();
    }
}
