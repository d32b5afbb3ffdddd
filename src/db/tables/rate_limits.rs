//! Database methods for the rate_limits table (fixed-window counters)

use crate::db::Database;
use rusqlite::Result as SqliteResult;

/// One counter row: when the current window opened and how many calls it has
/// absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub window_start: i64,
    pub count: u32,
}

impl Database {
    pub fn get_rate_window(&self, key: &str) -> SqliteResult<Option<RateWindow>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT window_start, count FROM rate_limits WHERE key = ?1")?;

        let window = stmt
            .query_row([key], |row| {
                Ok(RateWindow {
                    window_start: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u32,
                })
            })
            .ok();

        Ok(window)
    }

    /// Count one call against the key's window in a single keyed upsert: a
    /// lapsed window resets to count 1, a live one increments. Atomic, so two
    /// callers racing on the same key never both read the same count.
    /// Returns the window after this call.
    pub fn bump_rate_window(
        &self,
        key: &str,
        now: i64,
        window_secs: i64,
    ) -> SqliteResult<RateWindow> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO rate_limits (key, window_start, count) VALUES (?1, ?2, 1)
             ON CONFLICT(key) DO UPDATE SET
                count = CASE
                    WHEN window_start <= ?2 - ?3 THEN 1
                    ELSE count + 1
                END,
                window_start = CASE
                    WHEN window_start <= ?2 - ?3 THEN ?2
                    ELSE window_start
                END",
            rusqlite::params![key, now, window_secs],
        )?;

        conn.query_row(
            "SELECT window_start, count FROM rate_limits WHERE key = ?1",
            [key],
            |row| {
                Ok(RateWindow {
                    window_start: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u32,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_bump_counts_within_window() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_rate_window("check_invoice:alice").unwrap(), None);

        let w = db.bump_rate_window("check_invoice:alice", 100, 60).unwrap();
        assert_eq!((w.window_start, w.count), (100, 1));

        let w = db.bump_rate_window("check_invoice:alice", 130, 60).unwrap();
        assert_eq!((w.window_start, w.count), (100, 2));
    }

    #[test]
    fn test_bump_resets_lapsed_window() {
        let db = Database::in_memory().unwrap();
        db.bump_rate_window("k", 100, 60).unwrap();
        db.bump_rate_window("k", 110, 60).unwrap();

        let w = db.bump_rate_window("k", 160, 60).unwrap();
        assert_eq!((w.window_start, w.count), (160, 1));
    }

    #[test]
    fn test_concurrent_bumps_all_counted() {
        use std::sync::Arc;

        let db = Arc::new(Database::in_memory().unwrap());
        std::thread::scope(|s| {
            for _ in 0..8 {
                let db = db.clone();
                s.spawn(move || {
                    db.bump_rate_window("k", 100, 60).unwrap();
                });
            }
        });

        // No lost updates: every call landed on the counter
        let w = db.get_rate_window("k").unwrap().unwrap();
        assert_eq!(w.count, 8);
    }
}
