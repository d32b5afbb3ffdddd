//! Database methods for the wallet_sync table
//!
//! One watermark row per tracked wallet. Zero means "nothing seen yet";
//! merges only ever widen the lt/ts bounds.

use crate::db::Database;
use crate::models::WalletSyncState;
use rusqlite::Result as SqliteResult;

impl Database {
    pub fn get_wallet_sync(&self, wallet: &str) -> SqliteResult<Option<WalletSyncState>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT last_sync_at, max_lt, min_lt, max_ts, min_ts
             FROM wallet_sync WHERE wallet = ?1",
        )?;

        let state = stmt
            .query_row([wallet], |row| {
                Ok(WalletSyncState {
                    last_sync_ts: row.get(0)?,
                    max_lt: row.get(1)?,
                    min_lt: row.get(2)?,
                    max_ts: row.get(3)?,
                    min_ts: row.get(4)?,
                })
            })
            .ok();

        Ok(state)
    }

    /// Record that a sync pass started now, unconditionally.
    pub fn touch_wallet_sync(&self, wallet: &str, now_ts: i64) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO wallet_sync (wallet, last_sync_at) VALUES (?1, ?2)
             ON CONFLICT(wallet) DO UPDATE SET last_sync_at = excluded.last_sync_at",
            rusqlite::params![wallet, now_ts],
        )?;
        Ok(())
    }

    /// Claim the sync slot for a wallet in one statement: the row's
    /// last_sync_at advances only if the minimum interval has elapsed, so of
    /// two callers racing on the same wallet exactly one wins the claim.
    /// Returns true when this call claimed the slot.
    pub fn try_claim_wallet_sync(
        &self,
        wallet: &str,
        now_ts: i64,
        min_interval_secs: i64,
    ) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "INSERT INTO wallet_sync (wallet, last_sync_at) VALUES (?1, ?2)
             ON CONFLICT(wallet) DO UPDATE SET last_sync_at = ?2
             WHERE wallet_sync.last_sync_at <= ?2 - ?3",
            rusqlite::params![wallet, now_ts, min_interval_secs],
        )?;
        Ok(affected > 0)
    }

    /// Merge observed lt/ts bounds into the watermark. min fields treat 0 as
    /// unset; max fields take the larger value. The row never narrows.
    pub fn widen_wallet_sync(
        &self,
        wallet: &str,
        min_lt: i64,
        max_lt: i64,
        min_ts: i64,
        max_ts: i64,
    ) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO wallet_sync (wallet, last_sync_at, max_lt, min_lt, max_ts, min_ts)
             VALUES (?1, 0, ?2, ?3, ?4, ?5)
             ON CONFLICT(wallet) DO UPDATE SET
                max_lt = MAX(max_lt, excluded.max_lt),
                min_lt = CASE
                    WHEN min_lt = 0 THEN excluded.min_lt
                    WHEN excluded.min_lt = 0 THEN min_lt
                    ELSE MIN(min_lt, excluded.min_lt)
                END,
                max_ts = MAX(max_ts, excluded.max_ts),
                min_ts = CASE
                    WHEN min_ts = 0 THEN excluded.min_ts
                    WHEN excluded.min_ts = 0 THEN min_ts
                    ELSE MIN(min_ts, excluded.min_ts)
                END",
            rusqlite::params![wallet, max_lt, min_lt, max_ts, min_ts],
        )?;
        Ok(())
    }
}
