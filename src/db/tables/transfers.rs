//! Database methods for the transfers table
//!
//! The cache is append-only and keyed by (wallet, event_id, action_index),
//! so re-ingesting a page the sync engine has already seen is a no-op.

use crate::db::Database;
use crate::models::CachedTransfer;
use rusqlite::Result as SqliteResult;

impl Database {
    /// Insert a normalized transfer. Returns true if the row was new.
    pub fn insert_transfer(&self, t: &CachedTransfer) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "INSERT OR IGNORE INTO transfers
                (wallet, event_id, action_index, lt, ts, sender, recipient, amount_nano, comment, tag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                t.wallet,
                t.event_id,
                t.action_index,
                t.lt,
                t.ts,
                t.sender,
                t.recipient,
                t.amount_nano,
                t.comment,
                t.tag,
            ],
        )?;
        Ok(affected > 0)
    }

    /// All cached transfers for (wallet, tag) inside [start_ts, end_ts],
    /// earliest first. lt breaks ties between same-second transfers.
    pub fn transfers_by_tag(
        &self,
        wallet: &str,
        tag: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> SqliteResult<Vec<CachedTransfer>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT wallet, event_id, action_index, lt, ts, sender, recipient, amount_nano, comment, tag
             FROM transfers
             WHERE wallet = ?1 AND tag = ?2 AND ts >= ?3 AND ts <= ?4
             ORDER BY ts ASC, lt ASC, action_index ASC",
        )?;

        let rows = stmt.query_map(rusqlite::params![wallet, tag, start_ts, end_ts], |row| {
            Ok(CachedTransfer {
                wallet: row.get(0)?,
                event_id: row.get(1)?,
                action_index: row.get(2)?,
                lt: row.get(3)?,
                ts: row.get(4)?,
                sender: row.get(5)?,
                recipient: row.get(6)?,
                amount_nano: row.get(7)?,
                comment: row.get(8)?,
                tag: row.get(9)?,
            })
        })?
        .collect();
        rows
    }

    pub fn count_transfers(&self, wallet: &str) -> SqliteResult<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM transfers WHERE wallet = ?1",
            [wallet],
            |row| row.get(0),
        )
    }
}
