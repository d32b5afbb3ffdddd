use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Wallet-ownership challenges, one live row per agent
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agents (
                agent_id TEXT PRIMARY KEY,
                wallet TEXT NOT NULL,
                status TEXT NOT NULL,
                tag TEXT NOT NULL,
                amount_nano TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                verified_at TEXT,
                proof_event_id TEXT,
                proof_sender TEXT
            )",
            [],
        )?;

        // Issued invoices
        conn.execute(
            "CREATE TABLE IF NOT EXISTS invoices (
                invoice_id TEXT PRIMARY KEY,
                amount_nano TEXT NOT NULL,
                recipient TEXT NOT NULL,
                expected_sender TEXT,
                payer_agent_id TEXT,
                description TEXT,
                comment TEXT NOT NULL,
                status TEXT NOT NULL,
                strict_sender INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                paid_at TEXT,
                tx_event_id TEXT,
                tx_sender TEXT,
                tx_amount_nano TEXT
            )",
            [],
        )?;

        // Cached native transfers, wallet-scoped so every invoice and
        // challenge on the same wallet shares one synced history
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transfers (
                wallet TEXT NOT NULL,
                event_id TEXT NOT NULL,
                action_index INTEGER NOT NULL,
                lt INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                amount_nano TEXT NOT NULL,
                comment TEXT NOT NULL DEFAULT '',
                tag TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (wallet, event_id, action_index)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_wallet_tag_ts
             ON transfers (wallet, tag, ts)",
            [],
        )?;

        // Per-wallet pagination watermarks (0 = not yet seen)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS wallet_sync (
                wallet TEXT PRIMARY KEY,
                last_sync_at INTEGER NOT NULL DEFAULT 0,
                max_lt INTEGER NOT NULL DEFAULT 0,
                min_lt INTEGER NOT NULL DEFAULT 0,
                max_ts INTEGER NOT NULL DEFAULT 0,
                min_ts INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Fixed-window tool rate counters, key = tool:caller
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rate_limits (
                key TEXT PRIMARY KEY,
                window_start INTEGER NOT NULL,
                count INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/tonpay.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();

        let conn = db.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('agents','invoices','transfers','wallet_sync','rate_limits')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_init_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tonpay.db");
        drop(Database::new(path.to_str().unwrap()).unwrap());
        // Re-opening the same file must not fail on existing tables
        Database::new(path.to_str().unwrap()).unwrap();
    }
}
