//! Database methods for the agents table (wallet-ownership challenges)

use crate::db::Database;
use crate::models::{Challenge, ChallengeStatus};
use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    let status_str: String = row.get(2)?;
    let created_at: String = row.get(5)?;
    let expires_at: String = row.get(6)?;
    let verified_at: Option<String> = row.get(7)?;

    Ok(Challenge {
        agent_id: row.get(0)?,
        wallet: row.get(1)?,
        status: ChallengeStatus::from_str(&status_str).unwrap_or(ChallengeStatus::Pending),
        tag: row.get(3)?,
        amount_nano: row.get(4)?,
        created_at: parse_dt(&created_at),
        expires_at: parse_dt(&expires_at),
        verified_at: verified_at.as_deref().map(parse_dt),
        proof_event_id: row.get(8)?,
        proof_sender: row.get(9)?,
    })
}

impl Database {
    /// Create or replace the challenge for an agent. Reissuing overwrites the
    /// prior pending row; a verified row is left alone by the caller.
    pub fn upsert_challenge(&self, c: &Challenge) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO agents
                (agent_id, wallet, status, tag, amount_nano, created_at, expires_at,
                 verified_at, proof_event_id, proof_sender)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, NULL)
             ON CONFLICT(agent_id) DO UPDATE SET
                wallet = excluded.wallet,
                status = excluded.status,
                tag = excluded.tag,
                amount_nano = excluded.amount_nano,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                verified_at = NULL,
                proof_event_id = NULL,
                proof_sender = NULL",
            rusqlite::params![
                c.agent_id,
                c.wallet,
                c.status.as_str(),
                c.tag,
                c.amount_nano,
                c.created_at.to_rfc3339(),
                c.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_challenge(&self, agent_id: &str) -> SqliteResult<Option<Challenge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT agent_id, wallet, status, tag, amount_nano, created_at, expires_at,
                    verified_at, proof_event_id, proof_sender
             FROM agents WHERE agent_id = ?1",
        )?;

        let challenge = stmt.query_row([agent_id], row_to_challenge).ok();
        Ok(challenge)
    }

    /// Transition pending -> verified, recording the proof. The status guard
    /// makes repeated confirmations a no-op; returns true when this call won.
    pub fn mark_challenge_verified(
        &self,
        agent_id: &str,
        verified_at: DateTime<Utc>,
        proof_event_id: &str,
        proof_sender: &str,
    ) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE agents
             SET status = 'verified', verified_at = ?1, proof_event_id = ?2, proof_sender = ?3
             WHERE agent_id = ?4 AND status = 'pending'",
            rusqlite::params![verified_at.to_rfc3339(), proof_event_id, proof_sender, agent_id],
        )?;
        Ok(affected > 0)
    }

    /// Transition pending -> expired (lazy, evaluated at check time).
    pub fn mark_challenge_expired(&self, agent_id: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE agents SET status = 'expired'
             WHERE agent_id = ?1 AND status = 'pending'",
            [agent_id],
        )?;
        Ok(affected > 0)
    }

    /// Wallet of an agent that has completed verification, if any.
    pub fn get_verified_wallet(&self, agent_id: &str) -> SqliteResult<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT wallet FROM agents WHERE agent_id = ?1 AND status = 'verified'",
        )?;
        let wallet = stmt.query_row([agent_id], |row| row.get(0)).ok();
        Ok(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn challenge(agent_id: &str, tag: &str) -> Challenge {
        let now = Utc::now();
        Challenge {
            agent_id: agent_id.to_string(),
            wallet: "0:claimed".to_string(),
            status: ChallengeStatus::Pending,
            tag: tag.to_string(),
            amount_nano: "10000000".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(900),
            verified_at: None,
            proof_event_id: None,
            proof_sender: None,
        }
    }

    #[test]
    fn test_reissue_overwrites_pending() {
        let db = Database::in_memory().unwrap();
        db.upsert_challenge(&challenge("alice", "VRF#alice#aaaa")).unwrap();
        db.upsert_challenge(&challenge("alice", "VRF#alice#bbbb")).unwrap();

        let c = db.get_challenge("alice").unwrap().unwrap();
        assert_eq!(c.tag, "VRF#alice#bbbb");
        assert_eq!(c.status, ChallengeStatus::Pending);
    }

    #[test]
    fn test_verify_is_exactly_once() {
        let db = Database::in_memory().unwrap();
        db.upsert_challenge(&challenge("alice", "VRF#alice#aaaa")).unwrap();

        let now = Utc::now();
        assert!(db.mark_challenge_verified("alice", now, "ev1", "0:claimed").unwrap());
        // Second transition loses the status guard
        assert!(!db.mark_challenge_verified("alice", now, "ev2", "0:other").unwrap());

        let c = db.get_challenge("alice").unwrap().unwrap();
        assert_eq!(c.status, ChallengeStatus::Verified);
        assert_eq!(c.proof_event_id.as_deref(), Some("ev1"));
    }

    #[test]
    fn test_expire_does_not_touch_verified() {
        let db = Database::in_memory().unwrap();
        db.upsert_challenge(&challenge("alice", "VRF#alice#aaaa")).unwrap();
        db.mark_challenge_verified("alice", Utc::now(), "ev1", "0:claimed")
            .unwrap();

        assert!(!db.mark_challenge_expired("alice").unwrap());
        let c = db.get_challenge("alice").unwrap().unwrap();
        assert_eq!(c.status, ChallengeStatus::Verified);
    }

    #[test]
    fn test_verified_wallet_lookup() {
        let db = Database::in_memory().unwrap();
        db.upsert_challenge(&challenge("alice", "VRF#alice#aaaa")).unwrap();
        assert_eq!(db.get_verified_wallet("alice").unwrap(), None);

        db.mark_challenge_verified("alice", Utc::now(), "ev1", "0:claimed")
            .unwrap();
        assert_eq!(
            db.get_verified_wallet("alice").unwrap().as_deref(),
            Some("0:claimed")
        );
    }
}
