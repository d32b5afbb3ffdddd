//! Database methods for the invoices table

use crate::db::Database;
use crate::models::{Invoice, InvoiceStatus};
use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_invoice(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invoice> {
    let status_str: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let expires_at: String = row.get(10)?;
    let paid_at: Option<String> = row.get(11)?;

    Ok(Invoice {
        invoice_id: row.get(0)?,
        amount_nano: row.get(1)?,
        recipient: row.get(2)?,
        expected_sender: row.get(3)?,
        payer_agent_id: row.get(4)?,
        description: row.get(5)?,
        comment: row.get(6)?,
        status: InvoiceStatus::from_str(&status_str).unwrap_or(InvoiceStatus::Pending),
        strict_sender: row.get::<_, i32>(8)? != 0,
        created_at: parse_dt(&created_at),
        expires_at: parse_dt(&expires_at),
        paid_at: paid_at.as_deref().map(parse_dt),
        tx_event_id: row.get(12)?,
        tx_sender: row.get(13)?,
        tx_amount_nano: row.get(14)?,
    })
}

const INVOICE_COLUMNS: &str =
    "invoice_id, amount_nano, recipient, expected_sender, payer_agent_id, description,
     comment, status, strict_sender, created_at, expires_at, paid_at,
     tx_event_id, tx_sender, tx_amount_nano";

impl Database {
    /// Insert a new invoice. The primary key rejects id reuse.
    pub fn insert_invoice(&self, inv: &Invoice) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO invoices
                (invoice_id, amount_nano, recipient, expected_sender, payer_agent_id,
                 description, comment, status, strict_sender, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                inv.invoice_id,
                inv.amount_nano,
                inv.recipient,
                inv.expected_sender,
                inv.payer_agent_id,
                inv.description,
                inv.comment,
                inv.status.as_str(),
                inv.strict_sender as i32,
                inv.created_at.to_rfc3339(),
                inv.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_invoice(&self, invoice_id: &str) -> SqliteResult<Option<Invoice>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = ?1",
            INVOICE_COLUMNS
        ))?;

        let invoice = stmt.query_row([invoice_id], row_to_invoice).ok();
        Ok(invoice)
    }

    /// Transition pending -> paid, recording the settling transfer. The
    /// status guard makes the transition exactly-once under concurrent
    /// checks; returns true when this call won.
    pub fn mark_invoice_paid(
        &self,
        invoice_id: &str,
        paid_at: DateTime<Utc>,
        tx_event_id: &str,
        tx_sender: &str,
        tx_amount_nano: &str,
    ) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE invoices
             SET status = 'paid', paid_at = ?1, tx_event_id = ?2, tx_sender = ?3, tx_amount_nano = ?4
             WHERE invoice_id = ?5 AND status = 'pending'",
            rusqlite::params![
                paid_at.to_rfc3339(),
                tx_event_id,
                tx_sender,
                tx_amount_nano,
                invoice_id
            ],
        )?;
        Ok(affected > 0)
    }

    /// Transition pending -> expired (lazy, evaluated at check time).
    pub fn mark_invoice_expired(&self, invoice_id: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE invoices SET status = 'expired'
             WHERE invoice_id = ?1 AND status = 'pending'",
            [invoice_id],
        )?;
        Ok(affected > 0)
    }
}
