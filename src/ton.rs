//! TON-specific helpers: nano amounts, address normalization, correlation
//! tags and payment deep links.
//!
//! Amounts are carried as integer nano-TON strings end to end; floats never
//! touch a financial comparison.

use rand::RngCore;

/// TON has 9 decimals; 1 TON = 1_000_000_000 nano.
pub const NANO_PER_TON: u128 = 1_000_000_000;
const TON_DECIMALS: usize = 9;

/// Parse a human-readable TON amount (e.g. "1.5") into nano units.
/// A plain integer with no decimal point is treated as whole TON.
pub fn parse_ton_amount(amount: &str) -> Result<u128, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("empty amount".to_string());
    }

    if !amount.contains('.') {
        let whole: u128 = amount
            .parse()
            .map_err(|_| format!("Invalid amount '{}'", amount))?;
        return whole
            .checked_mul(NANO_PER_TON)
            .ok_or_else(|| format!("Amount '{}' overflows", amount));
    }

    let parts: Vec<&str> = amount.split('.').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid decimal amount: {}", amount));
    }

    let whole: u128 = if parts[0].is_empty() {
        0
    } else {
        parts[0]
            .parse()
            .map_err(|_| format!("Invalid whole part in '{}'", amount))?
    };

    let frac_str = parts[1];
    if frac_str.is_empty() || frac_str.len() > TON_DECIMALS {
        return Err(format!(
            "Fractional part of '{}' must be 1..={} digits",
            amount, TON_DECIMALS
        ));
    }

    // Pad fractional part out to full nano precision
    let padded = format!("{:0<width$}", frac_str, width = TON_DECIMALS);
    let frac: u128 = padded
        .parse()
        .map_err(|_| format!("Invalid fractional part in '{}'", amount))?;

    whole
        .checked_mul(NANO_PER_TON)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| format!("Amount '{}' overflows", amount))
}

/// Render a nano amount back as a human TON string ("1500000000" -> "1.5").
pub fn format_nano(nano: u128) -> String {
    let whole = nano / NANO_PER_TON;
    let frac = nano % NANO_PER_TON;
    if frac == 0 {
        format!("{}", whole)
    } else {
        let frac_str = format!("{:0>width$}", frac, width = TON_DECIMALS)
            .trim_end_matches('0')
            .to_string();
        format!("{}.{}", whole, frac_str)
    }
}

/// Parse a stored nano string for comparison. Stored values are written by
/// this crate, so failure here means row corruption; it surfaces as 0 and a
/// warning rather than a panic.
pub fn nano_or_zero(raw: &str) -> u128 {
    raw.parse().unwrap_or_else(|_| {
        log::warn!("[ton] Unparseable nano amount '{}' treated as 0", raw);
        0
    })
}

/// Normalize a wallet address for comparison and cache keying.
/// tonapi returns raw-form addresses ("0:abc..."); friendly-form input is
/// kept as-is apart from case folding, since the upstream query accepts both.
pub fn normalize_address(addr: &str) -> String {
    addr.trim().to_lowercase()
}

/// Derive the correlation tag from a transfer comment: the first
/// whitespace-separated token, or empty when there is no comment.
///
/// Tags are a lightweight correlation protocol, not authentication - anyone
/// can copy a tag into a comment. Sender checks (`strict_sender`) are the
/// actual trust boundary.
pub fn derive_tag(comment: &str) -> String {
    comment.split_whitespace().next().unwrap_or("").to_string()
}

/// Tag for an invoice comment: `INV#<invoice_id>`.
pub fn invoice_tag(invoice_id: &str) -> String {
    format!("INV#{}", invoice_id)
}

/// Tag for a verification challenge: `VRF#<agent_id>#<random hex>`.
/// The random suffix keeps a reissued challenge distinguishable from stale
/// transfers that matched an earlier one.
pub fn challenge_tag(agent_id: &str) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("VRF#{}#{}", agent_id, hex::encode(suffix))
}

/// Payment deep links the agent can hand to the payer: the raw `ton://`
/// transfer URI plus a Tonkeeper https fallback.
pub fn payment_links(wallet: &str, amount_nano: u128, tag: &str) -> serde_json::Value {
    let text = urlencoding::encode(tag);
    serde_json::json!({
        "ton": format!("ton://transfer/{}?amount={}&text={}", wallet, amount_nano, text),
        "tonkeeper": format!(
            "https://app.tonkeeper.com/transfer/{}?amount={}&text={}",
            wallet, amount_nano, text
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ton_amount() {
        assert_eq!(parse_ton_amount("1.5").unwrap(), 1_500_000_000);
        assert_eq!(parse_ton_amount("0.000000001").unwrap(), 1);
        assert_eq!(parse_ton_amount("2").unwrap(), 2_000_000_000);
        assert_eq!(parse_ton_amount(".5").unwrap(), 500_000_000);
    }

    #[test]
    fn test_parse_ton_amount_rejects_garbage() {
        assert!(parse_ton_amount("").is_err());
        assert!(parse_ton_amount("1.2.3").is_err());
        assert!(parse_ton_amount("1.0000000001").is_err()); // > 9 decimals
        assert!(parse_ton_amount("abc").is_err());
        assert!(parse_ton_amount("-1").is_err());
    }

    #[test]
    fn test_format_nano_round_trip() {
        assert_eq!(format_nano(1_500_000_000), "1.5");
        assert_eq!(format_nano(1), "0.000000001");
        assert_eq!(format_nano(2_000_000_000), "2");
        assert_eq!(parse_ton_amount(&format_nano(123_456_789)).unwrap(), 123_456_789);
    }

    #[test]
    fn test_derive_tag() {
        assert_eq!(derive_tag("INV#abc hello there"), "INV#abc");
        assert_eq!(derive_tag("  VRF#alice#1f2e  "), "VRF#alice#1f2e");
        assert_eq!(derive_tag(""), "");
        assert_eq!(derive_tag("   "), "");
    }

    #[test]
    fn test_challenge_tag_embeds_agent_and_varies() {
        let a = challenge_tag("alice");
        let b = challenge_tag("alice");
        assert!(a.starts_with("VRF#alice#"));
        assert_ne!(a, b);
        // Single token - survives derive_tag intact
        assert_eq!(derive_tag(&a), a);
    }

    #[test]
    fn test_payment_links_encode_tag() {
        let links = payment_links("0:abc", 10, "INV#1");
        let ton = links["ton"].as_str().unwrap();
        assert!(ton.contains("amount=10"));
        assert!(ton.contains("text=INV%231"));
    }
}
