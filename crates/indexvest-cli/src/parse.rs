//! Argument parsers for accounts, decimal fixed-point values and instants.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate};
use indexvest_core::types::{AccountId, Index, Percent, Timestamp};

/// `@label` derives the account from a label; anything else is base-58.
pub fn account(s: &str) -> anyhow::Result<AccountId> {
    match s.strip_prefix('@') {
        Some(label) if !label.is_empty() => Ok(AccountId::from_label(label)),
        Some(_) => bail!("empty account label"),
        None => AccountId::from_b58(s).map_err(|e| anyhow!("invalid account: {e}")),
    }
}

/// Parse a non-negative decimal into fixed point with `decimals` places.
/// Digits beyond `decimals` are rejected rather than rounded.
fn fixed_point(s: &str, decimals: usize) -> anyhow::Result<u128> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        bail!("empty number");
    }
    if frac.len() > decimals {
        bail!("{s}: at most {decimals} decimal places");
    }
    let digits = |part: &str| -> anyhow::Result<u128> {
        if part.is_empty() {
            return Ok(0);
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            bail!("{s}: not a decimal number");
        }
        part.parse::<u128>().with_context(|| format!("{s}: out of range"))
    };
    let unit = 10u128.pow(decimals as u32);
    let frac_value = digits(frac)? * 10u128.pow((decimals - frac.len()) as u32);
    digits(whole)?
        .checked_mul(unit)
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(|| anyhow!("{s}: out of range"))
}

/// `1.25` -> index 1.25 (18 decimals).
pub fn index(s: &str) -> anyhow::Result<Index> {
    let raw = fixed_point(s, 18)?;
    if raw == 0 {
        bail!("index must be positive");
    }
    Ok(Index::new(raw))
}

/// `2.5%` or `2.5` -> 2.5 percent (4 decimals).
pub fn percent(s: &str) -> anyhow::Result<Percent> {
    let s = s.trim_end_matches('%');
    let raw = fixed_point(s, 4)?;
    let raw = u32::try_from(raw).map_err(|_| anyhow!("{s}%: out of range"))?;
    Ok(Percent::new(raw))
}

/// Unix seconds, an RFC 3339 instant, or a `YYYY-MM-DD` date (midnight UTC).
pub fn instant(s: &str) -> anyhow::Result<Timestamp> {
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("{s}: expected unix seconds, RFC 3339 or YYYY-MM-DD"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| anyhow!("{s}: invalid date"))
}

/// `30d`, `12h`, `90m`, `45s` or bare seconds.
pub fn duration(s: &str) -> anyhow::Result<u64> {
    let (num, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let n: u64 = num.parse().with_context(|| format!("{s}: not a duration"))?;
    let mult = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => bail!("{s}: unknown duration unit '{unit}'"),
    };
    n.checked_mul(mult).ok_or_else(|| anyhow!("{s}: out of range"))
}
