use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AmountError {
    #[error("Amount has no digits: '{0}'")]
    NoDigits(String),
    #[error("Invalid amount: '{0}'")]
    Malformed(String),
}

/// Symbols stripped before numeric parsing. The exact set is deployment
/// configuration, not business logic.
#[derive(Debug, Clone)]
pub struct AmountOptions {
    pub currency_symbols: Vec<char>,
}

impl Default for AmountOptions {
    fn default() -> Self {
        Self {
            currency_symbols: vec!['$', '£', '€', '¥'],
        }
    }
}

/// Parse a raw amount cell into a signed decimal, 2 fractional digits.
///
/// Applied in order: trim, accounting parentheses ⇒ negative, strip currency
/// symbols and thousands separators, trailing minus ⇒ negative, explicit
/// leading sign, bare value positive. No digits or more than one decimal
/// point is a failure; the owning row gets rejected, never zeroed.
pub fn parse_amount(raw: &str, opts: &AmountOptions) -> Result<Decimal, AmountError> {
    let s = raw.trim();

    let (mut negative, s) = if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };

    let mut cleaned: String = s
        .chars()
        .filter(|c| !opts.currency_symbols.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.len() > 1 && cleaned.ends_with('-') {
        negative = true;
        cleaned.pop();
    }
    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = true;
        cleaned = rest.to_string();
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        cleaned = rest.to_string();
    }

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(AmountError::NoDigits(raw.to_string()));
    }
    if cleaned.chars().filter(|&c| c == '.').count() > 1
        || cleaned.chars().any(|c| !c.is_ascii_digit() && c != '.')
    {
        return Err(AmountError::Malformed(raw.to_string()));
    }

    let mut dec =
        Decimal::from_str(&cleaned).map_err(|_| AmountError::Malformed(raw.to_string()))?;
    if negative {
        dec = -dec;
    }
    Ok(dec.round_dp(2))
}

/// Two-digit years below the pivot land in the 2000s, the rest in the 1900s.
/// Inherently ambiguous, so the pivot is explicit configuration.
#[derive(Debug, Clone)]
pub struct DateOptions {
    pub two_digit_pivot: u8,
}

impl Default for DateOptions {
    fn default() -> Self {
        Self { two_digit_pivot: 50 }
    }
}

/// Formats tried (after the schema-inference winner) when normalizing dates.
pub const FALLBACK_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%Y-%m-%d", "%d-%b-%Y", "%m/%d/%y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y",
    "%d-%m-%Y", "%d-%b-%y",
];

/// Parse a raw date cell. The inference-winning format is tried first, then
/// the fixed fallback list. Failure yields `None`, a null date rather than a
/// rejected row.
pub fn parse_date(raw: &str, preferred: Option<&str>, opts: &DateOptions) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(fmt) = preferred {
        if let Some(date) = parse_with(s, fmt, opts) {
            return Some(date);
        }
    }
    FALLBACK_FORMATS
        .iter()
        .filter(|fmt| Some(**fmt) != preferred)
        .find_map(|fmt| parse_with(s, fmt, opts))
}

/// Parse with exactly one format; schema sampling scores formats
/// individually and must not fall through to the fallback list.
pub(crate) fn parse_with(s: &str, fmt: &str, opts: &DateOptions) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, fmt).ok()?;
    if fmt.contains("%y") {
        // chrono applies its own 1969 pivot to %y; re-base onto ours.
        let yy = date.year().rem_euclid(100);
        let year = if yy < opts.two_digit_pivot as i32 {
            2000 + yy
        } else {
            1900 + yy
        };
        return date.with_year(year);
    }
    // chrono's %Y accepts fewer than four digits; a tiny year means a
    // two-digit value hit a four-digit format, so let the %y formats claim it.
    if date.year() < 1000 {
        return None;
    }
    Some(date)
}
