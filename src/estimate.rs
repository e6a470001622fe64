//! Tax and total recompute.
//!
//! Pure: the two input strings fully determine the output. Unparseable
//! input counts as zero so typing never surfaces an error.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::str::FromStr;

/// Result of one recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Estimate {
    pub price: Decimal,
    pub rate_percent: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Estimate {
    pub fn tax_display(&self) -> String {
        format_usd(self.tax)
    }

    pub fn total_display(&self) -> String {
        format_usd(self.total)
    }
}

/// Recompute tax and total from the raw price and rate-percent field text.
pub fn recompute(price_text: &str, rate_percent_text: &str) -> Estimate {
    let price = parse_lenient(price_text);
    let rate_percent = parse_lenient(rate_percent_text);
    compute(price, rate_percent)
}

/// `tax = price * rate_percent / 100`, `total = price + tax`.
///
/// Out-of-range products degrade to zero, same as unparseable input.
pub fn compute(price: Decimal, rate_percent: Decimal) -> Estimate {
    let tax = price
        .checked_mul(rate_percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED));
    let total = tax.and_then(|t| price.checked_add(t));

    match (tax, total) {
        (Some(tax), Some(total)) => Estimate { price, rate_percent, tax, total },
        _ => {
            tracing::warn!(%price, %rate_percent, "estimate overflowed, showing zero");
            Estimate {
                price,
                rate_percent,
                tax: Decimal::ZERO,
                total: Decimal::ZERO,
            }
        }
    }
}

/// Lenient decimal parse: longest numeric prefix after leading whitespace,
/// zero when there is none. "12abc" → 12, "abc" → 0, ".5" → 0.5.
pub fn parse_lenient(input: &str) -> Decimal {
    let Some(number) = numeric_prefix(input.trim_start()) else {
        return Decimal::ZERO;
    };
    let parsed = if number.contains('e') {
        Decimal::from_scientific(&number)
    } else {
        Decimal::from_str(&number)
    };
    match parsed {
        Ok(d) => d.normalize(),
        Err(e) => {
            tracing::warn!(input, error = %e, "number out of range, treating as zero");
            Decimal::ZERO
        }
    }
}

/// Extract `[sign] digits [. digits] [e [sign] digits]` from the start of
/// `s`, rewritten into a form `rust_decimal` accepts.
fn numeric_prefix(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_part = &s[int_start..i];

    let mut frac_part = "";
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_part = &s[frac_start..j];
        i = j;
    }

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut exponent = String::new();
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        let mut exp = String::new();
        if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
            if bytes[j] == b'-' {
                exp.push('-');
            }
            j += 1;
        }
        let digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > digits_start {
            exp.push_str(&s[digits_start..j]);
            exponent = exp;
        }
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(if int_part.is_empty() { "0" } else { int_part });
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    if !exponent.is_empty() {
        out.push('e');
        out.push_str(&exponent);
    }
    Some(out)
}

/// en-US dollar amount: `$1,234.56`, `-$5.00`. Two fractional digits,
/// midpoints rounded away from zero.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, frac)
}
