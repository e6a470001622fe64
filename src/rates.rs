//! Statewide sales tax rates.
//!
//! Rates are 2024 statewide figures and do not include local sales taxes.
//! Keys are matched exactly: no case folding, no aliases.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// (region, mantissa, scale): `("California", 725, 4)` is 0.0725.
const STATEWIDE_RATES: &[(&str, i64, u32)] = &[
    ("Alabama", 4, 2),
    ("Alaska", 0, 2),
    ("Arizona", 56, 3),
    ("Arkansas", 65, 3),
    ("California", 725, 4),
    ("Colorado", 29, 3),
    ("Connecticut", 635, 4),
    ("Delaware", 0, 2),
    ("District of Columbia", 6, 2),
    ("Florida", 6, 2),
    ("Georgia", 4, 2),
    ("Hawaii", 4, 2),
    ("Idaho", 6, 2),
    ("Illinois", 625, 4),
    ("Indiana", 7, 2),
    ("Iowa", 6, 2),
    ("Kansas", 65, 3),
    ("Kentucky", 6, 2),
    ("Louisiana", 445, 4),
    ("Maine", 55, 3),
    ("Maryland", 6, 2),
    ("Massachusetts", 625, 4),
    ("Michigan", 6, 2),
    ("Minnesota", 6875, 5),
    ("Mississippi", 7, 2),
    ("Missouri", 4225, 5),
    ("Montana", 0, 2),
    ("Nebraska", 55, 3),
    ("Nevada", 685, 4),
    ("New Hampshire", 0, 2),
    ("New Jersey", 6625, 5),
    ("New Mexico", 5125, 5),
    ("New York", 4, 2),
    ("North Carolina", 475, 4),
    ("North Dakota", 5, 2),
    ("Ohio", 575, 4),
    ("Oklahoma", 45, 3),
    ("Oregon", 0, 2),
    ("Pennsylvania", 6, 2),
    ("Rhode Island", 7, 2),
    ("South Carolina", 6, 2),
    ("South Dakota", 45, 3),
    ("Tennessee", 7, 2),
    ("Texas", 625, 4),
    ("Utah", 485, 4),
    ("Vermont", 6, 2),
    ("Virginia", 53, 3),
    ("Washington", 65, 3),
    ("West Virginia", 6, 2),
    ("Wisconsin", 5, 2),
    ("Wyoming", 4, 2),
];

const STATEWIDE_YEAR: i32 = 2024;

#[derive(Debug, Error, PartialEq)]
pub enum RateTableError {
    #[error("negative tax rate {rate} for region '{region}'")]
    NegativeRate { region: String, rate: Decimal },
}

/// One row of the table, as listed by the CLI and the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateEntry {
    pub region: String,
    pub rate: Decimal,
    pub rate_percent: String,
}

/// Immutable region → rate mapping. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<String, Decimal>,
    effective_from: Option<NaiveDate>,
}

impl RateTable {
    /// The built-in statewide table: 50 states plus the District of Columbia.
    pub fn statewide() -> Self {
        let rates = STATEWIDE_RATES
            .iter()
            .map(|&(region, num, scale)| (region.to_string(), Decimal::new(num, scale)))
            .collect();
        Self {
            rates,
            effective_from: NaiveDate::from_ymd_opt(STATEWIDE_YEAR, 1, 1),
        }
    }

    /// Build a custom table. Rates must be non-negative fractions.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, RateTableError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let mut rates = HashMap::new();
        for (region, rate) in entries {
            let region = region.into();
            if rate.is_sign_negative() && !rate.is_zero() {
                return Err(RateTableError::NegativeRate { region, rate });
            }
            rates.insert(region, rate);
        }
        Ok(Self { rates, effective_from: None })
    }

    /// Exact-match lookup. `None` is an ordinary outcome (territories,
    /// foreign regions, typos), not an error.
    pub fn lookup(&self, region: &str) -> Option<Decimal> {
        self.rates.get(region).copied()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.rates.contains_key(region)
    }

    /// Entries sorted by region name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        let mut entries: Vec<(&str, Decimal)> =
            self.rates.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn entries(&self) -> Vec<RateEntry> {
        self.iter()
            .map(|(region, rate)| RateEntry {
                region: region.to_string(),
                rate,
                rate_percent: rate_percent_field(rate),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Date the built-in figures took effect. `None` for custom tables.
    pub fn effective_from(&self) -> Option<NaiveDate> {
        self.effective_from
    }

    /// Year of the figures, e.g. 2024. `None` for custom tables.
    pub fn effective_year(&self) -> Option<i32> {
        self.effective_from.map(|d| d.year())
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::statewide()
    }
}

/// Text for the rate-percent field: `rate * 100` with exactly three
/// fractional digits, e.g. 0.0725 → "7.250".
pub fn rate_percent_field(rate: Decimal) -> String {
    let percent = (rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.3}", percent)
}
