//! The estimate form: two editable fields, a status line and two
//! computed displays.

use crate::estimate::{self, Estimate};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateForm {
    pub price: String,
    pub rate_percent: String,
    pub status: String,
    pub sales_tax: String,
    pub total: String,
}

impl Default for EstimateForm {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl EstimateForm {
    pub fn new(price: impl Into<String>, rate_percent: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            rate_percent: rate_percent.into(),
            status: String::new(),
            sales_tax: estimate::format_usd(rust_decimal::Decimal::ZERO),
            total: estimate::format_usd(rust_decimal::Decimal::ZERO),
        }
    }

    /// Re-derive the two displays from the current field text. Touches
    /// nothing else.
    pub fn recompute(&mut self) -> Estimate {
        let est = estimate::recompute(&self.price, &self.rate_percent);
        self.sales_tax = est.tax_display();
        self.total = est.total_display();
        est
    }

    pub fn set_price(&mut self, text: impl Into<String>) -> Estimate {
        self.price = text.into();
        self.recompute()
    }

    pub fn set_rate_percent(&mut self, text: impl Into<String>) -> Estimate {
        self.rate_percent = text.into();
        self.recompute()
    }

    /// Terminal rendering used by the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.status.is_empty() {
            out.push_str(&format!("  {}\n", self.status));
        }
        out.push_str(&format!("  Price:      {}\n", display_or_dash(&self.price)));
        out.push_str(&format!("  Tax rate:   {} %\n", display_or_dash(&self.rate_percent)));
        out.push_str(&format!("  Sales tax:  {}\n", self.sales_tax));
        out.push_str(&format!("  Total:      {}\n", self.total));
        out
    }
}

fn display_or_dash(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s }
}
