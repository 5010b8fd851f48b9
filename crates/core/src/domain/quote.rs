use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedQuoteLine {
    pub product: String,
    pub carat: String,
    pub housing: Option<String>,
    pub shape: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub unit_retail: Decimal,
    pub retail_total: Decimal,
}

/// Priced snapshot of an order. Holds no identity; recompute it freely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<PricedQuoteLine>,
    pub subtotal: Decimal,
    pub discount_percent: u8,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub total_pieces: u32,
    pub total_retail: Decimal,
    pub minimum_met: bool,
    pub warnings: Vec<String>,
}

impl Default for Quote {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            discount_percent: 0,
            discount_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            total_pieces: 0,
            total_retail: Decimal::ZERO,
            minimum_met: false,
            warnings: Vec::new(),
        }
    }
}

impl Quote {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        let discount = if self.discount_percent > 0 {
            format!(", discount {}% (-€{})", self.discount_percent, self.discount_amount)
        } else {
            String::new()
        };
        format!(
            "{} lines, {} pcs, subtotal €{}{}, total €{}, retail €{}",
            self.lines.len(),
            self.total_pieces,
            self.subtotal,
            discount,
            self.total,
            self.total_retail
        )
    }
}
