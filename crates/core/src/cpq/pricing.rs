use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::cpq::catalog::Catalog;
use crate::domain::collection::CollectionDefinition;
use crate::domain::order::{OrderLine, OrderLineColorConfig};
use crate::domain::quote::{PricedQuoteLine, Quote};

/// Subtotal (EUR) from which the volume discount applies.
pub const DISCOUNT_THRESHOLD: u32 = 1600;
pub const DISCOUNT_PERCENT: u8 = 10;
/// Absolute order floor (EUR), independent of the discount threshold.
pub const MINIMUM_ORDER: u32 = 800;

pub trait QuoteEngine: Send + Sync {
    fn calculate(&self, lines: &[OrderLine]) -> Quote;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicQuoteEngine {
    catalog: Catalog,
}

impl DeterministicQuoteEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

impl QuoteEngine for DeterministicQuoteEngine {
    fn calculate(&self, lines: &[OrderLine]) -> Quote {
        calculate_quote_with_catalog(&self.catalog, lines)
    }
}

pub fn calculate_quote(lines: &[OrderLine]) -> Quote {
    calculate_quote_with_catalog(&Catalog::standard(), lines)
}

/// Prices every color config in input order. Defects clamp and warn; this never fails.
pub fn calculate_quote_with_catalog(catalog: &Catalog, lines: &[OrderLine]) -> Quote {
    let mut priced = Vec::new();
    let mut warnings = Vec::new();

    for line in lines {
        let Some(collection) = catalog.find_collection(&line.collection_id) else {
            debug!(
                event_name = "cpq.quote.line_skipped",
                collection_id = %line.collection_id,
                "order line references an unknown collection"
            );
            continue;
        };
        if !collection.is_consistent() {
            continue;
        }

        for config in &line.colors {
            priced.push(price_color_config(collection, config, &mut warnings));
        }
    }

    let subtotal: Decimal = priced.iter().map(|line| line.line_total).sum();
    let total_pieces: u32 = priced.iter().fold(0u32, |acc, line| acc.saturating_add(line.quantity));
    let total_retail: Decimal = priced.iter().map(|line| line.retail_total).sum();

    let discount_percent =
        if subtotal >= Decimal::from(DISCOUNT_THRESHOLD) { DISCOUNT_PERCENT } else { 0 };
    let discount_amount = (subtotal * Decimal::from(discount_percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal - discount_amount;

    let minimum = Decimal::from(MINIMUM_ORDER);
    if subtotal > Decimal::ZERO && subtotal < minimum {
        warnings.push(format!(
            "Subtotal €{subtotal} is below minimum order value of €{MINIMUM_ORDER}"
        ));
    }

    Quote {
        lines: priced,
        subtotal,
        discount_percent,
        discount_amount,
        total,
        total_pieces,
        total_retail,
        minimum_met: subtotal >= minimum,
        warnings,
    }
}

fn price_color_config(
    collection: &CollectionDefinition,
    config: &OrderLineColorConfig,
    warnings: &mut Vec<String>,
) -> PricedQuoteLine {
    let color = non_blank(Some(config.color.as_str()));
    let name = match &color {
        Some(color) => format!("{} {color}", collection.label),
        None => collection.label.to_string(),
    };

    let carat_index = match config.carat_index {
        None => 0,
        Some(raw) => {
            let (index, clamped) = collection.clamp_carat_index(raw);
            if clamped {
                warnings.push(format!(
                    "Carat index {raw} is out of range for {}; using {}",
                    collection.label, collection.carats[index]
                ));
            }
            index
        }
    };

    let quantity = resolve_quantity(config.quantity, &name, warnings);
    if quantity < collection.minimum_per_color {
        warnings.push(format!(
            "{name}: {quantity} pcs is below minimum per color ({})",
            collection.minimum_per_color
        ));
    }

    let unit_price = collection.wholesale_at(carat_index).unwrap_or_default();
    let unit_retail = collection.retail_at(carat_index).unwrap_or_default();
    let pieces = Decimal::from(quantity);

    PricedQuoteLine {
        product: collection.label.to_string(),
        carat: collection.carats[carat_index].to_string(),
        housing: non_blank(config.housing.as_deref()),
        shape: non_blank(config.shape.as_deref()),
        size: non_blank(config.size.as_deref()),
        color,
        quantity,
        unit_price,
        line_total: unit_price * pieces,
        unit_retail,
        retail_total: unit_retail * pieces,
    }
}

fn resolve_quantity(raw: Option<f64>, name: &str, warnings: &mut Vec<String>) -> u32 {
    let Some(value) = raw.filter(|value| value.is_finite()) else {
        warnings.push(format!("Missing quantity for {name}; using 1"));
        return 1;
    };

    if value <= 0.0 {
        warnings.push(format!("Quantity {value} for {name} is not positive; using 1"));
        return 1;
    }

    let rounded = value.round();
    if rounded < 1.0 {
        warnings
            .push(format!("Quantity {value} for {name} rounds to fewer than 1 piece; using 1"));
        return 1;
    }

    rounded.min(f64::from(u32::MAX)) as u32
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
