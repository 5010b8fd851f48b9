//! Expands AI-proposed lines into canonical order lines.
//!
//! Lines are grouped by the collection they resolve to, in order of first
//! appearance, because the model splits and merges lines differently from one
//! turn to the next. Each color becomes its own config.

use fairquote_core::cpq::resolver::CatalogResolver;
use fairquote_core::domain::collection::CollectionDefinition;
use fairquote_core::domain::order::{OrderLine, OrderLineColorConfig};
use serde::Serialize;
use tracing::debug;

use crate::reply::{QuotePayload, SuggestedLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownProduct,
    NoColors,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedLine {
    pub product: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub lines: Vec<OrderLine>,
    pub unresolved: Vec<UnresolvedLine>,
}

impl Reconciliation {
    pub fn color_count(&self) -> usize {
        self.lines.iter().map(OrderLine::color_count).sum()
    }
}

pub fn reconcile(payload: &QuotePayload, resolver: &CatalogResolver) -> Reconciliation {
    let mut result = Reconciliation::default();

    for suggestion in &payload.lines {
        let Some(collection) = resolver.resolve_definition(&suggestion.product) else {
            debug!(
                event_name = "agent.reconcile.skipped",
                product = %suggestion.product,
                reason = "unknown_product",
                "suggested product did not resolve to a collection"
            );
            result.unresolved.push(UnresolvedLine {
                product: suggestion.product.clone(),
                reason: SkipReason::UnknownProduct,
            });
            continue;
        };

        if suggestion.colors.is_empty() {
            debug!(
                event_name = "agent.reconcile.skipped",
                product = %suggestion.product,
                reason = "no_colors",
                "suggested line named no colors"
            );
            result.unresolved.push(UnresolvedLine {
                product: suggestion.product.clone(),
                reason: SkipReason::NoColors,
            });
            continue;
        }

        let configs = expand_colors(resolver, collection, suggestion);
        match result.lines.iter_mut().find(|line| line.collection_id == collection.id) {
            Some(line) => line.colors.extend(configs),
            None => result.lines.push(OrderLine::new(collection.id, configs)),
        }
    }

    result
}

fn expand_colors(
    resolver: &CatalogResolver,
    collection: &'static CollectionDefinition,
    suggestion: &SuggestedLine,
) -> Vec<OrderLineColorConfig> {
    let id = collection.id;
    let carat_index = suggestion
        .carat
        .as_deref()
        .map(|carat| resolver.resolve_carat_index(id, carat) as i64);
    let housing = canonical(suggestion.housing.as_deref(), |t| resolver.resolve_housing(id, t));
    let housing_type =
        canonical(suggestion.housing_type.as_deref(), |t| resolver.resolve_housing_type(id, t));
    let attachment =
        canonical(suggestion.attachment.as_deref(), |t| resolver.resolve_attachment(id, t));
    let shape = canonical(suggestion.shape.as_deref(), |t| resolver.resolve_shape(id, t));
    let size = canonical(suggestion.size.as_deref(), |t| resolver.resolve_size(id, t));
    let minimum = f64::from(collection.minimum_per_color);

    suggestion
        .colors
        .iter()
        .map(|color| OrderLineColorConfig {
            carat_index,
            housing: housing.clone(),
            housing_type: housing_type.clone(),
            attachment: attachment.clone(),
            shape: shape.clone(),
            size: size.clone(),
            color: resolver
                .resolve_color(id, &color.name)
                .map(str::to_string)
                .unwrap_or_else(|| color.name.clone()),
            quantity: Some(color.quantity.or(suggestion.quantity).unwrap_or(minimum)),
        })
        .collect()
}

/// Canonical option text, or `None` when the collection has no such option.
fn canonical(
    text: Option<&str>,
    resolve: impl Fn(&str) -> Option<&'static str>,
) -> Option<String> {
    text.and_then(resolve).map(str::to_string)
}
