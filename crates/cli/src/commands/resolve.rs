use fairquote_core::cpq::resolver::CatalogResolver;
use fairquote_core::errors::DomainError;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_INPUT};

#[derive(Debug, Serialize)]
struct Resolution {
    collection_id: &'static str,
    label: &'static str,
    minimum_per_color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    carat: Option<CaratResolution>,
}

#[derive(Debug, Serialize)]
struct CaratResolution {
    requested: String,
    index: usize,
    label: &'static str,
    price: u32,
    /// False when the text matched no carat and the first tier was used.
    matched: bool,
}

pub fn run(product: &str, carat: Option<&str>) -> CommandResult {
    let resolver = CatalogResolver::default();
    let Some(collection) = resolver.resolve_definition(product) else {
        return CommandResult::failure(
            "resolve",
            "unknown_collection",
            DomainError::UnknownCollection(product.to_string()).to_string(),
            EXIT_INPUT,
        );
    };

    let carat = carat.and_then(|requested| {
        let matched = resolver.match_carat(collection.id, requested);
        let index = matched.unwrap_or(0);
        let label = collection.carat_label(index)?;
        Some(CaratResolution {
            requested: requested.to_string(),
            index,
            label,
            price: collection.price_at(index)?,
            matched: matched.is_some(),
        })
    });

    let message = match &carat {
        Some(carat) => format!("{} {} at €{}", collection.label, carat.label, carat.price),
        None => collection.label.to_string(),
    };
    let resolution = Resolution {
        collection_id: collection.id,
        label: collection.label,
        minimum_per_color: collection.minimum_per_color,
        carat,
    };
    CommandResult::success_with_data("resolve", message, &resolution)
}
