pub mod catalog;
pub mod pricing;
pub mod resolver;

pub use catalog::{find_collection, Catalog};
pub use pricing::{
    calculate_quote, calculate_quote_with_catalog, DeterministicQuoteEngine, QuoteEngine,
    DISCOUNT_PERCENT, DISCOUNT_THRESHOLD, MINIMUM_ORDER,
};
pub use resolver::{resolve_carat_index, resolve_collection, CatalogResolver};
