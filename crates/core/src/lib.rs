//! Pricing core for the trade-fair order builder: the static jewelry catalog,
//! the quote engine, and the resolver that maps free text back onto catalog
//! entries.

pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;

pub use cpq::{
    calculate_quote, find_collection, resolve_carat_index, resolve_collection, Catalog,
    CatalogResolver, DeterministicQuoteEngine, QuoteEngine,
};
pub use domain::collection::{CollectionDefinition, ColorEntry, CordFamily, HousingTaxonomy};
pub use domain::order::{OrderLine, OrderLineColorConfig};
pub use domain::quote::{PricedQuoteLine, Quote};
pub use errors::{ApplicationError, DomainError, InterfaceError};
