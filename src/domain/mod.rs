//! Domain module - Core business entities and errors
//!
//! Contains the marketplace registry, listing and comparison entities,
//! and the error taxonomy shared across the engine.

pub mod comparison;
pub mod error;
pub mod listing;
pub mod marketplace;

pub use comparison::{CompareOptions, ComparisonResult, RankedAlternative};
pub use error::{CompareError, ExtractionError, FetchError};
pub use listing::{Document, Listing, ProductId};
pub use marketplace::{CurrencyCode, Marketplace, MarketplaceId, MarketplaceRegistry};
