//! # linkvault-core
//!
//! Core types and search semantics for the linkvault bookmarking service.
//!
//! This crate provides the search parameter model, the precedence resolver,
//! saved-search bundles, and the date utilities that the other linkvault
//! crates depend on.

pub mod bundle;
pub mod dates;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod search;

// Re-export commonly used types at crate root
pub use bundle::{BundleRepository, InMemoryBundleRepository, SearchBundle};
pub use dates::{parse_timestamp, resolve_relative_range, split_relative_token, RelativeUnit};
pub use error::{Error, Result};
pub use search::{
    DateFilterField, DateFilterMode, SearchField, SearchParams, SearchSpecification, SortOrder,
    TriState,
};
