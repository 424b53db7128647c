//! # linkvault-fetch
//!
//! Website fetching for the linkvault bookmarking service: bounded page
//! fetching, metadata extraction, snapshots, per-domain override
//! configuration, and hot-reloaded extension executables.

pub mod config;
pub mod extensions;
pub mod fetcher;
pub mod metadata;
pub mod settings;
pub mod snapshot;

// Re-export commonly used types at crate root
pub use config::{FsModTime, ModTimeSource, OverrideConfig, OverrideConfigStore};
pub use extensions::{ExtensionLoader, ExtensionModule, MetadataLoader, SnapshotProcessor};
pub use fetcher::{FetchOptions, PageFetcher};
pub use metadata::{DefaultMetadataLoader, MetadataService, WebsiteMetadata};
pub use settings::FetchSettings;
pub use snapshot::{SingleFileProcessor, SnapshotService};
