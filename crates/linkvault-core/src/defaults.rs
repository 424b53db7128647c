//! Centralized default constants for linkvault.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// PAGE FETCHING
// =============================================================================

/// Default User-Agent header sent with page fetches. A browser-like value
/// avoids the bot blocking some sites apply to obviously synthetic agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default Accept header, matching what a browser sends for page loads.
pub const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Do-Not-Track flag sent alongside the browser-like User-Agent.
pub const DNT: &str = "1";

/// Upgrade-Insecure-Requests flag sent alongside the browser-like
/// User-Agent.
pub const UPGRADE_INSECURE_REQUESTS: &str = "1";

/// Request timeout for bounded (streaming) page fetches, in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Request timeout for full-page fetches, in seconds. Longer than the bounded
/// variant because the whole document is downloaded.
pub const FULL_FETCH_TIMEOUT_SECS: u64 = 30;

/// Size of each streamed read, in bytes (50 KiB).
pub const FETCH_CHUNK_SIZE: usize = 50 * 1024;

/// Hard ceiling on buffered page content, in bytes (5000 KiB). Reading stops
/// once the buffer exceeds this, regardless of response size.
pub const MAX_CONTENT_LIMIT: usize = 5000 * 1024;

// =============================================================================
// METADATA
// =============================================================================

/// Number of recently scraped URLs whose metadata is kept cached. Avoids
/// scraping again when saving a bookmark whose form preview already scraped
/// the page.
pub const METADATA_CACHE_CAPACITY: usize = 10;

// =============================================================================
// EXTENSIONS & SNAPSHOTS
// =============================================================================

/// Timeout for an extension executable invocation, in seconds.
pub const EXTENSION_CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for the built-in snapshot capture command, in seconds.
pub const SNAPSHOT_CMD_TIMEOUT_SECS: u64 = 60;

/// Command the built-in snapshot processor shells out to.
pub const SNAPSHOT_COMMAND: &str = "single-file";
