//! Structured logging schema and field name constants for linkvault.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (config reload, extension reload) |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-chunk iteration, high-volume data |

use tracing_subscriber::EnvFilter;

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "search", "config", "fetch", "extension", "snapshot"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "resolve", "fetch", "load_metadata", "create_snapshot"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// URL being fetched or resolved.
pub const URL: &str = "url";

/// Request host extracted from a URL.
pub const DOMAIN: &str = "domain";

/// Path of an override config file.
pub const CONFIG_PATH: &str = "config_path";

/// Path of a loaded extension executable.
pub const EXTENSION_PATH: &str = "extension_path";

/// Bundle UUID involved in a search resolution.
pub const BUNDLE_ID: &str = "bundle_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Bytes accumulated by a bounded fetch.
pub const BYTES_READ: &str = "bytes_read";

/// Number of chunks read by a bounded fetch.
pub const CHUNK_COUNT: &str = "chunk_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether a cached parse was reused.
pub const CACHE_HIT: &str = "cache_hit";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults to `info` for linkvault crates. Intended to
/// be called once by the hosting binary; calling it twice is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,linkvault_core=info,linkvault_fetch=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
