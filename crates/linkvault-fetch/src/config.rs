//! Per-domain override configuration.
//!
//! A single JSON file maps domain keys to override objects controlling how
//! pages from that domain are fetched and processed. The file is parsed at
//! most once per modification: the parsed document is cached keyed by the
//! file's mtime, so edits take effect without a restart and unchanged files
//! cost one stat per lookup.
//!
//! Key matching: exact host first, then `*.suffix` wildcard keys in
//! declaration order (first match wins). A string value is an alias to
//! another key; aliases are chased with a cycle guard, and a cycle or a
//! dangling alias stops at the last value reached.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use url::Url;

// =============================================================================
// MODIFICATION TIME SOURCE
// =============================================================================

/// Source of file modification times.
///
/// Injectable so cache invalidation can be driven deterministically in tests
/// without sleeping for filesystem timestamp granularity.
pub trait ModTimeSource: Send + Sync {
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Filesystem-backed [`ModTimeSource`].
#[derive(Debug, Default)]
pub struct FsModTime;

impl ModTimeSource for FsModTime {
    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Parse-failure state is cached just like a successful parse: a broken file
/// is warn-logged once and lookups return nothing until the file changes.
#[derive(Debug, Clone)]
enum CacheState {
    Empty,
    Absent,
    ParseError(SystemTime),
    Loaded {
        mtime: SystemTime,
        map: Arc<Map<String, Value>>,
    },
}

/// Caching store over one override config file.
///
/// Shared across tasks behind `Arc`; racing reloads converge because the
/// loaded value is deterministic per (path, mtime).
pub struct OverrideConfigStore {
    path: PathBuf,
    mtimes: Arc<dyn ModTimeSource>,
    state: RwLock<CacheState>,
    parse_count: AtomicU64,
}

impl OverrideConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_mod_time_source(path, Arc::new(FsModTime))
    }

    pub fn with_mod_time_source(path: impl Into<PathBuf>, mtimes: Arc<dyn ModTimeSource>) -> Self {
        Self {
            path: path.into(),
            mtimes,
            state: RwLock::new(CacheState::Empty),
            parse_count: AtomicU64::new(0),
        }
    }

    /// Override config for the domain of `url`, if any.
    pub fn resolve(&self, url: &str) -> Option<OverrideConfig> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.resolve_domain(host)
    }

    /// Override config for a bare host.
    pub fn resolve_domain(&self, host: &str) -> Option<OverrideConfig> {
        let map = self.snapshot()?;
        let mut value = lookup(&map, host)?;

        // Chase string aliases; stop at the last value reached on a cycle
        // or a dangling target.
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(host.to_string());
        while let Value::String(alias) = value {
            if !visited.insert(alias.clone()) {
                debug!(domain = host, alias = %alias, "override config alias cycle");
                break;
            }
            match lookup(&map, alias) {
                Some(next) => value = next,
                None => break,
            }
        }
        Some(OverrideConfig {
            value: value.clone(),
        })
    }

    /// Number of file parses performed so far. Observable so tests can
    /// assert cache hits and invalidation.
    pub fn parse_count(&self) -> u64 {
        self.parse_count.load(Ordering::Relaxed)
    }

    /// Current parsed document, reloading if the file changed.
    fn snapshot(&self) -> Option<Arc<Map<String, Value>>> {
        let mtime = match self.mtimes.modified(&self.path) {
            Ok(mtime) => mtime,
            Err(_) => {
                let mut state = self.write_state();
                *state = CacheState::Absent;
                return None;
            }
        };

        {
            let state = self.read_state();
            match &*state {
                CacheState::Loaded { mtime: cached, map } if *cached == mtime => {
                    return Some(Arc::clone(map));
                }
                CacheState::ParseError(cached) if *cached == mtime => return None,
                _ => {}
            }
        }

        self.reload(mtime)
    }

    fn reload(&self, mtime: SystemTime) -> Option<Arc<Map<String, Value>>> {
        self.parse_count.fetch_add(1, Ordering::Relaxed);
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(config_path = %self.path.display(), error = %e, "failed to read override config");
                let mut state = self.write_state();
                *state = CacheState::Absent;
                return None;
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut map)) => {
                let base = self.path.parent().unwrap_or_else(|| Path::new("."));
                for value in map.values_mut() {
                    rewrite_relative_paths(value, base);
                }
                debug!(config_path = %self.path.display(), domains = map.len(), "loaded override config");
                let map = Arc::new(map);
                let mut state = self.write_state();
                *state = CacheState::Loaded {
                    mtime,
                    map: Arc::clone(&map),
                };
                Some(map)
            }
            Ok(_) => {
                warn!(config_path = %self.path.display(), "override config root is not an object");
                let mut state = self.write_state();
                *state = CacheState::ParseError(mtime);
                None
            }
            Err(e) => {
                warn!(config_path = %self.path.display(), error = %e, "failed to parse override config");
                let mut state = self.write_state();
                *state = CacheState::ParseError(mtime);
                None
            }
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exact key match, else the first declared `*.suffix` wildcard whose suffix
/// the host ends with.
fn lookup<'a>(map: &'a Map<String, Value>, host: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(host) {
        return Some(value);
    }
    map.iter().find_map(|(key, value)| {
        key.strip_prefix('*')
            .filter(|suffix| host.ends_with(suffix))
            .map(|_| value)
    })
}

/// Rewrite every string that starts with `./` or `../` into an absolute path
/// anchored at the config file's directory. Runs once at load time,
/// recursively over objects and arrays.
fn rewrite_relative_paths(value: &mut Value, base: &Path) {
    match value {
        Value::String(s) => {
            if s.starts_with("./") || s.starts_with("../") {
                *s = normalize(base.join(s.as_str()))
                    .to_string_lossy()
                    .into_owned();
            }
        }
        Value::Object(map) => {
            for entry in map.values_mut() {
                rewrite_relative_paths(entry, base);
            }
        }
        Value::Array(items) => {
            for entry in items {
                rewrite_relative_paths(entry, base);
            }
        }
        _ => {}
    }
}

/// Lexically collapse `.` and `..` components so rewritten paths come out
/// clean. Purely textual: nothing is resolved against the filesystem, so
/// missing targets still produce a usable path for later error reporting.
fn normalize(path: PathBuf) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// RESOLVED CONFIG
// =============================================================================

/// The override value matched for a domain, with typed accessors.
///
/// Every accessor returns `None` (or empty) when the key is missing or the
/// wrapped value is a bare string, i.e. an alias whose target never
/// resolved to an object.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideConfig {
    value: Value,
}

impl OverrideConfig {
    /// Wrap a raw JSON value, as an extension or test would supply it.
    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.value.as_object()?.get(key)
    }

    /// Path of the metadata loader extension, absolute after load-time
    /// rewriting.
    pub fn loader(&self) -> Option<PathBuf> {
        self.get("loader")?.as_str().map(PathBuf::from)
    }

    /// Path of the snapshot processor extension.
    pub fn processor(&self) -> Option<PathBuf> {
        self.get("processor")?.as_str().map(PathBuf::from)
    }

    /// Extra request headers. May include a `Cookie` header, which the
    /// fetcher parses into its cookie jar instead of sending raw.
    pub fn headers(&self) -> HashMap<String, String> {
        self.get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.get("timeout")?.as_u64().map(Duration::from_secs)
    }

    pub fn proxy(&self) -> Option<String> {
        self.get("proxy")?.as_str().map(str::to_string)
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.get("chunk_size")?.as_u64().map(|n| n as usize)
    }

    pub fn max_content_limit(&self) -> Option<usize> {
        self.get("max_content_limit")?.as_u64().map(|n| n as usize)
    }

    /// The raw JSON value, passed to extensions on stdin.
    pub fn as_value(&self) -> &Value {
        &self.value
    }
}
