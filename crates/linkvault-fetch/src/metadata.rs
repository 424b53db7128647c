//! Website metadata extraction.
//!
//! The built-in loader does a bounded fetch of the page head and pulls
//! title, description, and preview image out of the markup. A per-domain
//! override config can replace it with an extension; a config without a
//! `loader` entry keeps the built-in but applies the config's fetch
//! settings.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

use linkvault_core::defaults::METADATA_CACHE_CAPACITY;
use linkvault_core::Result;

use crate::config::{OverrideConfig, OverrideConfigStore};
use crate::extensions::{ExtensionLoader, MetadataLoader};
use crate::fetcher::PageFetcher;

/// Metadata extracted from a web page's head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteMetadata {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview_image: Option<String>,
}

impl WebsiteMetadata {
    /// The record a page yields when nothing could be extracted.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            preview_image: None,
        }
    }
}

// =============================================================================
// BUILT-IN LOADER
// =============================================================================

/// Default metadata loader backed by a bounded fetch and HTML parsing.
///
/// Fetch failures degrade to an empty record instead of erroring: a dead
/// link can still be saved, it just gets no metadata.
#[derive(Debug, Default, Clone)]
pub struct DefaultMetadataLoader {
    fetcher: PageFetcher,
}

impl DefaultMetadataLoader {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl MetadataLoader for DefaultMetadataLoader {
    async fn load_metadata(&self, url: &str, config: &Value) -> Result<WebsiteMetadata> {
        let config = OverrideConfig::from_value(config.clone());
        let html = match self.fetcher.fetch(url, Some(&config)).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "metadata fetch failed");
                return Ok(WebsiteMetadata::empty(url));
            }
        };
        Ok(parse_page_metadata(url, &html))
    }
}

/// Extract metadata from page markup. Synchronous on purpose: the parsed
/// document is not `Send` and must not live across an await point.
fn parse_page_metadata(url: &str, html: &str) -> WebsiteMetadata {
    let document = Html::parse_document(html);

    let title = select_text(&document, "title")
        .or_else(|| select_attr(&document, r#"meta[property="og:title"]"#, "content"));

    let description = select_attr(&document, r#"meta[name="description"]"#, "content")
        .or_else(|| select_attr(&document, r#"meta[property="og:description"]"#, "content"));

    let preview_image = select_attr(&document, r#"meta[property="og:image"]"#, "content")
        .or_else(|| select_attr(&document, r#"meta[name="og:image"]"#, "content"))
        .or_else(|| select_attr(&document, r#"link[rel="preload"][as="image"]"#, "href"))
        .and_then(|image| absolutize(url, &image));

    WebsiteMetadata {
        url: url.to_string(),
        title,
        description,
        preview_image,
    }
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let value = document
        .select(&selector)
        .next()?
        .value()
        .attr(attr)?
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Resolve a possibly relative image reference against the page url.
fn absolutize(page_url: &str, image: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    base.join(image).ok().map(|u| u.to_string())
}

// =============================================================================
// DISPATCHING SERVICE
// =============================================================================

/// Loads website metadata, dispatching per domain between the built-in
/// loader and extensions, with a small cache for the common configless path.
pub struct MetadataService {
    overrides: Arc<OverrideConfigStore>,
    extensions: ExtensionLoader,
    default_loader: DefaultMetadataLoader,
    cache: Mutex<VecDeque<(String, WebsiteMetadata)>>,
}

impl MetadataService {
    pub fn new(overrides: Arc<OverrideConfigStore>) -> Self {
        Self {
            overrides,
            extensions: ExtensionLoader::new(),
            default_loader: DefaultMetadataLoader::default(),
            cache: Mutex::new(VecDeque::with_capacity(METADATA_CACHE_CAPACITY)),
        }
    }

    /// Load metadata for `url`.
    ///
    /// With an override config: a `loader` entry dispatches to that
    /// extension (its errors propagate), otherwise the built-in runs with
    /// the config's fetch settings; these paths are never cached, since the
    /// config file can change under us. Without a config, the built-in runs
    /// with defaults and the result is cached.
    pub async fn load_website_metadata(
        &self,
        url: &str,
        ignore_cache: bool,
    ) -> Result<WebsiteMetadata> {
        if let Some(config) = self.overrides.resolve(url) {
            if let Some(loader_path) = config.loader() {
                if let Some(module) = self.extensions.load(&loader_path) {
                    return module.load_metadata(url, config.as_value()).await;
                }
                warn!(url, extension_path = %loader_path.display(), "metadata extension missing, using built-in");
            }
            return self.default_loader.load_metadata(url, config.as_value()).await;
        }

        if !ignore_cache {
            if let Some(hit) = self.cache_get(url) {
                debug!(url, cache_hit = true, "metadata served from cache");
                return Ok(hit);
            }
        }

        let metadata = self
            .default_loader
            .load_metadata(url, &Value::Null)
            .await?;
        self.cache_put(url, metadata.clone());
        Ok(metadata)
    }

    fn cache_get(&self, url: &str) -> Option<WebsiteMetadata> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .find(|(cached_url, _)| cached_url == url)
            .map(|(_, metadata)| metadata.clone())
    }

    fn cache_put(&self, url: &str, metadata: WebsiteMetadata) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|(cached_url, _)| cached_url != url);
        if cache.len() >= METADATA_CACHE_CAPACITY {
            cache.pop_front();
        }
        cache.push_back((url.to_string(), metadata));
    }
}
