//! Search bundles: named, reusable sets of search parameters.
//!
//! A bundle stores a partial [`SearchParams`] record together with ordering
//! and presentation flags. Attaching a bundle to a search makes its stored
//! parameters the floor of the resolution chain (see
//! [`SearchSpecification::resolve`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::search::{SearchParams, SearchSpecification};

/// A named, owner-scoped set of stored search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBundle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Position within the owner's bundle list; lower sorts first.
    pub order: i32,
    /// Folders group other bundles in listings and carry no parameters of
    /// their own beyond what is stored.
    pub is_folder: bool,
    /// Whether listings show the match count next to the name.
    pub show_count: bool,
    pub search_params: SearchParams,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl SearchBundle {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            order: 0,
            is_folder: false,
            show_count: true,
            search_params: SearchParams::default(),
            date_created: now,
            date_modified: now,
        }
    }

    /// The specification this bundle produces on its own, with no explicit
    /// parameters and no preferences.
    pub fn to_specification(&self) -> SearchSpecification {
        SearchSpecification::resolve(&SearchParams::default(), Some(self), None)
    }
}

// =============================================================================
// REPOSITORY
// =============================================================================

/// Owner-scoped bundle storage.
///
/// Every operation takes the owner id; a bundle belonging to another owner is
/// indistinguishable from a missing one. Deleting a bundle detaches it from
/// any saved link that references it — links are never deleted with the
/// bundle.
#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn create(&self, bundle: SearchBundle) -> Result<SearchBundle>;

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<SearchBundle>>;

    /// All bundles for the owner, ordered by `order` then name.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<SearchBundle>>;

    async fn rename(&self, owner_id: Uuid, id: Uuid, name: &str) -> Result<SearchBundle>;

    /// Reassign `order` to match the position of each id in `ids`. Ids not
    /// owned by `owner_id` are ignored.
    async fn reorder(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<()>;

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()>;
}

/// In-memory [`BundleRepository`], used in tests and as a reference for the
/// trait's contract.
#[derive(Debug, Default)]
pub struct InMemoryBundleRepository {
    bundles: RwLock<HashMap<Uuid, SearchBundle>>,
}

impl InMemoryBundleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BundleRepository for InMemoryBundleRepository {
    async fn create(&self, bundle: SearchBundle) -> Result<SearchBundle> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        bundles.insert(bundle.id, bundle.clone());
        Ok(bundle)
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<SearchBundle>> {
        let bundles = self
            .bundles
            .read()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        Ok(bundles
            .get(&id)
            .filter(|b| b.owner_id == owner_id)
            .cloned())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<SearchBundle>> {
        let bundles = self
            .bundles
            .read()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        let mut owned: Vec<SearchBundle> = bundles
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(owned)
    }

    async fn rename(&self, owner_id: Uuid, id: Uuid, name: &str) -> Result<SearchBundle> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        let bundle = bundles
            .get_mut(&id)
            .filter(|b| b.owner_id == owner_id)
            .ok_or(Error::BundleNotFound(id))?;
        bundle.name = name.to_string();
        bundle.date_modified = Utc::now();
        Ok(bundle.clone())
    }

    async fn reorder(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<()> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        for (position, id) in ids.iter().enumerate() {
            if let Some(bundle) = bundles.get_mut(id).filter(|b| b.owner_id == owner_id) {
                bundle.order = position as i32;
                bundle.date_modified = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| Error::Internal("bundle store lock poisoned".to_string()))?;
        match bundles.get(&id) {
            Some(b) if b.owner_id == owner_id => {
                bundles.remove(&id);
                Ok(())
            }
            _ => Err(Error::BundleNotFound(id)),
        }
    }
}
