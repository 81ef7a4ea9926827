use std::collections::HashMap;
use std::path::PathBuf;

use retrova_core::{RetrovaError, RetrovaResult};
use tokio::sync::RwLock;
use tracing::info;

use crate::collection::Collection;
use crate::persist::{self, Manifest, PointLog};

/// The storage client: a registry mapping collection names to their
/// definitions and state.
///
/// Constructed explicitly (in-memory or backed by a directory of JSONL
/// files) and injected into the components that need it. Collections are
/// created lazily on first use; once created, a collection's dimension is
/// immutable for its lifetime.
pub struct VectorStore {
    collections: RwLock<HashMap<String, Collection>>,
    root: Option<PathBuf>,
}

impl VectorStore {
    /// Creates a store with no persistence. All state lives in memory.
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            root: None,
        }
    }

    /// Opens a store rooted at `dir`, creating the directory if needed and
    /// loading every collection listed in the manifest.
    pub async fn open(dir: impl Into<PathBuf>) -> RetrovaResult<Self> {
        let root = dir.into();
        tokio::fs::create_dir_all(&root).await?;

        let manifest = persist::load_manifest(&root).await?;
        let mut collections = HashMap::new();
        for (name, dimension) in &manifest {
            let log = PointLog::new(&root, name);
            let points = log.load().await?;
            let collection = Collection::new(name.clone(), *dimension, Some(log));
            collection.load(points).await;
            info!(
                collection = %name,
                dimension,
                points = collection.count().await,
                "loaded collection"
            );
            collections.insert(name.clone(), collection);
        }

        Ok(Self {
            collections: RwLock::new(collections),
            root: Some(root),
        })
    }

    /// Returns the existing collection, or atomically defines a new one with
    /// the given dimension.
    ///
    /// Safe under concurrent first-time creation: racing callers all resolve
    /// to the single definition the winner created. An existing collection
    /// with a different dimension is a contract violation
    /// ([`DimensionMismatch`](RetrovaError::DimensionMismatch)), never a
    /// silent reconciliation.
    pub async fn get_or_create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> RetrovaResult<Collection> {
        if let Some(existing) = self.collections.read().await.get(name) {
            return check_dimension(existing, dimension).map(|()| existing.clone());
        }

        let mut collections = self.collections.write().await;
        // A racing creator may have won between the two locks.
        if let Some(existing) = collections.get(name) {
            return check_dimension(existing, dimension).map(|()| existing.clone());
        }

        info!(collection = %name, dimension, "creating collection");
        let log = self.root.as_deref().map(|root| PointLog::new(root, name));
        let collection = Collection::new(name, dimension, log);
        collections.insert(name.to_string(), collection.clone());

        if let Some(root) = &self.root {
            let manifest: Manifest = collections
                .iter()
                .map(|(n, c)| (n.clone(), c.dimension()))
                .collect();
            persist::store_manifest(root, &manifest).await?;
        }

        Ok(collection)
    }

    /// Fetches an existing collection, failing with
    /// [`CollectionNotFound`](RetrovaError::CollectionNotFound) when absent.
    pub async fn get_collection(&self, name: &str) -> RetrovaResult<Collection> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RetrovaError::CollectionNotFound(name.to_string()))
    }

    /// Names of every defined collection, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

fn check_dimension(existing: &Collection, requested: usize) -> RetrovaResult<()> {
    if existing.dimension() != requested {
        return Err(RetrovaError::DimensionMismatch {
            collection: existing.name().to_string(),
            expected: existing.dimension(),
            actual: requested,
        });
    }
    Ok(())
}
