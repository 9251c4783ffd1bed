use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{FolderDirectory, FolderError, FolderTree, GetFoldersQuery};
use crate::accesscontrol::SignedInUser;
use crate::context::{RequestContext, RequestId};

/// Lifetime of a cached tree. Short on purpose: entries exist for reuse
/// within one request, and any survival past it is bounded by this.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// How often [`ExpiringStore::spawn_sweeper`] drops expired entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent map whose entries disappear after a fixed TTL.
pub struct ExpiringStore<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Unexpired value for `key`. Expired entries read as absent and are left
    /// for the sweeper.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Last writer wins
    pub async fn insert(&self, key: K, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drops expired entries and returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Periodic sweep on the current tokio runtime. Abort the handle to stop.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired().await;
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

/// Identifies one cached tree. Org and user are part of the key so a shared
/// request id can never leak a tree across identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub org_id: i64,
    pub user_uid: String,
    pub request_id: RequestId,
}

impl CacheKey {
    pub fn new(user: &SignedInUser, request_id: RequestId) -> Self {
        Self {
            org_id: user.org_id,
            user_uid: user.unique_id().to_string(),
            request_id,
        }
    }
}

/// Memoizes one [`FolderTree`] per (org, user, request) so permission checks
/// over many elements list folders once.
///
/// Built inside a tokio runtime, the cache sweeps expired trees every
/// [`SWEEP_INTERVAL`] until it is dropped.
pub struct FolderTreeCache {
    store: Arc<ExpiringStore<CacheKey, Arc<FolderTree>>>,
    directory: RwLock<Arc<dyn FolderDirectory>>,
    sweeper: Option<JoinHandle<()>>,
}

impl FolderTreeCache {
    pub fn new(directory: Arc<dyn FolderDirectory>) -> Self {
        let store = Arc::new(ExpiringStore::new(CACHE_TTL));
        let sweeper = Handle::try_current()
            .ok()
            .map(|_| store.spawn_sweeper(SWEEP_INTERVAL));
        Self {
            store,
            directory: RwLock::new(directory),
            sweeper,
        }
    }

    pub async fn get(&self, ctx: &RequestContext, user: &SignedInUser) -> Result<Arc<FolderTree>, FolderError> {
        let key = ctx.request_id().cloned().map(|id| CacheKey::new(user, id));

        if let Some(key) = &key {
            if let Some(tree) = self.store.get(key).await {
                debug!(org_id = user.org_id, user = %user.uid, request_id = %key.request_id, "folder tree cache hit");
                return Ok(tree);
            }
        }

        ctx.ensure_active()?;

        let directory = Arc::clone(&*self.directory.read().await);
        let query = GetFoldersQuery {
            org_id: user.org_id,
            user,
        };
        let folders = directory
            .get_folders(ctx, query)
            .await
            .map_err(|e| FolderError::ListingFailed(Box::new(e)))?;

        let tree = Arc::new(FolderTree::new(user.org_id, folders));
        debug!(org_id = user.org_id, user = %user.uid, folders = tree.len(), cached = key.is_some(), "built folder tree");

        if let Some(key) = key {
            self.store.insert(key, Arc::clone(&tree)).await;
        }
        Ok(tree)
    }

    /// Swap the folder source and forget every cached tree.
    pub async fn replace_directory(&self, directory: Arc<dyn FolderDirectory>) {
        *self.directory.write().await = directory;
        self.store.clear().await;
    }

    pub async fn cached_trees(&self) -> usize {
        self.store.len().await
    }
}

impl Drop for FolderTreeCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
