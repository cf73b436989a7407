//! Storage for resolved and in-flight asset requests.
//!
//! Entries are shared futures rather than values: the first request for a key
//! inserts its pending resolution and every later request for the same key
//! awaits that same future, so a key is fetched at most once while cached.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use futures::future::{BoxFuture, Shared};
use lru::LruCache;

use super::{Asset, AssetKey};
use crate::Result;

/// Outcome of one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub asset: Asset,
    /// False when part of the request failed transiently; such results are
    /// handed to current waiters but not kept
    pub complete: bool,
}

/// An in-flight or settled resolution shared by every waiter of a key
pub type PendingAsset = Shared<BoxFuture<'static, Result<Resolution>>>;

/// Pluggable storage policy for the asset resolver
pub trait AssetCache: Send + Sync {
    /// Return the entry for `key`, inserting `make()` when there is none.
    /// The flag is true when this call inserted the entry.
    fn get_or_insert_with(
        &self,
        key: &AssetKey,
        make: &mut dyn FnMut() -> PendingAsset,
    ) -> (PendingAsset, bool);

    /// Remove the entry for `key` if it is still `pending`
    fn remove_if_same(&self, key: &AssetKey, pending: &PendingAsset);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cache that never evicts; entries live as long as the cache
#[derive(Default)]
pub struct UnboundedCache {
    entries: Mutex<HashMap<AssetKey, PendingAsset>>,
}

impl UnboundedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetCache for UnboundedCache {
    fn get_or_insert_with(
        &self,
        key: &AssetKey,
        make: &mut dyn FnMut() -> PendingAsset,
    ) -> (PendingAsset, bool) {
        let mut entries = lock(&self.entries);
        if let Some(pending) = entries.get(key) {
            return (pending.clone(), false);
        }
        let pending = make();
        entries.insert(key.clone(), pending.clone());
        (pending, true)
    }

    fn remove_if_same(&self, key: &AssetKey, pending: &PendingAsset) {
        let mut entries = lock(&self.entries);
        if entries.get(key).is_some_and(|p| p.ptr_eq(pending)) {
            entries.remove(key);
        }
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

/// Bounded cache evicting the least recently requested key
pub struct LruAssetCache {
    entries: Mutex<LruCache<AssetKey, PendingAsset>>,
}

impl LruAssetCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl AssetCache for LruAssetCache {
    fn get_or_insert_with(
        &self,
        key: &AssetKey,
        make: &mut dyn FnMut() -> PendingAsset,
    ) -> (PendingAsset, bool) {
        let mut entries = lock(&self.entries);
        if let Some(pending) = entries.get(key) {
            return (pending.clone(), false);
        }
        let pending = make();
        entries.put(key.clone(), pending.clone());
        (pending, true)
    }

    fn remove_if_same(&self, key: &AssetKey, pending: &PendingAsset) {
        let mut entries = lock(&self.entries);
        if entries.peek(key).is_some_and(|p| p.ptr_eq(pending)) {
            entries.pop(key);
        }
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emoji::EmojiStyle;
    use futures::FutureExt;

    fn ready(text: &str) -> PendingAsset {
        let asset = Asset::Image(text.to_string());
        async move { Ok(Resolution { asset, complete: true }) }
            .boxed()
            .shared()
    }

    fn key(text: &str) -> AssetKey {
        AssetKey::new(EmojiStyle::Twemoji, "emoji", text)
    }

    #[test]
    fn unbounded_inserts_once() {
        let cache = UnboundedCache::new();
        let (_, inserted) = cache.get_or_insert_with(&key("a"), &mut || ready("1"));
        assert!(inserted);
        let (_, inserted) = cache.get_or_insert_with(&key("a"), &mut || ready("2"));
        assert!(!inserted);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_only_matching_entry() {
        let cache = UnboundedCache::new();
        let (first, _) = cache.get_or_insert_with(&key("a"), &mut || ready("1"));
        let stranger = ready("x");
        cache.remove_if_same(&key("a"), &stranger);
        assert_eq!(cache.len(), 1);
        cache.remove_if_same(&key("a"), &first);
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_evicts_oldest() {
        let cache = LruAssetCache::new(NonZeroUsize::new(2).unwrap());
        cache.get_or_insert_with(&key("a"), &mut || ready("a"));
        cache.get_or_insert_with(&key("b"), &mut || ready("b"));
        // touch "a" so "b" becomes the eviction candidate
        cache.get_or_insert_with(&key("a"), &mut || ready("a2"));
        cache.get_or_insert_with(&key("c"), &mut || ready("c"));
        assert_eq!(cache.len(), 2);
        let (_, inserted) = cache.get_or_insert_with(&key("b"), &mut || ready("b2"));
        assert!(inserted);
        let (_, inserted) = cache.get_or_insert_with(&key("c"), &mut || ready("c2"));
        assert!(!inserted);
    }

    #[tokio::test]
    async fn shared_entry_yields_same_value() {
        let cache = UnboundedCache::new();
        let (p1, _) = cache.get_or_insert_with(&key("a"), &mut || ready("v"));
        let (p2, _) = cache.get_or_insert_with(&key("a"), &mut || ready("other"));
        assert_eq!(p1.await.unwrap(), p2.await.unwrap());
    }
}
