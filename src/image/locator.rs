//! Resolvable references to generated image bytes.
//!
//! Primary-provider images live at a remote URL. Secondary-provider images
//! arrive as raw bytes and are parked in a [`BlobStore`]; the caller receives
//! a [`BlobHandle`] that owns the entry until it is released.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const BLOB_ADDRESS_PREFIX: &str = "blob:genpix/";

/// Shared in-memory store for locally materialized images.
///
/// Cloning the store is cheap; all clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    entries: Arc<Mutex<HashMap<Uuid, Bytes>>>,
}

impl BlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` and returns the single handle that owns it.
    pub fn insert(&self, data: impl Into<Bytes>) -> BlobHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id, data.into());
        tracing::trace!(blob = %id, "materialized image blob");
        BlobHandle {
            id,
            store: self.clone(),
            released: false,
        }
    }

    /// Resolves a `blob:genpix/<uuid>` address to its bytes, if still live.
    pub fn resolve(&self, address: &str) -> Option<Bytes> {
        let id = address
            .strip_prefix(BLOB_ADDRESS_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())?;
        self.lock().get(&id).cloned()
    }

    /// Number of blobs that have not been released yet.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn get(&self, id: &Uuid) -> Option<Bytes> {
        self.lock().get(id).cloned()
    }

    fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Bytes>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owning handle to one blob in a [`BlobStore`].
///
/// Not `Clone`: exactly one owner can release the blob. Dropping an
/// unreleased handle releases it.
#[derive(Debug)]
pub struct BlobHandle {
    id: Uuid,
    store: BlobStore,
    released: bool,
}

impl BlobHandle {
    /// The resolvable address, e.g. `blob:genpix/6f1c...`.
    pub fn address(&self) -> String {
        format!("{BLOB_ADDRESS_PREFIX}{}", self.id)
    }

    /// Returns the blob bytes while the handle is live.
    pub fn bytes(&self) -> Option<Bytes> {
        self.store.get(&self.id)
    }

    /// Releases the blob. Returns `true` if this call removed the entry.
    pub fn release(mut self) -> bool {
        self.released = true;
        let removed = self.store.remove(&self.id);
        tracing::trace!(blob = %self.id, removed, "released image blob");
        removed
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.store.remove(&self.id);
        }
    }
}

/// Where the bytes of a generated image can be found.
#[derive(Debug)]
pub enum ImageLocator {
    /// Image hosted by the provider.
    Remote(String),
    /// Image bytes held in a local [`BlobStore`].
    Local(BlobHandle),
}

impl ImageLocator {
    /// Returns true if the image bytes are held locally.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Returns the locally held bytes, if any.
    pub fn local_bytes(&self) -> Option<Bytes> {
        match self {
            Self::Local(handle) => handle.bytes(),
            Self::Remote(_) => None,
        }
    }

    /// Releases local storage behind this locator. No-op for remote URLs.
    pub fn release(self) {
        if let Self::Local(handle) = self {
            handle.release();
        }
    }
}

impl fmt::Display for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(handle) => write!(f, "{}", handle.address()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_resolve() {
        let store = BlobStore::new();
        let handle = store.insert(vec![1u8, 2, 3]);

        assert!(handle.address().starts_with("blob:genpix/"));
        assert_eq!(store.resolve(&handle.address()).as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(handle.bytes().as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_addresses_are_unique() {
        let store = BlobStore::new();
        let a = store.insert(vec![0u8]);
        let b = store.insert(vec![0u8]);
        assert_ne!(a.address(), b.address());
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn test_explicit_release_removes_entry() {
        let store = BlobStore::new();
        let handle = store.insert(vec![9u8]);
        let address = handle.address();

        assert!(handle.release());
        assert_eq!(store.live_count(), 0);
        assert!(store.resolve(&address).is_none());
    }

    #[test]
    fn test_drop_releases_entry() {
        let store = BlobStore::new();
        {
            let _handle = store.insert(vec![9u8]);
            assert_eq!(store.live_count(), 1);
        }
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_release_only_affects_own_entry() {
        let store = BlobStore::new();
        let keep = store.insert(vec![1u8]);
        let gone = store.insert(vec![2u8]);

        gone.release();
        assert_eq!(store.live_count(), 1);
        assert!(keep.bytes().is_some());
    }

    #[test]
    fn test_resolve_rejects_foreign_addresses() {
        let store = BlobStore::new();
        let _handle = store.insert(vec![1u8]);
        assert!(store.resolve("https://example.com/a.png").is_none());
        assert!(store.resolve("blob:genpix/not-a-uuid").is_none());
    }

    #[test]
    fn test_locator_display_and_release() {
        let store = BlobStore::new();
        let remote = ImageLocator::Remote("https://example.com/a.png".into());
        assert_eq!(remote.to_string(), "https://example.com/a.png");
        assert!(!remote.is_local());
        assert!(remote.local_bytes().is_none());
        remote.release();

        let local = ImageLocator::Local(store.insert(vec![7u8]));
        assert!(local.to_string().starts_with("blob:genpix/"));
        assert_eq!(local.local_bytes().as_deref(), Some(&[7u8][..]));
        local.release();
        assert_eq!(store.live_count(), 0);
    }
}
