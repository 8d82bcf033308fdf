//! Blob store contract and the in-memory reference store.
//!
//! The store is an append-only sink with random-access read. Newly stored
//! blobs are announced to subscribers over a channel; the subscriber side is
//! expected to pump deliveries into the indexer's serialization domain.

use std::collections::BTreeMap;
use std::sync::Mutex;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender, unbounded};
use thiserror::Error;

use crate::core::BlobRef;

/// A blob announcement delivered to subscribers, at most once each.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub blobref: BlobRef,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob {blobref} not found")]
    NotFound { blobref: BlobRef },
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn transience(&self) -> crate::error::Transience {
        match self {
            // The blob may arrive through federation later.
            StoreError::NotFound { .. } => crate::error::Transience::Unknown,
            StoreError::LockPoisoned => crate::error::Transience::Permanent,
        }
    }

    pub fn effect(&self) -> crate::error::Effect {
        crate::error::Effect::None
    }
}

/// Random-access blob storage.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `blobref`. Storing the same ref twice is a no-op.
    fn store_blob(&self, bytes: Bytes, blobref: &BlobRef) -> Result<(), StoreError>;

    fn get_blob(&self, blobref: &BlobRef) -> Result<Bytes, StoreError>;

    fn contains(&self, blobref: &BlobRef) -> Result<bool, StoreError>;
}

struct StoreInner {
    blobs: BTreeMap<BlobRef, Bytes>,
    subscribers: Vec<Sender<StoredBlob>>,
}

/// In-memory content-addressed store with subscription channels.
pub struct MemoryBlobStore {
    inner: Mutex<StoreInner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                blobs: BTreeMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Subscribe to future blob announcements. Blobs stored before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> Receiver<StoredBlob> {
        let (sender, receiver) = unbounded();
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(sender);
        }
        receiver
    }

    /// Hash `bytes`, store them, and return the new ref.
    pub fn store(&self, bytes: impl Into<Bytes>) -> Result<BlobRef, StoreError> {
        let bytes = bytes.into();
        let blobref = BlobRef::for_bytes(&bytes);
        self.store_blob(bytes, &blobref)?;
        Ok(blobref)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn store_blob(&self, bytes: Bytes, blobref: &BlobRef) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        if inner.blobs.contains_key(blobref) {
            // Content-addressed: same ref means same bytes.
            return Ok(());
        }
        inner.blobs.insert(blobref.clone(), bytes.clone());

        let announcement = StoredBlob {
            blobref: blobref.clone(),
            bytes,
        };
        inner
            .subscribers
            .retain(|sender| sender.send(announcement.clone()).is_ok());
        Ok(())
    }

    fn get_blob(&self, blobref: &BlobRef) -> Result<Bytes, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        inner
            .blobs
            .get(blobref)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                blobref: blobref.clone(),
            })
    }

    fn contains(&self, blobref: &BlobRef) -> Result<bool, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.blobs.contains_key(blobref))
    }
}
