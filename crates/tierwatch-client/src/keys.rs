//! Credential pool with a shared rotation cursor

use crate::error::{ClientError, ClientResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered, non-empty pool of API keys
///
/// The cursor is shared by every concurrent caller. Concurrent rotations
/// are last-writer-wins: any key is valid for any call, so a lost rotation
/// only costs one more 429.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    /// Build a pool, rejecting an empty key list
    pub fn new<I, S>(keys: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|k| !k.trim().is_empty())
            .collect();
        if keys.is_empty() {
            return Err(ClientError::EmptyKeyPool);
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; the constructor rejects empty pools
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the key currently in use
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Relaxed) % self.keys.len()
    }

    /// Key currently in use
    #[must_use]
    pub fn current(&self) -> &str {
        &self.keys[self.position()]
    }

    /// Advance to the next key and return its index
    pub fn rotate(&self) -> usize {
        let next = (self.position() + 1) % self.keys.len();
        self.cursor.store(next, Ordering::Relaxed);
        tracing::info!(key = next + 1, of = self.keys.len(), "rotated api key");
        next
    }
}
