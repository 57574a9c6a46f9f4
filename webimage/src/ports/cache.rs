//! Cache port definition.

use crate::decoded::DecodedImage;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Where a delivered image materialised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheTier {
    /// Served from an in-memory cache.
    MemoryHit,
    /// Served from a persistent cache.
    DiskHit,
    /// Not cache-derived: a miss, a fresh download, or an on-the-fly edit.
    #[default]
    None,
}

impl CacheTier {
    /// Returns true for either hit tier.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::MemoryHit | Self::DiskHit)
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryHit => write!(f, "memory-hit"),
            Self::DiskHit => write!(f, "disk-hit"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    pub image: Option<DecodedImage>,
    pub tier: CacheTier,
}

impl CacheLookup {
    /// A hit from the given tier.
    pub fn hit(image: DecodedImage, tier: CacheTier) -> Self {
        Self {
            image: Some(image),
            tier,
        }
    }

    /// A miss.
    pub fn miss() -> Self {
        Self::default()
    }
}

/// Errors from cache stores.
///
/// The orchestrator logs these and carries on; they never reach a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The image is larger than the cache can ever hold.
    #[error("image of {size} bytes exceeds cache capacity of {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },

    /// Backend-specific failure.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Cache abstraction for decoded images.
///
/// Implementations must be internally thread-safe; the orchestrator calls
/// them concurrently from many requests without further synchronisation.
pub trait ImageCache: Send + Sync + 'static {
    /// Looks up `key`, reporting which tier answered.
    fn lookup(&self, key: &str) -> impl Future<Output = CacheLookup> + Send;

    /// Stores `image` under `key`.
    fn store(
        &self,
        key: &str,
        image: DecodedImage,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}
