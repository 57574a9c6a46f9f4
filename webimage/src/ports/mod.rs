//! Collaborator interfaces consumed by the orchestrator.
//!
//! The orchestrator only sequences work; storage, transport and decoding are
//! injected through these traits. Reference implementations live in
//! [`crate::adapters`].
//!
//! | Port | Trait | Context |
//! |------|-------|---------|
//! | Cache | [`ImageCache`] | async, owned by the cache |
//! | Fetch | [`Fetcher`] | async, owned by the fetcher |
//! | Decode | [`ImageDecoder`] | sync, run on the blocking executor |

mod cache;
mod decode;
mod fetch;

pub use cache::{CacheError, CacheLookup, CacheTier, ImageCache};
pub use decode::ImageDecoder;
pub use fetch::{FetchError, FetchHandle, FetchResponder, Fetcher, PendingFetch};
