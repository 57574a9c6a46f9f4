//! Shipped implementations of the ports.
//!
//! The orchestrator only depends on the port traits; these adapters are what
//! [`DefaultOrchestrator`](crate::orchestrator::DefaultOrchestrator) wires
//! together.

mod http;
mod memory_cache;
mod merging_fetcher;
mod raster_decoder;

pub use http::{HttpTransport, Transport};
pub use memory_cache::{MemoryCache, MemoryCacheStats, NoOpCache};
pub use merging_fetcher::{MergingFetcher, MergingFetcherStats};
pub use raster_decoder::RasterDecoder;
