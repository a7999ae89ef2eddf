pub mod loader;
pub mod prefetch;
pub mod sampler;
pub mod source;

// Re-exports for convenience
pub use loader::{DeferredFetcher, TileFetcher};
pub use prefetch::PrefetchCache;
pub use sampler::{ViewSampler, ViewSignature};
pub use source::UrlTemplate;
