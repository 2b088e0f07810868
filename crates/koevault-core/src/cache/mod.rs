//! Metadata caching: a disk-backed store with a fixed 30-day TTL.

mod store;

pub use store::MetadataCache;
