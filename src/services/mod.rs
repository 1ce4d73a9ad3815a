//! Service layer modules for external collaborators.
//!
//! Redis caching, the read-only catalog, the contractor directory
//! (trust scores) and notification delivery.

pub mod cache;
pub mod catalog;
pub mod directory;
pub mod notifications;

pub use cache::RedisCache;
pub use catalog::{CachedCatalog, Catalog, PgCatalog, StaticCatalog};
pub use directory::{ContractorDirectory, MemoryContractorDirectory, PgContractorDirectory};
pub use notifications::{Notifier, PgNotifier, RecordingNotifier};
