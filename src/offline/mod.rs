//! Offline cache for the application shell.
//!
//! A fixed manifest of static resources is stored under a named generation:
//! - install fetches and stores every manifest entry, all-or-nothing
//! - fetch serves exact-key hits from the current generation, misses go to the network
//! - activate deletes every generation except the current one, which must be installed

mod manifest;
mod storage;
mod worker;

pub use manifest::{CacheManifest, DEFAULT_MANIFEST};
pub use storage::{CacheStorage, SqliteStorage};
pub use worker::{FetchSource, OfflineCache};
