//! Persistence layer for the EdgeMatch engine: the storage backend trait,
//! the page-view history, and the matched-audience cache.
//!
//! Both stores follow the same discipline: read the entire value under one
//! fixed key at construction, mutate in memory, write the entire value back
//! after every change. Storage failures never surface to callers; the
//! in-memory state stays consistent and the failure is logged.

pub mod backend;
pub mod history;
pub mod matched;

pub use backend::{InMemoryStorage, StorageBackend, MATCHED_AUDIENCES_KEY, PAGE_VIEWS_KEY};
pub use history::ViewStore;
pub use matched::MatchedAudienceStore;
