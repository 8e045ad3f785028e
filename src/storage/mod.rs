//! File-backed stores and the decorators layered over them.
//!
//! The text stores ([`TextPreferencesStore`], [`TextQueryStore`],
//! [`TextJudgmentStore`]) own their files and nothing else. Decorators add one
//! concern each and implement the same traits:
//!
//! - [`CachingQueryStore`] / [`CachingJudgmentStore`]: bounded LRU read caches,
//!   write-through.
//! - [`Synchronized`]: a cloneable handle that serializes access under a per-store
//!   lock.
//! - [`Observed`]: tells a [`StorageListener`] about successful mutations once the
//!   store's lock has been released.
//!
//! [`StorageManager::open`] assembles the canonical stack
//! `Observed<Synchronized<Caching<Text>>>` under one root directory.

pub mod atomic;
pub mod cache;
pub mod error;
pub mod judgments;
pub mod manager;
pub mod observed;
pub mod prefs;
pub mod queries;
pub mod results;
pub mod store;
pub mod sync;

pub use cache::{CacheCapacities, CachingJudgmentStore, CachingQueryStore};
pub use error::{StorageError, StorageResult};
pub use judgments::TextJudgmentStore;
pub use manager::{
    ManagedJudgmentStore, ManagedPreferencesStore, ManagedQueryStore, StorageManager,
};
pub use observed::{NoopListener, Observed, StorageListener};
pub use prefs::TextPreferencesStore;
pub use queries::TextQueryStore;
pub use results::{ResultStore, StoredDigestEntry};
pub use store::{JudgmentStore, PreferencesStore, QueryStore};
pub use sync::Synchronized;

#[cfg(any(test, feature = "mock"))]
pub use observed::{RecordingListener, StorageEvent};
