//! Storage core and unjudged-query selection for side-by-side search evaluation.
//!
//! # Public API Surface
//!
//! ## Storage
//! - [`PreferencesStore`], [`QueryStore`], [`JudgmentStore`] - Store contracts
//! - [`TextPreferencesStore`], [`TextQueryStore`], [`TextJudgmentStore`] - File-backed stores
//! - [`ResultStore`] - Content-addressed, reference-counted snapshot file
//! - [`CachingQueryStore`], [`CachingJudgmentStore`], [`Synchronized`], [`Observed`] - Decorators
//! - [`StorageManager`] - One root, three stores
//!
//! ## Selection
//! - [`QueryChooser`], [`UnjudgedQueryChooser`], [`RandomQueryChooser`]
//! - [`WeightedChoice`] - The single weighted-draw primitive
//!
//! ## Wiring
//! - [`Config`], [`ConfigError`] - `SXS_*` environment configuration
//! - [`EvaluationService`] - Stores plus an attached chooser
//!
//! ## Test/Mock Support
//! [`storage::RecordingListener`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod chooser;
pub mod config;
pub mod constants;
pub mod format;
pub mod hashing;
pub mod model;
pub mod service;
pub mod storage;

pub use chooser::{
    AssessorStatus, QueryChooser, RandomQueryChooser, UnjudgedQueryChooser, WeightedChoice,
};
pub use config::{Config, ConfigError};
pub use format::{FormatError, FormatResult};
pub use hashing::{
    Blake3Hasher, Blake3PasswordHasher, ContentHasher, Digest, PasswordHasher, hash_content,
};
pub use model::{
    Formatter, Judgment, JudgmentRecord, QueryList, ResultEntry, ResultPairHandle, ResultPrefs,
    ResultSnapshot, ScoringProfile,
};
pub use service::{EvaluationChooser, EvaluationService, EvaluationStorage};
pub use storage::{
    CacheCapacities, CachingJudgmentStore, CachingQueryStore, JudgmentStore, NoopListener,
    Observed, PreferencesStore, QueryStore, ResultStore, StorageError, StorageListener,
    StorageManager, StorageResult, Synchronized, TextJudgmentStore, TextPreferencesStore,
    TextQueryStore,
};
