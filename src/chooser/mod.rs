//! Query selection for assessors.
//!
//! [`UnjudgedQueryChooser`] steers each assessor towards queries they have not yet
//! judged under the active profile pair and falls back to [`RandomQueryChooser`]
//! when none remain. Both draw through [`WeightedChoice`].
//!
//! # Keeping the chooser current
//!
//! The unjudged chooser caches per-assessor state, so it must hear about storage
//! mutations. Register it as the listener of the outermost storage layer:
//!
//! ```no_run
//! use std::sync::Arc;
//! use sxs::chooser::{QueryChooser, UnjudgedQueryChooser};
//! use sxs::storage::{CacheCapacities, StorageManager};
//!
//! # fn main() -> Result<(), sxs::storage::StorageError> {
//! let manager = StorageManager::open("data".as_ref(), CacheCapacities::default())?;
//! let chooser = Arc::new(UnjudgedQueryChooser::new(
//!     manager.preferences().clone(),
//!     manager.queries().clone(),
//!     manager.judgments().clone(),
//!     None,
//! ));
//! let manager = manager.observe(chooser.clone());
//! let next = chooser.choose("alice")?;
//! # let _ = (manager, next);
//! # Ok(())
//! # }
//! ```

mod random;
mod state;
mod unjudged;
mod weighted;


pub use random::RandomQueryChooser;
pub use unjudged::{AssessorStatus, UnjudgedQueryChooser};
pub use weighted::WeightedChoice;

use crate::storage::StorageResult;

/// Picks the next query to show an assessor.
pub trait QueryChooser: Send + Sync {
    /// A query from any active set; `None` if there are no queries at all.
    fn choose(&self, assessor: &str) -> StorageResult<Option<String>>;

    /// A query from `set`; `None` if the set is missing or empty.
    fn choose_from(&self, assessor: &str, set: &str) -> StorageResult<Option<String>>;
}
