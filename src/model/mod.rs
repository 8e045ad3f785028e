//! Domain types and their key=value encodings.

mod judgment;
mod profile;
mod query_list;
mod results;

#[cfg(test)]
mod tests;

pub use judgment::{Judgment, JudgmentRecord, ResultPairHandle};
pub use profile::{Formatter, ScoringProfile};
pub use query_list::QueryList;
pub use results::{ResultEntry, ResultPrefs, ResultSnapshot};
