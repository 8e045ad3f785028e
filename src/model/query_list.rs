use std::fmt;
use std::sync::Arc;

/// Sorted, deduplicated, immutable list of benchmark queries.
///
/// Cheap to clone. Sorting is by byte order so [`QueryList::position`] maps a
/// query to its index with a binary search; the chooser uses that index as the
/// query's bit position.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct QueryList(Arc<[String]>);

impl QueryList {
    /// Trims every query, drops blanks, then sorts and deduplicates.
    pub fn from_unsorted<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queries: Vec<String> = queries
            .into_iter()
            .map(|q| q.as_ref().trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        queries.sort_unstable();
        queries.dedup();
        Self(queries.into())
    }

    pub fn position(&self, query: &str) -> Option<usize> {
        self.0.binary_search_by(|q| q.as_str().cmp(query)).ok()
    }

    pub fn contains(&self, query: &str) -> bool {
        self.position(query).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for QueryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<S: AsRef<str>> FromIterator<S> for QueryList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_unsorted(iter)
    }
}
