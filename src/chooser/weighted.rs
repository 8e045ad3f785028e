//! Weighted random choice over a fixed option list.

use rand::Rng;

/// Options with integer weights, drawn with probability `weight / total`.
///
/// Built once per draw from cumulative weights; a draw is one uniform sample in
/// `[0, total)` and a binary search for the first cumulative weight above it.
/// Zero-weight options are dropped at construction and can never be drawn.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    options: Vec<T>,
    cumulative: Vec<u64>,
}

impl<T> WeightedChoice<T> {
    pub fn new<I>(weighted: I) -> Self
    where
        I: IntoIterator<Item = (T, u64)>,
    {
        let mut options = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0u64;
        for (option, weight) in weighted {
            if weight == 0 {
                continue;
            }
            total = total.saturating_add(weight);
            options.push(option);
            cumulative.push(total);
        }
        Self {
            options,
            cumulative,
        }
    }

    /// Every option with weight one.
    pub fn uniform<I>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(options.into_iter().map(|option| (option, 1)))
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Draws one option; `None` only when there is nothing to draw from.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let draw = rng.random_range(0..total);
        let index = self.cumulative.partition_point(|&edge| edge <= draw);
        self.options.get(index)
    }

    /// Like [`WeightedChoice::choose`], consuming the list.
    pub fn into_choice<R: Rng + ?Sized>(mut self, rng: &mut R) -> Option<T> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let draw = rng.random_range(0..total);
        let index = self.cumulative.partition_point(|&edge| edge <= draw);
        (index < self.options.len()).then(|| self.options.swap_remove(index))
    }
}

impl<T> FromIterator<(T, u64)> for WeightedChoice<T> {
    fn from_iter<I: IntoIterator<Item = (T, u64)>>(iter: I) -> Self {
        Self::new(iter)
    }
}
