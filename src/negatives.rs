//! Table of output classes for negative sampling.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Approximate length of a [`NegativeTable`].
pub const NEGATIVE_TABLE_SIZE: usize = 10_000_000;

/// Class ids laid out so that each class occurs in proportion to the square
/// root of its count.
///
/// Samples are not drawn at random: each model walks the table with its own
/// cursor (see `Model::get_negative`), so a pass over the data sees the same
/// negatives every time for a given seed.
#[derive(Debug, Clone)]
pub struct NegativeTable {
    ids: Vec<u32>,
}

impl NegativeTable {
    /// Build a table of roughly [`NEGATIVE_TABLE_SIZE`] entries, shuffled with
    /// `rng`. Panics if every count is zero.
    pub fn new<R: Rng + ?Sized>(counts: &[u64], rng: &mut R) -> Self {
        Self::with_size(counts, NEGATIVE_TABLE_SIZE, rng)
    }

    /// Same as [`NegativeTable::new`], with `size` in place of
    /// [`NEGATIVE_TABLE_SIZE`].
    pub fn with_size<R: Rng + ?Sized>(counts: &[u64], size: usize, rng: &mut R) -> Self {
        let power: f64 = 0.5;
        let z = counts
            .iter()
            .map(|&c| (c as f64).powf(power))
            .sum::<f64>();
        assert!(z > 0.0, "negative table needs at least one nonzero count");
        assert!(counts.len() <= u32::MAX as usize, "too many classes for a negative table");

        let mut ids = Vec::with_capacity(size + counts.len());
        for (class, &count) in counts.iter().enumerate() {
            let n = ((count as f64).powf(power) * size as f64 / z).ceil() as usize;
            ids.extend(std::iter::repeat(class as u32).take(n));
        }
        ids.shuffle(rng);

        debug!(classes = counts.len(), len = ids.len(), "built negative sampling table");
        NegativeTable { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, pos: usize) -> usize {
        self.ids[pos] as usize
    }

    /// Number of table entries equal to `class`.
    pub fn occurrences(&self, class: usize) -> usize {
        self.ids.iter().filter(|&&id| id as usize == class).count()
    }
}
