use crate::real;

/// A class id and its log-probability.
pub type IndexScore = (usize, real);

/// Keeps the `top_k` highest-scoring `(index, score)` pairs offered to it.
#[derive(Debug, Clone)]
pub struct TopIndexScoresCollector {
    top_k: usize,
    /// Sorted by decreasing score; never longer than `top_k`.
    result: Vec<IndexScore>,
}

impl TopIndexScoresCollector {
    pub fn new(top_k: usize) -> Self {
        TopIndexScoresCollector {
            top_k,
            result: Vec::with_capacity(top_k.min(1024) + 1),
        }
    }

    /// True if `add(_, score)` would change the result.
    pub fn should_add(&self, score: real) -> bool {
        if self.result.len() < self.top_k {
            return true;
        }
        self.result.last().map_or(false, |&(_, min)| score > min)
    }

    pub fn add(&mut self, index: usize, score: real) {
        // Ties go after the entries already kept.
        let pos = self.result.partition_point(|&(_, s)| s >= score);
        self.result.insert(pos, (index, score));
        self.result.truncate(self.top_k);
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn result(self) -> Vec<IndexScore> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_best_two() {
        let mut c = TopIndexScoresCollector::new(2);
        c.add(0, 0.1);
        c.add(1, 0.9);
        c.add(2, 0.5);
        assert!(!c.should_add(0.05));
        assert!(c.should_add(0.6));
        assert_eq!(c.result(), vec![(1, 0.9), (2, 0.5)]);
    }

    #[test]
    fn accepts_anything_until_full() {
        let mut c = TopIndexScoresCollector::new(3);
        assert!(c.should_add(f32::NEG_INFINITY));
        c.add(4, -10.0);
        c.add(5, -1.0);
        assert_eq!(c.len(), 2);
        assert!(c.should_add(-100.0));
        c.add(6, -100.0);
        assert!(!c.should_add(-100.0));
        assert_eq!(c.result(), vec![(5, -1.0), (4, -10.0), (6, -100.0)]);
    }

    #[test]
    fn ties_keep_first_seen() {
        let mut c = TopIndexScoresCollector::new(2);
        c.add(0, 1.0);
        c.add(1, 1.0);
        c.add(2, 1.0);
        assert_eq!(c.result(), vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn zero_capacity() {
        let mut c = TopIndexScoresCollector::new(0);
        assert!(!c.should_add(1.0));
        c.add(0, 1.0);
        assert!(c.is_empty());
    }
}
