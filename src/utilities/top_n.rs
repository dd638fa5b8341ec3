use std::{cmp::Ordering, collections::HashSet, hash::Hash};

/// Keep the `n` best unique items seen so far, ranked by a score where larger
/// is better.
///
/// # Example
///
/// ```
/// # use lotinduction::utilities::TopN;
/// let mut top = TopN::new(2);
/// for x in &[3, 1, 4, 1, 5] {
///     top.add(*x, f64::from(*x));
/// }
/// assert_eq!(top.best(), Some(&5));
/// assert_eq!(top.iter().map(|(x, _)| *x).collect::<Vec<_>>(), vec![5, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct TopN<T: Eq + Hash + Clone> {
    n: usize,
    // INVARIANT: sorted by decreasing score.
    items: Vec<(T, f64)>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> TopN<T> {
    pub fn new(n: usize) -> Self {
        TopN {
            n,
            items: Vec::with_capacity(n),
            seen: HashSet::with_capacity(n),
        }
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }
    /// Offer `item` with score `score`. Returns `true` if it was retained.
    pub fn add(&mut self, item: T, score: f64) -> bool {
        if self.n == 0 || score.is_nan() || self.seen.contains(&item) {
            return false;
        }
        if self.items.len() == self.n {
            match self.items.last() {
                Some((_, worst)) if score <= *worst => return false,
                _ => (),
            }
        }
        let idx = self
            .items
            .iter()
            .position(|(_, s)| s.partial_cmp(&score).unwrap_or(Ordering::Less) == Ordering::Less)
            .unwrap_or_else(|| self.items.len());
        self.seen.insert(item.clone());
        self.items.insert(idx, (item, score));
        if self.items.len() > self.n {
            if let Some((dropped, _)) = self.items.pop() {
                self.seen.remove(&dropped);
            }
        }
        true
    }
    /// The highest-scoring item.
    pub fn best(&self) -> Option<&T> {
        self.items.first().map(|(x, _)| x)
    }
    /// Iterate from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &(T, f64)> {
        self.items.iter()
    }
}
