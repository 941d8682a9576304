use std::collections::VecDeque;

/// Fixed-capacity buffer keeping the most recent entries. Pushing onto a
/// full ring drops its oldest entry.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> Ring<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Returns whatever fell out: the oldest entry, or `item` itself when the
    /// ring holds nothing.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.cap == 0 {
            return Some(item);
        }

        let dropped = (self.items.len() >= self.cap)
            .then(|| self.items.pop_front())
            .flatten();
        self.items.push_back(item);

        dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    #[inline]
    pub fn oldest_first(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let mut r = Ring::new(2);
        assert_eq!(r.push('a'), None);
        assert_eq!(r.push('b'), None);
        assert_eq!(r.push('c'), Some('a'));

        assert_eq!(r.oldest_first().copied().collect::<String>(), "bc");
        assert_eq!(r.oldest_first().rev().copied().collect::<String>(), "cb");
        assert_eq!(r.latest(), Some(&'c'));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut r = Ring::new(0);
        assert_eq!(r.push(1), Some(1));
        assert!(r.is_empty());
    }
}
