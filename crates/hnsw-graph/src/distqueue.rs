//! Distance-ordered queues used by the beam search.
//!
//! Three policies, three types:
//! - [`MinQueue`]: unbounded, ascending; the search frontier
//! - [`CappedMinQueue`]: ascending with a fixed capacity, evicting the worst;
//!   the best-K result set
//! - [`MaxQueue`]: unbounded, descending
//!
//! All three keep their elements sorted at all times. Inserts place the new
//! element after any element with an equal distance, so ties keep insertion
//! order.

use std::collections::VecDeque;

/// A distance paired with an opaque payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<D, V> {
    pub dist: D,
    pub value: V,
}

/// Unbounded queue popping the smallest distance first.
#[derive(Debug, Clone)]
pub struct MinQueue<D, V> {
    items: VecDeque<Element<D, V>>,
}

impl<D: PartialOrd + Copy, V> Default for MinQueue<D, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PartialOrd + Copy, V> MinQueue<D, V> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, dist: D, value: V) {
        let pos = self.items.partition_point(|e| e.dist <= dist);
        self.items.insert(pos, Element { dist, value });
    }

    /// Remove and return the element with the smallest distance.
    pub fn pop_min(&mut self) -> Option<(D, V)> {
        self.items.pop_front().map(|e| (e.dist, e.value))
    }

    pub fn peek_min(&self) -> Option<&Element<D, V>> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in ascending distance order.
    pub fn iter(&self) -> impl Iterator<Item = &Element<D, V>> {
        self.items.iter()
    }
}

/// Ascending queue holding at most `capacity` elements.
///
/// Once full, an insert whose distance is not smaller than the current worst
/// is dropped; otherwise the new element is placed and the worst evicted.
#[derive(Debug, Clone)]
pub struct CappedMinQueue<D, V> {
    items: Vec<Element<D, V>>,
    capacity: usize,
}

impl<D: PartialOrd + Copy, V> CappedMinQueue<D, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, dist: D, value: V) {
        if self.is_full() {
            match self.current_worst() {
                Some(worst) if dist < worst => {}
                _ => return,
            }
        }
        let pos = self.items.partition_point(|e| e.dist <= dist);
        self.items.insert(pos, Element { dist, value });
        if self.items.len() > self.capacity {
            self.items.pop();
        }
    }

    /// Largest retained distance, `None` when empty.
    pub fn current_worst(&self) -> Option<D> {
        self.items.last().map(|e| e.dist)
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in ascending distance order.
    pub fn iter(&self) -> impl Iterator<Item = &Element<D, V>> {
        self.items.iter()
    }

    /// Split into parallel (values, distances), ascending by distance.
    pub fn into_parts(self) -> (Vec<V>, Vec<D>) {
        self.items.into_iter().map(|e| (e.value, e.dist)).unzip()
    }
}

/// Unbounded queue popping the largest distance first.
#[derive(Debug, Clone)]
pub struct MaxQueue<D, V> {
    items: VecDeque<Element<D, V>>,
}

impl<D: PartialOrd + Copy, V> Default for MaxQueue<D, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PartialOrd + Copy, V> MaxQueue<D, V> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, dist: D, value: V) {
        let pos = self.items.partition_point(|e| e.dist >= dist);
        self.items.insert(pos, Element { dist, value });
    }

    /// Remove and return the element with the largest distance.
    pub fn pop_max(&mut self) -> Option<(D, V)> {
        self.items.pop_front().map(|e| (e.dist, e.value))
    }

    pub fn peek_max(&self) -> Option<&Element<D, V>> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in descending distance order.
    pub fn iter(&self) -> impl Iterator<Item = &Element<D, V>> {
        self.items.iter()
    }
}
