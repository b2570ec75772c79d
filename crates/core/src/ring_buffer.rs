//! Fixed-capacity ring buffer
//!
//! Arena of slots plus a circular head index. Pushing beyond capacity
//! overwrites the oldest entry, so memory stays bounded for process-lifetime
//! histories.

use serde::{Serialize, Serializer};

/// Bounded FIFO log that evicts its oldest entry when full
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    /// Index of the oldest entry
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append an entry, returning the evicted oldest entry when full
    pub fn push(&mut self, value: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(value);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(value);
            self.head = (self.head + 1) % capacity;
            evicted
        }
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    /// Newest entry
    pub fn last(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.len - 1) % self.capacity();
        self.slots[idx].as_ref()
    }

    /// Up to `n` newest entries, oldest first
    pub fn last_n(&self, n: usize) -> Vec<&T> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    /// Keep only entries matching the predicate, preserving order
    ///
    /// Returns the number of removed entries.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let capacity = self.capacity();
        let before = self.len;
        let mut kept = Vec::with_capacity(before);
        for i in 0..before {
            if let Some(value) = self.slots[(self.head + i) % capacity].take() {
                if keep(&value) {
                    kept.push(value);
                }
            }
        }
        self.head = 0;
        self.len = kept.len();
        for (slot, value) in self.slots.iter_mut().zip(kept) {
            *slot = Some(value);
        }
        before - self.len
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Entries cloned into a vector, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut buf = RingBuffer::new(3);
        assert!(buf.push(1).is_none());
        assert!(buf.push(2).is_none());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.to_vec(), vec![1, 2]);
        assert_eq!(buf.last(), Some(&2));
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let cap = 5;
        let k = 3;
        let mut buf = RingBuffer::new(cap);
        let mut evicted = Vec::new();
        for i in 0..(cap + k) {
            if let Some(old) = buf.push(i) {
                evicted.push(old);
            }
        }
        assert_eq!(buf.len(), cap);
        assert_eq!(evicted, vec![0, 1, 2]);
        assert_eq!(buf.to_vec(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_last_n() {
        let mut buf = RingBuffer::new(4);
        for i in 0..10 {
            buf.push(i);
        }
        let last: Vec<i32> = buf.last_n(2).into_iter().copied().collect();
        assert_eq!(last, vec![8, 9]);
        assert_eq!(buf.last_n(10).len(), 4);
    }

    #[test]
    fn test_retain_after_wraparound() {
        let mut buf = RingBuffer::new(4);
        for i in 0..6 {
            buf.push(i);
        }
        let removed = buf.retain(|v| v % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(buf.to_vec(), vec![2, 4]);

        buf.push(10);
        buf.push(12);
        buf.push(14);
        assert_eq!(buf.to_vec(), vec![4, 10, 12, 14]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.to_vec(), vec!["b"]);
    }

    #[test]
    fn test_serializes_oldest_first() {
        let mut buf = RingBuffer::new(2);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        assert_eq!(serde_json::to_string(&buf).unwrap(), "[2,3]");
    }
}
