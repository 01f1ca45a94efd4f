//! CPU-side mirrors of the per-frame constant buffers.
//!
//! A [`ConstantBufferCache`] hands out one stable index per key within a
//! frame, so a payload referenced by several passes is uploaded once. A
//! [`ConstantBufferList`] is the keyless variant used for payloads that are
//! pushed exactly once (pass and emitter constants).
//!
//! Both are bounded by the element count of the GPU buffer they mirror.
//! Going past it is a programming error and panics.

use std::collections::HashMap;
use std::hash::Hash;

/// Append-only payload array with key deduplication
#[derive(Debug, Clone)]
pub struct ConstantBufferCache<K, T> {
    buffer: Vec<T>,
    lookup: HashMap<K, u32>,
    capacity: u32,
}

impl<K: Eq + Hash + Copy, T> ConstantBufferCache<K, T> {
    /// Create a cache holding at most `capacity` elements
    pub fn new(capacity: u32) -> Self {
        Self {
            buffer: Vec::new(),
            lookup: HashMap::new(),
            capacity,
        }
    }

    /// Return the index recorded for `key`, appending `value` if the key is new.
    ///
    /// When the key was already seen this frame the first payload stays and
    /// `value` is dropped.
    pub fn find_or_add(&mut self, key: K, value: T) -> u32 {
        self.find_or_add_with(key, || value)
    }

    /// Like [`find_or_add`](Self::find_or_add) but only builds the payload for new keys
    pub fn find_or_add_with(&mut self, key: K, make_value: impl FnOnce() -> T) -> u32 {
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }

        assert!(
            self.buffer.len() < self.capacity as usize,
            "constant buffer cache overflow: capacity is {}",
            self.capacity
        );

        let index = self.buffer.len() as u32;
        self.buffer.push(make_value());
        self.lookup.insert(key, index);
        index
    }

    pub fn find(&self, key: &K) -> Option<u32> {
        self.lookup.get(key).copied()
    }

    /// Drop every payload and key; indices start again at 0
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.lookup.clear();
    }

    pub fn buffer(&self) -> &[T] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Append-only payload array without deduplication
#[derive(Debug, Clone)]
pub struct ConstantBufferList<T> {
    buffer: Vec<T>,
    capacity: u32,
}

impl<T> ConstantBufferList<T> {
    pub fn new(capacity: u32) -> Self {
        Self {
            buffer: Vec::new(),
            capacity,
        }
    }

    /// Append a payload and return its index
    pub fn push(&mut self, value: T) -> u32 {
        assert!(
            self.buffer.len() < self.capacity as usize,
            "constant buffer list overflow: capacity is {}",
            self.capacity
        );
        self.buffer.push(value);
        (self.buffer.len() - 1) as u32
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &[T] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
