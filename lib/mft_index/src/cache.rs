use std::collections::{HashMap, VecDeque};

/// Fixed-capacity least-recently-used cache of entries keyed by record number.
/// A capacity of 0 turns caching off entirely.
pub struct EntryCache<V> {
    capacity : usize,
    map : HashMap<u64, V>,
    // Front is the least recently used
    order : VecDeque<u64>,
}

impl<V> EntryCache<V> {
    pub fn new(capacity : usize) -> Self {
        EntryCache {
            capacity,
            map: HashMap::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key : u64) -> bool {
        self.map.contains_key(&key)
    }

    pub fn get(&mut self, key : u64) -> Option<&V> {
        if self.map.contains_key(&key) {
            self.touch(key);
            return self.map.get(&key);
        }
        None
    }

    /// Inserts or replaces `key`, returning whatever got evicted to make room
    pub fn insert(&mut self, key : u64, value : V) -> Option<(u64, V)> {
        if self.capacity == 0 {
            return None;
        }

        if self.map.insert(key, value).is_some() {
            self.touch(key);
            return None;
        }

        self.order.push_back(key);

        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                return self.map.remove(&oldest).map(|evicted| (oldest, evicted));
            }
        }

        None
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn touch(&mut self, key : u64) {
        if let Some(position) = self.order.iter().position(|k| *k == key) {
            self.order.remove(position);
        }
        self.order.push_back(key);
    }
}
