//! Fixed-capacity recency cache for classification results.
//!
//! # Responsibilities
//! - O(1) lookup of a previously classified path
//! - O(1) insert with eviction of the least recently written entry
//! - Safe shared use from many request tasks
//!
//! # Design Decisions
//! - Nodes live in an index-linked arena (`Vec` + free list), no `unsafe`
//! - `get` takes the shared lock and never reorders; only `set` moves an
//!   entry to the head. Eviction is by recency of write, not of read.
//! - At most one eviction per `set`, since a `set` adds at most one entry
//! - Capacity only bounds the entry count; storage grows with use

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

struct Node<V> {
    key: Arc<str>,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<V> {
    capacity: usize,
    index: HashMap<Arc<str>, usize>,
    nodes: Vec<Node<V>>,
    // Slots released by eviction, reused by the next insert.
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

/// A thread-safe, bounded key → value store ordered by recency of write.
pub struct EndpointCache<V> {
    inner: RwLock<Inner<V>>,
}

impl<V: Clone> EndpointCache<V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Callers are expected to clamp configured values beforehand; a zero
    /// capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                capacity,
                index: HashMap::new(),
                nodes: Vec::new(),
                free: Vec::new(),
                head: None,
                tail: None,
            }),
        }
    }

    /// Look up `key` without touching its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .map(|&idx| inner.nodes[idx].value.clone())
    }

    /// Insert or update `key`, making it the most recently written entry.
    pub fn set(&self, key: &str, value: V) {
        self.inner.write().insert(key, value);
    }
}

impl<V> EndpointCache<V> {
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }
}

impl<V> fmt::Debug for EndpointCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EndpointCache")
            .field("len", &inner.index.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

impl<V> Inner<V> {
    fn insert(&mut self, key: &str, value: V) {
        if let Some(&idx) = self.index.get(key) {
            self.nodes[idx].value = value;
            self.move_to_front(idx);
            return;
        }

        let key: Arc<str> = Arc::from(key);
        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.push_front(idx);
        self.index.insert(key, idx);

        if self.index.len() > self.capacity {
            self.remove_tail();
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn remove_tail(&mut self) {
        let Some(idx) = self.tail else {
            return;
        };
        self.unlink(idx);
        self.index.remove(&self.nodes[idx].key);
        self.free.push(idx);
    }
}
