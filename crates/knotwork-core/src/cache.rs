//! Bounded in-memory cache of canonical graphs, keyed by opaque ids
//!
//! Eviction is by insertion order. Reads do not refresh an entry.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::GraphError;
use crate::model::{Link, Node};

/// A canonical graph retained for later view requests.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphCacheEntry {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub pinned_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Arc<GraphCacheEntry>>,
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct GraphCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl GraphCache {
    pub fn new(capacity: usize) -> Self {
        GraphCache {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store an entry under a fresh id, evicting the oldest beyond capacity.
    pub fn insert(&self, entry: impl Into<Arc<GraphCacheEntry>>) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.state.lock();
        state.entries.insert(id.clone(), entry.into());
        state.order.push_back(id.clone());
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                debug!("Evicted graph cache entry {}", oldest);
            }
        }
        id
    }

    pub fn get(&self, id: &str) -> Result<Arc<GraphCacheEntry>, GraphError> {
        self.state
            .lock()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::CacheExpired(id.to_string()))
    }

    /// Live ids, oldest first.
    pub fn ids(&self) -> Vec<String> {
        self.state.lock().order.iter().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
