//! Bounded chronological memory
//!
//! Returns every stored item in insertion order regardless of the query,
//! optionally only the most recent `k`. Oldest items are evicted once the
//! store is at capacity.

use crate::errors::Result;
use crate::memory::{MemoryItem, MemorySource};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Maximum number of stored items
pub const MAX_MEMORY_ITEMS: usize = 100;

/// Chronological memory store
#[derive(Debug)]
pub struct ListMemory {
    /// Store name
    name: String,

    /// Stored items, oldest first
    items: RwLock<VecDeque<MemoryItem>>,

    /// Capacity before FIFO eviction
    max_items: usize,

    /// Only return the last `k` items
    recent: Option<usize>,
}

impl ListMemory {
    /// Create new store with default capacity
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, MAX_MEMORY_ITEMS)
    }

    /// Create store with custom capacity
    pub fn with_capacity(name: impl Into<String>, max_items: usize) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(VecDeque::with_capacity(max_items.min(MAX_MEMORY_ITEMS))),
            max_items: max_items.max(1),
            recent: None,
        }
    }

    /// Return only the most recent `k` items on query
    pub fn with_recent(mut self, k: usize) -> Self {
        self.recent = Some(k);
        self
    }

    /// Seed the store with items
    pub async fn extend<I>(&self, items: I)
    where
        I: IntoIterator<Item = MemoryItem>,
    {
        let mut store = self.items.write().await;
        for item in items {
            if store.len() >= self.max_items {
                store.pop_front();
            }
            store.push_back(item);
        }
    }

    /// Count stored items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl MemorySource for ListMemory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, _context: &str) -> Result<Vec<MemoryItem>> {
        let store = self.items.read().await;
        let start = match self.recent {
            Some(k) => store.len().saturating_sub(k),
            None => 0,
        };
        Ok(store.range(start..).cloned().collect())
    }

    async fn add(&self, item: MemoryItem) -> Result<()> {
        self.extend(std::iter::once(item)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.items.write().await.clear();
        Ok(())
    }
}
