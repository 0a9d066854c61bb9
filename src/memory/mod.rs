//! Memory augmentation
//!
//! Memory sources inject retrieved context into an agent's effective system
//! prompt before its turn. Retrieved items never enter the shared
//! conversation. A source bound with `write_on_completion` also records the
//! agent's final text after each turn, and binding the same `Arc` to several
//! agents gives them a shared store.

pub mod keyword;
pub mod list;

pub use keyword::KeywordMemory;
pub use list::ListMemory;

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single memory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Stored text
    pub content: String,

    /// Who produced the item (agent name, task, user)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When the item was stored
    pub created_at: DateTime<Utc>,
}

impl MemoryItem {
    /// Create new memory item
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the producing source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Queryable store of memory items
#[async_trait]
pub trait MemorySource: Send + Sync {
    /// Store name used in logs and rendered context
    fn name(&self) -> &str;

    /// Retrieve items relevant to `context`
    async fn query(&self, context: &str) -> Result<Vec<MemoryItem>>;

    /// Store an item
    async fn add(&self, item: MemoryItem) -> Result<()>;

    /// Remove every item
    async fn clear(&self) -> Result<()>;
}

/// Who a memory binding serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    /// Only the agent it is attached to
    Agent,

    /// Every agent of a team
    Shared,
}

/// Attachment of a memory source to an agent or a team
#[derive(Clone)]
pub struct MemoryBinding {
    /// Backing store
    pub source: Arc<dyn MemorySource>,

    /// Binding scope
    pub scope: MemoryScope,

    /// Record the agent's final text after each turn
    pub write_on_completion: bool,
}

impl MemoryBinding {
    /// Read-only binding for a single agent
    pub fn agent(source: Arc<dyn MemorySource>) -> Self {
        Self {
            source,
            scope: MemoryScope::Agent,
            write_on_completion: false,
        }
    }

    /// Read-only binding shared by a team
    pub fn shared(source: Arc<dyn MemorySource>) -> Self {
        Self {
            source,
            scope: MemoryScope::Shared,
            write_on_completion: false,
        }
    }

    /// Also record completed turns into the source
    pub fn write_on_completion(mut self) -> Self {
        self.write_on_completion = true;
        self
    }
}

impl fmt::Debug for MemoryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBinding")
            .field("source", &self.source.name())
            .field("scope", &self.scope)
            .field("write_on_completion", &self.write_on_completion)
            .finish()
    }
}

/// Render retrieved items as a system-context block
pub fn render_memory_context(items: &[MemoryItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let mut block = String::from("Relevant memory content (in chronological order):\n");
    for (i, item) in items.iter().enumerate() {
        block.push_str(&format!("{}. {}\n", i + 1, item.content));
    }
    Some(block)
}
