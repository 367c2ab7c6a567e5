//! Append-only evidence store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::trace;

/// Where a piece of evidence came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOrigin {
    Search,
    Document,
    Manual,
}

/// A retrieved snippet or document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source_id: String,
    pub content: String,
    pub retrieved_at: DateTime<Utc>,
    pub origin: EvidenceOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl EvidenceItem {
    pub fn new(
        source_id: impl Into<String>,
        content: impl Into<String>,
        origin: EvidenceOrigin,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            retrieved_at: Utc::now(),
            origin,
            title: None,
        }
    }

    /// Evidence supplied by the caller rather than retrieved
    pub fn manual(source_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(source_id, content, EvidenceOrigin::Manual)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Default)]
struct Inner {
    items: Vec<EvidenceItem>,
    ids: HashSet<String>,
}

/// Evidence gathered during one run.
///
/// Unique by `source_id`, insertion ordered, never shrinks. Appends are
/// serialized by an internal lock so gathering tasks can share it.
#[derive(Default)]
pub struct EvidenceStore {
    inner: RwLock<Inner>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item` unless its `source_id` is already present.
    /// Returns whether the store changed.
    pub async fn append(&self, item: EvidenceItem) -> bool {
        let mut inner = self.inner.write().await;
        if inner.ids.contains(&item.source_id) {
            trace!("Duplicate evidence ignored: {}", item.source_id);
            return false;
        }
        inner.ids.insert(item.source_id.clone());
        inner.items.push(item);
        true
    }

    /// Snapshot in insertion order
    pub async fn all(&self) -> Vec<EvidenceItem> {
        self.inner.read().await.items.clone()
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn contains(&self, source_id: &str) -> bool {
        self.inner.read().await.ids.contains(source_id)
    }

    pub async fn get(&self, source_id: &str) -> Option<EvidenceItem> {
        self.inner
            .read()
            .await
            .items
            .iter()
            .find(|item| item.source_id == source_id)
            .cloned()
    }

    pub async fn source_ids(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .items
            .iter()
            .map(|item| item.source_id.clone())
            .collect()
    }
}
