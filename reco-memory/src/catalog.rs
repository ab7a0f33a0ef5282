//! Item descriptions used to enrich reflections.

use std::collections::HashMap;

use async_trait::async_trait;
use reco_primitives::ItemId;
use tokio::sync::RwLock;

/// Maps an item identifier to descriptive text.
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    /// Returns the description of `item`, or an empty string when unknown.
    async fn describe(&self, item: &ItemId) -> String;
}

/// In-memory catalog accumulating text per item.
#[derive(Debug, Default)]
pub struct ItemMemory {
    items: RwLock<HashMap<ItemId, String>>,
}

impl ItemMemory {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` to the description of `item`.
    pub async fn update(&self, item: ItemId, text: &str) {
        let mut guard = self.items.write().await;
        guard.entry(item).or_default().push_str(text);
    }

    /// Returns the number of described items.
    #[must_use]
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns whether no item has a description.
    #[must_use]
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Removes every description.
    pub async fn clear(&self) {
        self.items.write().await.clear();
    }
}

impl FromIterator<(ItemId, String)> for ItemMemory {
    fn from_iter<I: IntoIterator<Item = (ItemId, String)>>(iter: I) -> Self {
        Self {
            items: RwLock::new(iter.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ItemCatalog for ItemMemory {
    async fn describe(&self, item: &ItemId) -> String {
        self.items
            .read()
            .await
            .get(item)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ItemId {
        ItemId::new(id).unwrap()
    }

    #[tokio::test]
    async fn unknown_items_describe_as_empty() {
        let catalog = ItemMemory::new();
        assert_eq!(catalog.describe(&item("missing")).await, "");
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn update_appends_text() {
        let catalog = ItemMemory::new();
        catalog.update(item("i1"), "Alien (1979)").await;
        catalog.update(item("i1"), "; horror, sci-fi").await;
        assert_eq!(catalog.describe(&item("i1")).await, "Alien (1979); horror, sci-fi");
        assert_eq!(catalog.len().await, 1);
    }

    #[tokio::test]
    async fn collects_from_pairs() {
        let catalog: ItemMemory = [(item("a"), "Heat".to_owned())].into_iter().collect();
        assert_eq!(catalog.describe(&item("a")).await, "Heat");
        catalog.clear().await;
        assert_eq!(catalog.describe(&item("a")).await, "");
    }
}
