//! Interaction records held in short-term windows.

use std::collections::BTreeMap;

use reco_primitives::ItemId;
use serde::{Deserialize, Serialize};

/// A single rated interaction between an entity and a catalog item.
///
/// Records are immutable once appended to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    item_id: ItemId,
    rating: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

impl InteractionRecord {
    /// Creates a record for `item_id` with the given rating.
    #[must_use]
    pub fn new(item_id: ItemId, rating: i64) -> Self {
        Self {
            item_id,
            rating,
            extra: BTreeMap::new(),
        }
    }

    /// Attaches a free-form attribute, replacing any previous value for `key`.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Returns the item identifier.
    #[must_use]
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Returns the rating.
    #[must_use]
    pub const fn rating(&self) -> i64 {
        self.rating
    }

    /// Returns the extra attributes.
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}
