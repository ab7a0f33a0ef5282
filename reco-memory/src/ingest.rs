//! Bootstrapping memory from recorded interaction histories.

use reco_primitives::{EntityId, ItemId};
use tracing::{debug, info};

use crate::MemoryResult;
use crate::coordinator::UserMemory;
use crate::record::InteractionRecord;

/// One historical interaction with a rating normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    item_id: ItemId,
    normalized_rating: f64,
}

impl HistoryEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(item_id: ItemId, normalized_rating: f64) -> Self {
        Self {
            item_id,
            normalized_rating,
        }
    }

    /// Returns the item identifier.
    #[must_use]
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Returns the normalized rating.
    #[must_use]
    pub fn normalized_rating(&self) -> f64 {
        self.normalized_rating
    }
}

/// Summary of an [`UserMemory::ingest_history`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entities whose history was replayed.
    pub entities_ingested: usize,
    /// Entities skipped because they already had short-term state.
    pub entities_skipped: usize,
    /// Interactions replayed.
    pub records: usize,
    /// Consolidations triggered while replaying.
    pub consolidations: usize,
}

impl UserMemory {
    /// Replays per-entity histories through [`UserMemory::update`].
    ///
    /// Ratings are rescaled onto the configured [`crate::RatingScale`]. Entities
    /// that already have short-term state are skipped, so ingesting after a
    /// load does not count interactions twice.
    ///
    /// # Errors
    ///
    /// Stops at the first failed update and returns its error; entities
    /// replayed before the failure stay recorded.
    pub async fn ingest_history<I, H>(&self, histories: I) -> MemoryResult<IngestReport>
    where
        I: IntoIterator<Item = (EntityId, H)>,
        H: IntoIterator<Item = HistoryEntry>,
    {
        let scale = self.config().rating_scale();
        let mut report = IngestReport::default();
        for (id, history) in histories {
            if self.is_tracked(&id).await {
                debug!(entity_id = %id, "entity already tracked; skipping history");
                report.entities_skipped += 1;
                continue;
            }
            for entry in history {
                let rating = scale.scale(entry.normalized_rating);
                let outcome = self
                    .update(&id, InteractionRecord::new(entry.item_id, rating))
                    .await?;
                report.records += 1;
                if outcome.consolidated {
                    report.consolidations += 1;
                }
            }
            report.entities_ingested += 1;
        }
        info!(
            ingested = report.entities_ingested,
            skipped = report.entities_skipped,
            records = report.records,
            "interaction history ingested"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use reco_adapters::sim::HashEmbedder;

    use super::*;
    use crate::config::{RatingScale, UserMemoryConfig};
    use crate::testing::{ScriptedGenerator, entity, record};

    fn item(id: &str) -> ItemId {
        ItemId::new(id).unwrap()
    }

    #[tokio::test]
    async fn replays_and_rescales_history() {
        let config =
            UserMemoryConfig::new(NonZeroUsize::new(2).unwrap(), NonZeroUsize::new(16).unwrap())
                .with_rating_scale(RatingScale::new(1, 5).unwrap());
        let memory = UserMemory::builder(config)
            .with_generator(Arc::new(ScriptedGenerator::default()))
            .with_embedder(Arc::new(HashEmbedder::new(16).unwrap()))
            .build()
            .await
            .unwrap();

        memory.update(&entity("known"), record("x", 1)).await.unwrap();

        let histories = vec![
            (
                entity("u1"),
                vec![
                    HistoryEntry::new(item("a"), 0.0),
                    HistoryEntry::new(item("b"), 0.6),
                    HistoryEntry::new(item("c"), 1.0),
                ],
            ),
            (entity("known"), vec![HistoryEntry::new(item("y"), 0.5)]),
        ];
        let report = memory.ingest_history(histories).await.unwrap();

        assert_eq!(
            report,
            IngestReport {
                entities_ingested: 1,
                entities_skipped: 1,
                records: 3,
                consolidations: 1,
            }
        );
        assert_eq!(
            memory.short_term_window(&entity("u1")).await,
            [record("b", 3), record("c", 5)]
        );
        assert_eq!(memory.update_counts(&entity("known")).await, 1);
    }
}
