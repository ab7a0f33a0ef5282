//! Per-entity long-term memory: an append-only reflection log paired with a
//! lazily created vector index.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use reco_adapters::traits::{AdapterError, TextEmbedder};
use reco_primitives::EntityId;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::embeddings::EmbeddingVector;
use crate::persistence::LongTermSnapshot;
use crate::vector_index::{VectorIndex, VectorIndexFactory, VectorMatch};
use crate::{MemoryError, MemoryResult};

const REBUILD_CONCURRENCY: usize = 4;

#[derive(Default)]
pub(crate) struct LongTermEntry {
    log: Vec<String>,
    index: Option<Arc<dyn VectorIndex>>,
}

type Slot = Arc<Mutex<LongTermEntry>>;

/// Reflections folded out of short-term memory, searchable by similarity.
///
/// Every logged text has exactly one vector in the entity's index. Writes lock
/// the entity's slot for the whole insert, so a cancelled or failed write
/// never leaves a log entry without its vector.
pub struct LongTermStore {
    embedder: Arc<dyn TextEmbedder>,
    index_factory: Arc<dyn VectorIndexFactory>,
    dimensions: NonZeroUsize,
    top_k: NonZeroUsize,
    entities: RwLock<HashMap<EntityId, Slot>>,
}

impl LongTermStore {
    /// Creates an empty store whose indexes hold `dimensions`-long vectors.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        index_factory: Arc<dyn VectorIndexFactory>,
        dimensions: NonZeroUsize,
        top_k: NonZeroUsize,
    ) -> Self {
        Self {
            embedder,
            index_factory,
            dimensions,
            top_k,
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configured embedding dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> NonZeroUsize {
        self.dimensions
    }

    /// Returns the default number of matches returned by [`Self::retrieve`].
    #[must_use]
    pub const fn top_k(&self) -> NonZeroUsize {
        self.top_k
    }

    /// Embeds `text`, indexes it, and appends it to the entity's log.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::Embedding`] or [`MemoryError::DimensionMismatch`] when
    ///   the embedder fails; nothing is written.
    /// - [`MemoryError::AtomicWrite`] when the index rejects the vector; the
    ///   log is left unchanged.
    pub async fn update(&self, id: &EntityId, text: impl Into<String>) -> MemoryResult<()> {
        let text = text.into();
        let embedding = self.embed(&text).await?;

        let slot = self.slot(id).await;
        let mut entry = slot.lock().await;
        let index = match &entry.index {
            Some(index) => Arc::clone(index),
            None => self.index_factory.create(self.dimensions),
        };
        if let Err(err) = index.insert(embedding, text.clone()).await {
            warn!(entity_id = %id, error = %err, "long-term insert rolled back");
            return Err(MemoryError::AtomicWrite {
                entity: id.clone(),
                reason: err.to_string(),
            });
        }
        entry.index = Some(index);
        entry.log.push(text);
        debug!(entity_id = %id, log_len = entry.log.len(), "long-term reflection stored");
        Ok(())
    }

    /// Returns the `top_k` closest reflections joined by newlines.
    ///
    /// # Errors
    ///
    /// See [`Self::retrieve_top`].
    pub async fn retrieve(&self, id: &EntityId, query: &str) -> MemoryResult<String> {
        self.retrieve_top(id, query, self.top_k).await
    }

    /// Returns up to `top_k` reflections most similar to `query`, most similar
    /// first, joined by newlines.
    ///
    /// An entity without an index yields an empty string and the embedder is
    /// not called.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Embedding`] or [`MemoryError::DimensionMismatch`]
    /// when the query cannot be embedded, and [`MemoryError::VectorIndex`] when
    /// the search fails.
    pub async fn retrieve_top(
        &self,
        id: &EntityId,
        query: &str,
        top_k: NonZeroUsize,
    ) -> MemoryResult<String> {
        let Some(index) = self.index(id).await else {
            return Ok(String::new());
        };
        let embedding = self.embed(query).await?;
        let matches = index.search(&embedding, top_k).await?;
        Ok(matches
            .into_iter()
            .map(VectorMatch::into_payload)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Returns the entity's reflection log in insertion order.
    #[must_use]
    pub async fn log(&self, id: &EntityId) -> Vec<String> {
        match self.existing_slot(id).await {
            Some(slot) => slot.lock().await.log.clone(),
            None => Vec::new(),
        }
    }

    /// Returns the number of vectors indexed for the entity.
    #[must_use]
    pub async fn index_size(&self, id: &EntityId) -> usize {
        match self.index(id).await {
            Some(index) => index.size().await,
            None => 0,
        }
    }

    /// Returns entities with at least one stored reflection.
    #[must_use]
    pub async fn entities(&self) -> Vec<EntityId> {
        let slots: Vec<(EntityId, Slot)> = self
            .entities
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();
        let mut ids = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            if !slot.lock().await.log.is_empty() {
                ids.push(id);
            }
        }
        ids
    }

    /// Drops every log and index.
    pub async fn clear(&self) {
        self.entities.write().await.clear();
    }

    /// Copies every non-empty log into a serializable snapshot.
    #[must_use]
    pub async fn snapshot(&self) -> LongTermSnapshot {
        let slots: Vec<(EntityId, Slot)> = self
            .entities
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();
        let mut log = BTreeMap::new();
        for (id, slot) in slots {
            let entry = slot.lock().await;
            if !entry.log.is_empty() {
                log.insert(id, entry.log.clone());
            }
        }
        LongTermSnapshot { log }
    }

    /// Re-embeds every logged text and builds fresh indexes without installing
    /// them.
    pub(crate) async fn prepare(
        &self,
        snapshot: LongTermSnapshot,
    ) -> MemoryResult<HashMap<EntityId, LongTermEntry>> {
        stream::iter(snapshot.log)
            .map(|(id, log)| async move {
                let entry = self.rebuild_entry(&id, log).await?;
                Ok::<_, MemoryError>((id, entry))
            })
            .buffer_unordered(REBUILD_CONCURRENCY)
            .try_collect()
            .await
    }

    async fn rebuild_entry(&self, id: &EntityId, log: Vec<String>) -> MemoryResult<LongTermEntry> {
        if log.is_empty() {
            return Ok(LongTermEntry::default());
        }
        let index = self.index_factory.create(self.dimensions);
        for text in &log {
            let embedding = self.embed(text).await?;
            index
                .insert(embedding, text.clone())
                .await
                .map_err(|err| MemoryError::AtomicWrite {
                    entity: id.clone(),
                    reason: err.to_string(),
                })?;
        }
        debug!(entity_id = %id, log_len = log.len(), "long-term index rebuilt");
        Ok(LongTermEntry {
            log,
            index: Some(index),
        })
    }

    /// Replaces all state with previously prepared entries.
    pub(crate) async fn install(&self, state: HashMap<EntityId, LongTermEntry>) {
        let slots = state
            .into_iter()
            .map(|(id, entry)| (id, Arc::new(Mutex::new(entry))))
            .collect();
        *self.entities.write().await = slots;
    }

    /// Rebuilds indexes from `snapshot` and replaces all state.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index failures; state is left untouched.
    pub async fn restore(&self, snapshot: LongTermSnapshot) -> MemoryResult<()> {
        let state = self.prepare(snapshot).await?;
        self.install(state).await;
        Ok(())
    }

    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let values = self
            .embedder
            .embed(text)
            .await
            .map_err(|source| MemoryError::Embedding { source })?;
        if values.len() != self.dimensions.get() {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimensions.get(),
                actual: values.len(),
            });
        }
        EmbeddingVector::new(values).map_err(|err| MemoryError::Embedding {
            source: AdapterError::response(err.to_string()),
        })
    }

    async fn existing_slot(&self, id: &EntityId) -> Option<Slot> {
        self.entities.read().await.get(id).cloned()
    }

    async fn slot(&self, id: &EntityId) -> Slot {
        if let Some(slot) = self.existing_slot(id).await {
            return slot;
        }
        let mut guard = self.entities.write().await;
        Arc::clone(guard.entry(id.clone()).or_default())
    }

    async fn index(&self, id: &EntityId) -> Option<Arc<dyn VectorIndex>> {
        let slot = self.existing_slot(id).await?;
        let entry = slot.lock().await;
        entry.index.clone()
    }
}

impl std::fmt::Debug for LongTermStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTermStore")
            .field("embedder", &self.embedder.metadata().model())
            .field("dimensions", &self.dimensions)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}
