//! Per-entity short-term windows backed by bounded ring buffers.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;

use reco_adapters::traits::TextGenerator;
use reco_primitives::EntityId;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::ItemCatalog;
use crate::persistence::ShortTermSnapshot;
use crate::record::InteractionRecord;
use crate::reflection::{ReflectionTemplate, interaction_line};
use crate::{MemoryError, MemoryResult};

#[derive(Debug, Default, Clone)]
pub(crate) struct ShortTermEntry {
    window: VecDeque<InteractionRecord>,
    update_count: u64,
}

/// Recent interactions per entity plus a monotonic update counter.
///
/// Each window holds at most `limit` records; the oldest record is evicted
/// first. The counter is never reset and keeps counting past evictions.
pub struct ShortTermStore {
    limit: NonZeroUsize,
    catalog: Arc<dyn ItemCatalog>,
    generator: Arc<dyn TextGenerator>,
    template: ReflectionTemplate,
    inner: RwLock<HashMap<EntityId, ShortTermEntry>>,
}

impl ShortTermStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(
        limit: NonZeroUsize,
        catalog: Arc<dyn ItemCatalog>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            limit,
            catalog,
            generator,
            template: ReflectionTemplate::default(),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the reflection template.
    #[must_use]
    pub fn with_template(mut self, template: ReflectionTemplate) -> Self {
        self.template = template;
        self
    }

    /// Returns the window capacity.
    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Appends `record` to the entity's window and returns the new update count.
    pub async fn update(&self, id: &EntityId, record: InteractionRecord) -> u64 {
        let mut guard = self.inner.write().await;
        let entry = guard.entry(id.clone()).or_default();
        entry.window.push_back(record);
        while entry.window.len() > self.limit.get() {
            entry.window.pop_front();
        }
        entry.update_count += 1;
        debug!(
            entity_id = %id,
            update_count = entry.update_count,
            window = entry.window.len(),
            "short-term window updated"
        );
        entry.update_count
    }

    /// Returns how many updates the entity has received, 0 when unseen.
    #[must_use]
    pub async fn update_counts(&self, id: &EntityId) -> u64 {
        self.inner
            .read()
            .await
            .get(id)
            .map_or(0, |entry| entry.update_count)
    }

    /// Returns the current window, oldest first. Empty when unseen.
    #[must_use]
    pub async fn retrieve(&self, id: &EntityId) -> Vec<InteractionRecord> {
        self.inner
            .read()
            .await
            .get(id)
            .map(|entry| entry.window.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns whether the entity has received at least one update.
    #[must_use]
    pub async fn is_tracked(&self, id: &EntityId) -> bool {
        self.inner.read().await.contains_key(id)
    }

    /// Returns the tracked entities in unspecified order.
    #[must_use]
    pub async fn entities(&self) -> Vec<EntityId> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns whether no entity is tracked.
    #[must_use]
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Builds the reflection prompt for the entity's current window.
    ///
    /// An unseen entity or empty window renders the template with no
    /// interaction lines.
    pub async fn reflection_prompt(&self, id: &EntityId) -> String {
        let window = self.retrieve(id).await;
        let mut lines = Vec::with_capacity(window.len());
        for record in &window {
            let description = self.catalog.describe(record.item_id()).await;
            lines.push(interaction_line(record, &description));
        }
        self.template.render(&lines.join("\n"))
    }

    /// Summarises the current window through the generation capability.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Generation`] when the generator fails. The call is
    /// not retried.
    pub async fn reflect(&self, id: &EntityId) -> MemoryResult<String> {
        let prompt = self.reflection_prompt(id).await;
        let reflection = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|source| MemoryError::Generation { source })?;
        debug!(
            entity_id = %id,
            model = self.generator.metadata().model(),
            "short-term reflection generated"
        );
        Ok(reflection)
    }

    /// Removes every window and counter.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Copies the current state into a serializable snapshot.
    #[must_use]
    pub async fn snapshot(&self) -> ShortTermSnapshot {
        let guard = self.inner.read().await;
        let mut snapshot = ShortTermSnapshot::default();
        for (id, entry) in guard.iter() {
            snapshot
                .entries
                .insert(id.clone(), entry.window.iter().cloned().collect());
            snapshot.update_counts.insert(id.clone(), entry.update_count);
        }
        snapshot
    }

    /// Validates a snapshot and converts it into store state without installing it.
    pub(crate) fn prepare(
        &self,
        snapshot: ShortTermSnapshot,
    ) -> MemoryResult<HashMap<EntityId, ShortTermEntry>> {
        let ShortTermSnapshot {
            mut entries,
            update_counts,
        } = snapshot;

        let mut state = HashMap::with_capacity(update_counts.len().max(entries.len()));
        for (id, update_count) in update_counts {
            let window = entries.remove(&id).unwrap_or_default();
            state.insert(id, self.restore_entry(window, update_count)?);
        }
        if let Some(id) = entries.keys().next() {
            return Err(MemoryError::invalid_snapshot(format!(
                "entity `{id}` has a short-term window but no update count"
            )));
        }
        Ok(state)
    }

    fn restore_entry(
        &self,
        window: Vec<InteractionRecord>,
        update_count: u64,
    ) -> MemoryResult<ShortTermEntry> {
        if u64::try_from(window.len()).map_or(true, |len| update_count < len) {
            return Err(MemoryError::invalid_snapshot(format!(
                "update count {update_count} is lower than window length {}",
                window.len()
            )));
        }
        let mut window = VecDeque::from(window);
        if window.len() > self.limit.get() {
            warn!(
                stored = window.len(),
                limit = self.limit.get(),
                "snapshot window exceeds configured limit; dropping oldest records"
            );
            while window.len() > self.limit.get() {
                window.pop_front();
            }
        }
        Ok(ShortTermEntry {
            window,
            update_count,
        })
    }

    /// Replaces all state with previously prepared entries.
    pub(crate) async fn install(&self, state: HashMap<EntityId, ShortTermEntry>) {
        *self.inner.write().await = state;
    }

    /// Validates and installs `snapshot`, replacing all state.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidSnapshot`] when a counter is lower than its
    /// window length or a window has no counter; state is left untouched.
    pub async fn restore(&self, snapshot: ShortTermSnapshot) -> MemoryResult<()> {
        let state = self.prepare(snapshot)?;
        self.install(state).await;
        Ok(())
    }
}

impl std::fmt::Debug for ShortTermStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortTermStore")
            .field("limit", &self.limit)
            .field("generator", &self.generator.metadata().model())
            .finish_non_exhaustive()
    }
}
