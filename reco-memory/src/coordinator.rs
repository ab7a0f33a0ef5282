//! Coordinates short-term windows, long-term reflections, and persistence.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use reco_adapters::traits::{TextEmbedder, TextGenerator};
use reco_config::MemorySettings;
use reco_primitives::EntityId;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::{ItemCatalog, ItemMemory};
use crate::config::UserMemoryConfig;
use crate::long_term::LongTermStore;
use crate::persistence::{read_snapshots, write_snapshots};
use crate::record::InteractionRecord;
use crate::reflection::ReflectionTemplate;
use crate::short_term::ShortTermStore;
use crate::vector_index::{LocalIndexFactory, VectorIndexFactory};
use crate::{MemoryError, MemoryResult};

/// Static, externally sourced description of an entity used in profile headers.
pub trait EntityAttributes: Send + Sync {
    /// Returns the attribute text, or an empty string when none is known.
    fn describe(&self, id: &EntityId) -> String;
}

impl<F> EntityAttributes for F
where
    F: Fn(&EntityId) -> String + Send + Sync,
{
    fn describe(&self, id: &EntityId) -> String {
        self(id)
    }
}

/// Attribute source that knows nothing about any entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttributes;

impl EntityAttributes for NoAttributes {
    fn describe(&self, _id: &EntityId) -> String {
        String::new()
    }
}

/// Which store a retrieval reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryScope {
    /// The short-term window only.
    Short,
    /// Long-term reflections only.
    Long,
    /// Both stores.
    #[default]
    All,
}

impl MemoryScope {
    /// Returns the lowercase scope name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::All => "all",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryScope {
    type Err = MemoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            "all" => Ok(Self::All),
            _ => Err(MemoryError::InvalidScope(value.to_owned())),
        }
    }
}

/// Result of a scoped retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recollection {
    /// Current short-term window, oldest first.
    ShortTerm(Vec<InteractionRecord>),
    /// Newline-joined long-term reflections, most similar first.
    LongTerm(String),
    /// Both stores; either part may be empty.
    All {
        /// Current short-term window.
        short_term: Vec<InteractionRecord>,
        /// Newline-joined long-term reflections.
        long_term: String,
    },
}

impl Recollection {
    /// Returns whether nothing was recalled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::ShortTerm(window) => window.is_empty(),
            Self::LongTerm(text) => text.is_empty(),
            Self::All {
                short_term,
                long_term,
            } => short_term.is_empty() && long_term.is_empty(),
        }
    }
}

/// What an [`UserMemory::update`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Entity update count after this call.
    pub update_count: u64,
    /// Whether the window was folded into long-term memory.
    pub consolidated: bool,
}

/// Builder for [`UserMemory`] instances.
pub struct UserMemoryBuilder {
    config: UserMemoryConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    catalog: Option<Arc<dyn ItemCatalog>>,
    attributes: Option<Arc<dyn EntityAttributes>>,
    index_factory: Option<Arc<dyn VectorIndexFactory>>,
    template: ReflectionTemplate,
    snapshot_dir: Option<PathBuf>,
}

impl UserMemoryBuilder {
    /// Starts a builder with the supplied configuration.
    #[must_use]
    pub fn new(config: UserMemoryConfig) -> Self {
        Self {
            config,
            generator: None,
            embedder: None,
            catalog: None,
            attributes: None,
            index_factory: None,
            template: ReflectionTemplate::default(),
            snapshot_dir: None,
        }
    }

    /// Starts a builder from file-based settings.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] for out-of-range sizes and
    /// [`MemoryError::InvalidTemplate`] when the configured template lacks the
    /// interactions placeholder.
    pub fn from_settings(settings: &MemorySettings) -> MemoryResult<Self> {
        let mut builder = Self::new(UserMemoryConfig::try_from(settings)?);
        if let Some(template) = &settings.reflection_template {
            builder.template = ReflectionTemplate::new(template.clone())?;
        }
        builder.snapshot_dir.clone_from(&settings.snapshot_dir);
        Ok(builder)
    }

    /// Installs the generation capability used for reflections. Required.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Installs the embedding capability used by long-term memory. Required.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Installs the item catalog; an empty [`ItemMemory`] is used otherwise.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn ItemCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Installs the entity attribute source; [`NoAttributes`] otherwise.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Arc<dyn EntityAttributes>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Installs the vector index factory; [`LocalIndexFactory`] otherwise.
    #[must_use]
    pub fn with_index_factory(mut self, factory: Arc<dyn VectorIndexFactory>) -> Self {
        self.index_factory = Some(factory);
        self
    }

    /// Replaces the reflection prompt template.
    #[must_use]
    pub fn with_template(mut self, template: ReflectionTemplate) -> Self {
        self.template = template;
        self
    }

    /// Loads state from `dir` during [`Self::build`] when the directory exists.
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Builds the coordinator, loading the snapshot directory when configured.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::MissingGenerator`] or
    /// [`MemoryError::MissingEmbedder`] when a required capability is absent,
    /// and propagates [`UserMemory::load`] failures for an existing snapshot
    /// directory.
    pub async fn build(self) -> MemoryResult<UserMemory> {
        let generator = self.generator.ok_or(MemoryError::MissingGenerator)?;
        let embedder = self.embedder.ok_or(MemoryError::MissingEmbedder)?;
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(ItemMemory::new()));
        let attributes = self.attributes.unwrap_or_else(|| Arc::new(NoAttributes));
        let index_factory = self
            .index_factory
            .unwrap_or_else(|| Arc::new(LocalIndexFactory));

        let short_term = ShortTermStore::new(self.config.short_term_limit(), catalog, generator)
            .with_template(self.template);
        let long_term = LongTermStore::new(
            embedder,
            index_factory,
            self.config.embedding_dimensions(),
            self.config.retrieve_top_k(),
        );

        let memory = UserMemory {
            config: self.config,
            short_term,
            long_term,
            attributes,
            gate: RwLock::new(()),
            entity_locks: RwLock::new(HashMap::new()),
        };

        if let Some(dir) = self.snapshot_dir {
            if tokio::fs::try_exists(&dir).await? {
                memory.load(&dir).await?;
            } else {
                debug!(dir = %dir.display(), "snapshot directory absent; starting empty");
            }
        }
        Ok(memory)
    }
}

impl fmt::Debug for UserMemoryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserMemoryBuilder")
            .field("config", &self.config)
            .field("has_generator", &self.generator.is_some())
            .field("has_embedder", &self.embedder.is_some())
            .field("snapshot_dir", &self.snapshot_dir)
            .finish_non_exhaustive()
    }
}

/// Per-entity memory combining a short-term window with long-term reflections.
///
/// Updates for the same entity are serialized; different entities proceed in
/// parallel. Every `consolidate_every`-th update of an entity summarises its
/// window and stores the summary in long-term memory before returning.
pub struct UserMemory {
    config: UserMemoryConfig,
    short_term: ShortTermStore,
    long_term: LongTermStore,
    attributes: Arc<dyn EntityAttributes>,
    // Updates hold this shared; whole-store operations hold it exclusively.
    gate: RwLock<()>,
    entity_locks: RwLock<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl UserMemory {
    /// Creates a builder.
    #[must_use]
    pub fn builder(config: UserMemoryConfig) -> UserMemoryBuilder {
        UserMemoryBuilder::new(config)
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &UserMemoryConfig {
        &self.config
    }

    /// Returns the short-term store.
    #[must_use]
    pub fn short_term(&self) -> &ShortTermStore {
        &self.short_term
    }

    /// Returns the long-term store.
    #[must_use]
    pub fn long_term(&self) -> &LongTermStore {
        &self.long_term
    }

    /// Records an interaction and consolidates when the update count reaches a
    /// multiple of `consolidate_every`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Consolidation`] when reflection or the long-term
    /// write fails. The short-term update is kept and no partial long-term
    /// entry is written.
    pub async fn update(
        &self,
        id: &EntityId,
        record: InteractionRecord,
    ) -> MemoryResult<UpdateOutcome> {
        let _gate = self.gate.read().await;
        let lock = self.entity_lock(id).await;
        let _entity = lock.lock().await;

        let update_count = self.short_term.update(id, record).await;
        if update_count % self.config.consolidate_every().get() != 0 {
            return Ok(UpdateOutcome {
                update_count,
                consolidated: false,
            });
        }

        match self.consolidate(id).await {
            Ok(()) => {
                info!(entity_id = %id, update_count, "short-term memory consolidated");
                Ok(UpdateOutcome {
                    update_count,
                    consolidated: true,
                })
            }
            Err(err) => {
                warn!(entity_id = %id, update_count, error = %err, "consolidation failed");
                Err(MemoryError::Consolidation {
                    entity: id.clone(),
                    update_count,
                    source: Box::new(err),
                })
            }
        }
    }

    async fn consolidate(&self, id: &EntityId) -> MemoryResult<()> {
        let reflection = self.short_term.reflect(id).await?;
        self.long_term.update(id, reflection).await
    }

    /// Reads from the selected stores. Unknown entities yield empty results.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index failures from the long-term store.
    pub async fn retrieve(
        &self,
        id: &EntityId,
        query: &str,
        scope: MemoryScope,
    ) -> MemoryResult<Recollection> {
        let _gate = self.gate.read().await;
        Ok(match scope {
            MemoryScope::Short => Recollection::ShortTerm(self.short_term.retrieve(id).await),
            MemoryScope::Long => Recollection::LongTerm(self.long_term.retrieve(id, query).await?),
            MemoryScope::All => Recollection::All {
                short_term: self.short_term.retrieve(id).await,
                long_term: self.long_term.retrieve(id, query).await?,
            },
        })
    }

    /// Assembles a textual profile of the entity.
    ///
    /// The header names the entity and its attributes. With `use_short` the
    /// profile adds a freshly generated reflection of the current window,
    /// except right after an update whose count was one past a multiple of
    /// `consolidate_every`. With `use_long` it adds the long-term reflections
    /// closest to that fresh reflection.
    ///
    /// # Errors
    ///
    /// Propagates generation, embedding, and index failures.
    pub async fn construct_profile(
        &self,
        id: &EntityId,
        use_short: bool,
        use_long: bool,
    ) -> MemoryResult<String> {
        let _gate = self.gate.read().await;
        let include_short = use_short && self.short_line_allowed(id).await;
        let reflection = if include_short || use_long {
            Some(self.short_term.reflect(id).await?)
        } else {
            None
        };

        let attributes = self.attributes.describe(id);
        let mut profile = format!("User {id}");
        if attributes.is_empty() {
            profile.push('\n');
        } else {
            profile.push_str(&format!(" attributes: {attributes}\n"));
        }

        if let Some(reflection) = &reflection {
            if include_short {
                profile.push_str(&format!("User recent preferences: {reflection}\n"));
            }
            if use_long {
                let long_term = self.long_term.retrieve(id, reflection).await?;
                profile.push_str(&format!("User long-term preferences: {long_term}."));
            }
        }
        Ok(profile)
    }

    async fn short_line_allowed(&self, id: &EntityId) -> bool {
        let count = i128::from(self.short_term.update_counts(id).await);
        let every = i128::from(self.config.consolidate_every().get());
        (count - 1).rem_euclid(every) != 0
    }

    /// Writes both stores into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Persist`] naming the snapshot file that could
    /// not be written.
    pub async fn save(&self, dir: impl AsRef<Path>) -> MemoryResult<()> {
        let dir = dir.as_ref();
        let _gate = self.gate.write().await;
        let short_term = self.short_term.snapshot().await;
        let long_term = self.long_term.snapshot().await;
        write_snapshots(dir, &short_term, &long_term).await?;
        info!(
            dir = %dir.display(),
            entities = short_term.update_counts.len(),
            "user memory saved"
        );
        Ok(())
    }

    /// Replaces all state with the snapshot stored in `dir`, rebuilding vector
    /// indexes by re-embedding the long-term logs.
    ///
    /// Nothing is replaced unless both components load successfully.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::MissingState`] when either file is absent,
    /// [`MemoryError::Persist`] naming a file that cannot be read or parsed,
    /// and propagates validation and embedding failures.
    pub async fn load(&self, dir: impl AsRef<Path>) -> MemoryResult<()> {
        let dir = dir.as_ref();
        let (short_snapshot, long_snapshot) = read_snapshots(dir).await?;
        let entities = short_snapshot.update_counts.len();
        let short_state = self.short_term.prepare(short_snapshot)?;
        let long_state = self.long_term.prepare(long_snapshot).await?;

        let _gate = self.gate.write().await;
        self.short_term.install(short_state).await;
        self.long_term.install(long_state).await;
        self.entity_locks.write().await.clear();
        info!(dir = %dir.display(), entities, "user memory loaded");
        Ok(())
    }

    /// Wipes both stores.
    pub async fn clear(&self) {
        let _gate = self.gate.write().await;
        self.short_term.clear().await;
        self.long_term.clear().await;
        self.entity_locks.write().await.clear();
        debug!("user memory cleared");
    }

    /// Returns the entity's current window, oldest first.
    #[must_use]
    pub async fn short_term_window(&self, id: &EntityId) -> Vec<InteractionRecord> {
        self.short_term.retrieve(id).await
    }

    /// Returns the entity's long-term reflection log in insertion order.
    #[must_use]
    pub async fn long_term_log(&self, id: &EntityId) -> Vec<String> {
        self.long_term.log(id).await
    }

    /// Returns the entity's update count, 0 when unseen.
    #[must_use]
    pub async fn update_counts(&self, id: &EntityId) -> u64 {
        self.short_term.update_counts(id).await
    }

    /// Returns whether the entity has short-term state.
    #[must_use]
    pub async fn is_tracked(&self, id: &EntityId) -> bool {
        self.short_term.is_tracked(id).await
    }

    /// Returns every entity with state in either store, sorted.
    #[must_use]
    pub async fn tracked_entities(&self) -> Vec<EntityId> {
        let mut ids: BTreeSet<EntityId> = self.short_term.entities().await.into_iter().collect();
        ids.extend(self.long_term.entities().await);
        ids.into_iter().collect()
    }

    async fn entity_lock(&self, id: &EntityId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.entity_locks.read().await.get(id).cloned() {
            return lock;
        }
        let mut guard = self.entity_locks.write().await;
        Arc::clone(guard.entry(id.clone()).or_default())
    }
}

impl fmt::Debug for UserMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserMemory")
            .field("config", &self.config)
            .field("short_term", &self.short_term)
            .field("long_term", &self.long_term)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU64, NonZeroUsize};
    use std::time::Duration;

    use reco_adapters::sim::HashEmbedder;

    use super::*;
    use crate::testing::{ScriptedGenerator, entity, record};

    fn config(limit: usize, every: u64) -> UserMemoryConfig {
        UserMemoryConfig::new(NonZeroUsize::new(limit).unwrap(), NonZeroUsize::new(32).unwrap())
            .with_consolidate_every(NonZeroU64::new(every).unwrap())
    }

    async fn memory(limit: usize, every: u64, generator: Arc<ScriptedGenerator>) -> UserMemory {
        UserMemory::builder(config(limit, every))
            .with_generator(generator)
            .with_embedder(Arc::new(HashEmbedder::new(32).unwrap()))
            .build()
            .await
            .unwrap()
    }

    #[test]
    fn scope_parses_known_names_only() {
        assert_eq!("short".parse::<MemoryScope>().unwrap(), MemoryScope::Short);
        assert_eq!(" LONG ".parse::<MemoryScope>().unwrap(), MemoryScope::Long);
        assert_eq!(MemoryScope::default(), MemoryScope::All);
        assert_eq!(MemoryScope::All.to_string(), "all");
        let err = "medium".parse::<MemoryScope>().expect_err("unknown scope");
        assert!(matches!(err, MemoryError::InvalidScope(ref s) if s == "medium"));
    }

    #[tokio::test]
    async fn builder_requires_capabilities() {
        let err = UserMemory::builder(config(2, 2))
            .with_embedder(Arc::new(HashEmbedder::new(32).unwrap()))
            .build()
            .await
            .expect_err("no generator");
        assert!(matches!(err, MemoryError::MissingGenerator));

        let err = UserMemory::builder(config(2, 2))
            .with_generator(Arc::new(ScriptedGenerator::default()))
            .build()
            .await
            .expect_err("no embedder");
        assert!(matches!(err, MemoryError::MissingEmbedder));
    }

    #[tokio::test]
    async fn consolidates_on_multiples_of_period() {
        let generator = Arc::new(ScriptedGenerator::default());
        let memory = memory(2, 3, generator.clone()).await;
        let id = entity("u1");

        let mut consolidated_at = Vec::new();
        for n in 1..=9 {
            let outcome = memory.update(&id, record(&format!("m{n}"), 3)).await.unwrap();
            assert_eq!(outcome.update_count, n);
            if outcome.consolidated {
                consolidated_at.push(n);
            }
        }
        assert_eq!(consolidated_at, [3, 6, 9]);
        assert_eq!(generator.calls(), 3);
        assert_eq!(
            memory.long_term_log(&id).await,
            ["reflection #1", "reflection #2", "reflection #3"]
        );
    }

    #[tokio::test]
    async fn failed_consolidation_keeps_short_term_update() {
        let generator = Arc::new(ScriptedGenerator::default());
        let memory = memory(2, 1, generator.clone()).await;
        let id = entity("u1");

        generator.fail_next(true);
        let err = memory.update(&id, record("a", 4)).await.expect_err("generator down");
        match err {
            MemoryError::Consolidation {
                entity,
                update_count,
                source,
            } => {
                assert_eq!(entity, id);
                assert_eq!(update_count, 1);
                assert!(matches!(*source, MemoryError::Generation { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(memory.short_term_window(&id).await, [record("a", 4)]);
        assert!(memory.long_term_log(&id).await.is_empty());
    }

    #[tokio::test]
    async fn profile_header_uses_attributes() {
        let generator = Arc::new(ScriptedGenerator::default());
        let memory = UserMemory::builder(config(2, 2))
            .with_generator(generator.clone())
            .with_embedder(Arc::new(HashEmbedder::new(32).unwrap()))
            .with_attributes(Arc::new(|id: &EntityId| format!("age 30, id {id}")))
            .build()
            .await
            .unwrap();

        let profile = memory
            .construct_profile(&entity("u7"), false, false)
            .await
            .unwrap();
        assert_eq!(profile, "User u7 attributes: age 30, id u7\n");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn profile_guard_suppresses_line_one_past_boundary() {
        let generator = Arc::new(ScriptedGenerator::default());
        let memory = memory(5, 2, generator.clone()).await;
        let id = entity("u1");

        // count 0: (0 - 1) mod 2 == 1, line included
        let profile = memory.construct_profile(&id, true, false).await.unwrap();
        assert_eq!(profile, "User u1\nUser recent preferences: reflection #1\n");

        // count 1: (1 - 1) mod 2 == 0, line suppressed and no reflection needed
        memory.update(&id, record("a", 5)).await.unwrap();
        let profile = memory.construct_profile(&id, true, false).await.unwrap();
        assert_eq!(profile, "User u1\n");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn clear_wipes_both_stores() {
        let memory = memory(1, 1, Arc::new(ScriptedGenerator::default())).await;
        let id = entity("u1");
        memory.update(&id, record("a", 2)).await.unwrap();
        assert_eq!(memory.tracked_entities().await, [id.clone()]);

        memory.clear().await;
        assert!(memory.tracked_entities().await.is_empty());
        assert_eq!(memory.update_counts(&id).await, 0);
        assert!(
            memory
                .retrieve(&id, "q", MemoryScope::All)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn reads_wait_for_exclusive_snapshot_work() {
        let memory = memory(2, 3, Arc::new(ScriptedGenerator::default())).await;
        let id = entity("u1");
        memory.update(&id, record("a", 4)).await.unwrap();
        memory.update(&id, record("b", 1)).await.unwrap();

        let exclusive = memory.gate.write().await;
        let wait = Duration::from_millis(50);
        assert!(
            tokio::time::timeout(wait, memory.retrieve(&id, "q", MemoryScope::Short))
                .await
                .is_err()
        );
        assert!(
            tokio::time::timeout(wait, memory.construct_profile(&id, true, false))
                .await
                .is_err()
        );
        drop(exclusive);

        let recalled = memory.retrieve(&id, "q", MemoryScope::Short).await.unwrap();
        assert_eq!(
            recalled,
            Recollection::ShortTerm(vec![record("a", 4), record("b", 1)])
        );
        let profile = memory.construct_profile(&id, true, false).await.unwrap();
        assert_eq!(profile, "User u1\nUser recent preferences: reflection #1\n");
    }
}
