//! Typed coordinator configuration.

use std::num::{NonZeroU64, NonZeroUsize};

use reco_config::MemorySettings;

use crate::{MemoryError, MemoryResult};

/// Inclusive rating range used to rescale normalized history ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingScale {
    min: i64,
    max: i64,
}

impl RatingScale {
    /// Creates a scale.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] unless `min < max`.
    pub fn new(min: i64, max: i64) -> MemoryResult<Self> {
        if min >= max {
            return Err(MemoryError::InvalidConfig(
                "rating scale minimum must be lower than its maximum",
            ));
        }
        Ok(Self { min, max })
    }

    /// Lowest rating.
    #[must_use]
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Highest rating.
    #[must_use]
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// Maps a rating in `[0, 1]` onto the scale, truncating toward zero.
    ///
    /// Values outside `[0, 1]` are not clamped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn scale(&self, normalized: f64) -> i64 {
        let span = (self.max - self.min) as f64;
        (normalized * span + self.min as f64) as i64
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

/// Sizing and consolidation policy for a [`crate::UserMemory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMemoryConfig {
    short_term_limit: NonZeroUsize,
    consolidate_every: Option<NonZeroU64>,
    retrieve_top_k: NonZeroUsize,
    embedding_dimensions: NonZeroUsize,
    rating_scale: RatingScale,
}

impl UserMemoryConfig {
    /// Number of long-term reflections returned by default.
    pub const DEFAULT_TOP_K: NonZeroUsize = NonZeroUsize::MIN.saturating_add(2);

    /// Creates a configuration with a window of `short_term_limit` records and
    /// `embedding_dimensions`-long vectors.
    #[must_use]
    pub const fn new(short_term_limit: NonZeroUsize, embedding_dimensions: NonZeroUsize) -> Self {
        Self {
            short_term_limit,
            consolidate_every: None,
            retrieve_top_k: Self::DEFAULT_TOP_K,
            embedding_dimensions,
            rating_scale: RatingScale { min: 1, max: 5 },
        }
    }

    /// Consolidates every `every` updates instead of every `short_term_limit`.
    #[must_use]
    pub const fn with_consolidate_every(mut self, every: NonZeroU64) -> Self {
        self.consolidate_every = Some(every);
        self
    }

    /// Sets how many long-term reflections are returned per retrieval.
    #[must_use]
    pub const fn with_retrieve_top_k(mut self, top_k: NonZeroUsize) -> Self {
        self.retrieve_top_k = top_k;
        self
    }

    /// Sets the scale used by history ingestion.
    #[must_use]
    pub const fn with_rating_scale(mut self, scale: RatingScale) -> Self {
        self.rating_scale = scale;
        self
    }

    /// Window capacity `L`.
    #[must_use]
    pub const fn short_term_limit(&self) -> NonZeroUsize {
        self.short_term_limit
    }

    /// Consolidation period `N`; the window capacity when not set explicitly.
    #[must_use]
    pub fn consolidate_every(&self) -> NonZeroU64 {
        self.consolidate_every.unwrap_or_else(|| {
            u64::try_from(self.short_term_limit.get())
                .ok()
                .and_then(NonZeroU64::new)
                .unwrap_or(NonZeroU64::MAX)
        })
    }

    /// Default retrieval depth.
    #[must_use]
    pub const fn retrieve_top_k(&self) -> NonZeroUsize {
        self.retrieve_top_k
    }

    /// Embedding dimensionality.
    #[must_use]
    pub const fn embedding_dimensions(&self) -> NonZeroUsize {
        self.embedding_dimensions
    }

    /// Rating scale for history ingestion.
    #[must_use]
    pub const fn rating_scale(&self) -> RatingScale {
        self.rating_scale
    }
}

impl TryFrom<&MemorySettings> for UserMemoryConfig {
    type Error = MemoryError;

    fn try_from(settings: &MemorySettings) -> MemoryResult<Self> {
        let limit = NonZeroUsize::new(settings.short_term_limit)
            .ok_or(MemoryError::InvalidConfig("short_term_limit must be at least 1"))?;
        let dimensions = NonZeroUsize::new(settings.embedding_dimensions)
            .ok_or(MemoryError::InvalidConfig("embedding_dimensions must be at least 1"))?;
        let top_k = NonZeroUsize::new(settings.retrieve_top_k)
            .ok_or(MemoryError::InvalidConfig("retrieve_top_k must be at least 1"))?;

        let mut config = Self::new(limit, dimensions)
            .with_retrieve_top_k(top_k)
            .with_rating_scale(RatingScale::new(settings.rating_min, settings.rating_max)?);
        if let Some(every) = settings.consolidate_every {
            let every = NonZeroU64::new(every)
                .ok_or(MemoryError::InvalidConfig("consolidate_every must be at least 1"))?;
            config = config.with_consolidate_every(every);
        }
        Ok(config)
    }
}
