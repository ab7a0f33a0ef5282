//! Deterministic embedder for tests and offline runs.
//!
//! [`HashEmbedder`] uses signed feature hashing over lowercase word tokens, so
//! texts sharing words land close together while identical texts always map to
//! identical unit vectors. No network access is involved.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, TextEmbedder};

/// Feature-hashing embedder producing unit-norm vectors of a fixed dimension.
#[derive(Clone, Debug)]
pub struct HashEmbedder {
    dimensions: usize,
    metadata: AdapterMetadata,
}

impl HashEmbedder {
    /// Creates an embedder for `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when `dimensions` is zero.
    pub fn new(dimensions: usize) -> AdapterResult<Self> {
        if dimensions == 0 {
            return Err(AdapterError::configuration(
                "embedding dimensions must be greater than zero",
            ));
        }
        Ok(Self {
            dimensions,
            metadata: AdapterMetadata::new("sim", format!("hash-{dimensions}")),
        })
    }

    /// Returns the output dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0_f32; self.dimensions];
        for token in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }

        let norm = values.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut values {
                *value /= norm;
            }
        } else {
            // Token-free input still needs a valid, finite direction.
            values[0] = 1.0;
        }
        values
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn embed(&self, text: &str) -> AdapterResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
