//! Per-entity vector index contract and a flat in-memory implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::embeddings::EmbeddingVector;
use crate::{MemoryError, MemoryResult};

/// Payload returned from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    id: Uuid,
    score: f32,
    payload: String,
}

impl VectorMatch {
    /// Creates a match structure.
    #[must_use]
    pub fn new(id: Uuid, score: f32, payload: String) -> Self {
        Self { id, score, payload }
    }

    /// Returns the identifier of the matched point.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the similarity score; higher is closer.
    #[must_use]
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Returns the payload text.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consumes the match, returning its payload text.
    #[must_use]
    pub fn into_payload(self) -> String {
        self.payload
    }
}

/// Nearest-neighbour index holding the vectors of a single entity.
///
/// `insert` must be all-or-nothing: on error the index size is unchanged.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores `embedding` with its `payload`.
    async fn insert(&self, embedding: EmbeddingVector, payload: String) -> MemoryResult<()>;

    /// Returns up to `top_k` matches ordered by descending similarity.
    async fn search(
        &self,
        query: &EmbeddingVector,
        top_k: NonZeroUsize,
    ) -> MemoryResult<Vec<VectorMatch>>;

    /// Returns the number of stored vectors.
    async fn size(&self) -> usize;
}

/// Creates empty indexes on first write for an entity.
pub trait VectorIndexFactory: Send + Sync {
    /// Returns a new, empty index for vectors of `dimensions` length.
    fn create(&self, dimensions: NonZeroUsize) -> Arc<dyn VectorIndex>;
}

#[derive(Debug)]
struct VectorPoint {
    id: Uuid,
    embedding: EmbeddingVector,
    payload: String,
}

/// Exact (flat) cosine-similarity index kept in memory.
///
/// Search is linear in the number of stored vectors; ties keep insertion order.
#[derive(Debug)]
pub struct LocalVectorIndex {
    dimensions: NonZeroUsize,
    points: RwLock<Vec<VectorPoint>>,
}

impl LocalVectorIndex {
    /// Creates an empty index for `dimensions`-long vectors.
    #[must_use]
    pub fn new(dimensions: NonZeroUsize) -> Self {
        Self {
            dimensions,
            points: RwLock::new(Vec::new()),
        }
    }

    fn check_dimensions(&self, embedding: &EmbeddingVector) -> MemoryResult<()> {
        if embedding.len() == self.dimensions.get() {
            Ok(())
        } else {
            Err(MemoryError::vector_index(format!(
                "vector has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )))
        }
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn insert(&self, embedding: EmbeddingVector, payload: String) -> MemoryResult<()> {
        self.check_dimensions(&embedding)?;
        self.points.write().await.push(VectorPoint {
            id: Uuid::new_v4(),
            embedding,
            payload,
        });
        Ok(())
    }

    async fn search(
        &self,
        query: &EmbeddingVector,
        top_k: NonZeroUsize,
    ) -> MemoryResult<Vec<VectorMatch>> {
        self.check_dimensions(query)?;
        let guard = self.points.read().await;
        let mut matches: Vec<VectorMatch> = guard
            .iter()
            .map(|point| {
                VectorMatch::new(
                    point.id,
                    point.embedding.cosine_similarity(query),
                    point.payload.clone(),
                )
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k.get());
        Ok(matches)
    }

    async fn size(&self) -> usize {
        self.points.read().await.len()
    }
}

/// Factory producing [`LocalVectorIndex`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIndexFactory;

impl VectorIndexFactory for LocalIndexFactory {
    fn create(&self, dimensions: NonZeroUsize) -> Arc<dyn VectorIndex> {
        Arc::new(LocalVectorIndex::new(dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec()).unwrap()
    }

    fn dims(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn returns_closest_first() {
        let index = LocalVectorIndex::new(dims(3));
        index
            .insert(vector(&[0.0, 1.0, 0.0]), "beta".to_owned())
            .await
            .unwrap();
        index
            .insert(vector(&[1.0, 0.0, 0.0]), "alpha".to_owned())
            .await
            .unwrap();
        index
            .insert(vector(&[0.7, 0.7, 0.0]), "mixed".to_owned())
            .await
            .unwrap();

        let matches = index.search(&vector(&[1.0, 0.1, 0.0]), dims(2)).await.unwrap();
        let payloads: Vec<_> = matches.iter().map(VectorMatch::payload).collect();
        assert_eq!(payloads, ["alpha", "mixed"]);
        assert!(matches[0].score() > matches[1].score());
    }

    #[tokio::test]
    async fn keeps_duplicates() {
        let index = LocalVectorIndex::new(dims(2));
        for _ in 0..2 {
            index
                .insert(vector(&[1.0, 1.0]), "same".to_owned())
                .await
                .unwrap();
        }
        let matches = index.search(&vector(&[1.0, 1.0]), dims(5)).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_ne!(matches[0].id(), matches[1].id());
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions_without_inserting() {
        let index = LocalIndexFactory.create(dims(2));
        let err = index
            .insert(vector(&[1.0, 0.0, 0.0]), "bad".to_owned())
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::VectorIndex { .. }));
        assert_eq!(index.size().await, 0);
    }
}
