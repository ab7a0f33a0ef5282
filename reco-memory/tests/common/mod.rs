#![allow(dead_code)]

use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reco_adapters::sim::HashEmbedder;
use reco_adapters::traits::{
    AdapterError, AdapterMetadata, AdapterResult, TextEmbedder, TextGenerator,
};
use reco_memory::{InteractionRecord, UserMemory, UserMemoryBuilder, UserMemoryConfig};
use reco_primitives::{EntityId, ItemId};
use tokio::sync::{Mutex, Notify};

pub const DIMS: usize = 64;

pub fn entity(id: &str) -> EntityId {
    EntityId::new(id).expect("valid entity id")
}

pub fn item(id: &str) -> ItemId {
    ItemId::new(id).expect("valid item id")
}

pub fn record(item_id: &str, rating: i64) -> InteractionRecord {
    InteractionRecord::new(item(item_id), rating)
}

/// Summarises a prompt as the list of item ids it mentions, so reflections are
/// predictable and differ per window.
pub struct EchoGenerator {
    metadata: AdapterMetadata,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "echo"),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }
}

impl EchoGenerator {
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, prompt: &str) -> AdapterResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::transport("generator offline"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_owned());
        let items: Vec<&str> = prompt
            .lines()
            .filter(|line| line.contains(", rating: "))
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        Ok(format!("likes {}", items.join(" ")))
    }
}

/// Parks every generation call until the test releases it.
pub struct GatedGenerator {
    metadata: AdapterMetadata,
    pub entered: Notify,
    pub release: Notify,
}

impl Default for GatedGenerator {
    fn default() -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "gated"),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, _prompt: &str) -> AdapterResult<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("released".to_owned())
    }
}

/// Deterministic embedder that can be switched off.
pub struct SwitchableEmbedder {
    inner: HashEmbedder,
    failing: AtomicBool,
}

impl SwitchableEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashEmbedder::new(DIMS).expect("non-zero dimensions"),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextEmbedder for SwitchableEmbedder {
    fn metadata(&self) -> &AdapterMetadata {
        self.inner.metadata()
    }

    async fn embed(&self, text: &str) -> AdapterResult<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::transport("embedder offline"));
        }
        self.inner.embed(text).await
    }
}

pub fn config(limit: usize, every: u64) -> UserMemoryConfig {
    UserMemoryConfig::new(
        NonZeroUsize::new(limit).expect("non-zero limit"),
        NonZeroUsize::new(DIMS).expect("non-zero dims"),
    )
    .with_consolidate_every(NonZeroU64::new(every).expect("non-zero period"))
}

pub fn builder(
    limit: usize,
    every: u64,
    generator: Arc<EchoGenerator>,
    embedder: Arc<SwitchableEmbedder>,
) -> UserMemoryBuilder {
    UserMemory::builder(config(limit, every))
        .with_generator(generator)
        .with_embedder(embedder)
}
