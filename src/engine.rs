use std::path::{Path, PathBuf};

use crate::coordinator::TransactionCoordinator;
use crate::page_id::TableId;
use crate::transaction_id::TransactionId;
use crate::types::{CoreResult, VoidResult};

/// Default page cache capacity, in pages, when a caller does not pick
/// one explicitly.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// The one runtime knob spec.md §6 names: page-cache capacity, plus the
/// directory table files are created under. Unlike the teacher, which
/// resolves its concurrency strategy from compile-time feature flags,
/// there is nothing else here to configure at runtime.
pub struct EngineConfig {
    pub cache_capacity: usize,
    pub data_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            data_dir: data_dir.into(),
        }
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

/// Explicit engine context: owns one `TransactionCoordinator` and hands
/// out `TransactionId`s. Replaces the teacher's `Database::global()`
/// singleton (spec.md §9, REDESIGN FLAGS: "Replace with an explicit
/// engine context that tests construct directly, so unit tests don't
/// fight over shared global state").
pub struct Engine {
    config: EngineConfig,
    coordinator: TransactionCoordinator,
}

impl Engine {
    pub fn open(config: EngineConfig) -> CoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let coordinator = TransactionCoordinator::new(config.cache_capacity);
        Ok(Self { config, coordinator })
    }

    /// Register a table file named `file_name` under this engine's data
    /// directory, creating it if it does not already exist.
    pub fn register_table(&self, file_name: impl AsRef<Path>) -> CoreResult<TableId> {
        self.coordinator
            .register_table(self.config.data_dir.join(file_name))
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId::new()
    }

    pub fn commit(&self, tid: TransactionId) -> VoidResult {
        self.coordinator.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> VoidResult {
        self.coordinator.transaction_complete(tid, false)
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }
}
