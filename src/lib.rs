pub mod collection;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod repair;
pub mod serialization;
pub mod store;
pub mod sync_bridge;
pub mod version;

pub use crate::collection::{CollectionManager, Health};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, EngineErrorCode};
pub use crate::model::{
    Entity, EntitySet, Id, Location, MvccEntity, MvccLogEntry, Scope, Stage, Status, Value,
    VersionSet,
};
pub use crate::pipeline::{CommitEvent, CommitKind, PipelineState};
pub use crate::version::{Version, VersionClock};

use crate::collection::EngineShared;
use crate::pipeline::Pipeline;
use crate::serialization::{EntityVersionStore, LogEntryStore};
use crate::store::{ColumnStore, MemoryColumnStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Entry point: owns the clock, both typed stores and the commit channel,
/// and hands out one [`CollectionManager`] per caller-supplied scope.
#[derive(Clone)]
pub struct EntityEngine {
    shared: Arc<EngineShared>,
}

impl EntityEngine {
    pub fn open(config: EngineConfig, store: Arc<dyn ColumnStore>) -> Result<Self, EngineError> {
        Self::with_clock(config, store, Arc::new(VersionClock::new()))
    }

    /// Engine over a fresh [`MemoryColumnStore`].
    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        Self::open(config, Arc::new(MemoryColumnStore::new()))
    }

    /// Uses `clock` for every version this engine issues. Engines sharing a
    /// store should use clocks with distinct nodes.
    pub fn with_clock(
        config: EngineConfig,
        store: Arc<dyn ColumnStore>,
        clock: Arc<VersionClock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        info!(
            repair_window = config.repair_window,
            log_buffer_size = config.log_buffer_size,
            max_load_size = config.max_load_size,
            max_entity_size = config.max_entity_size,
            store_timeout_ms = config.store_timeout_ms,
            active_log_ttl_secs = ?config.active_log_ttl_secs,
            commit_event_capacity = config.commit_event_capacity,
            node = clock.node(),
            "entity engine config"
        );
        let logs = LogEntryStore::new(store.clone(), &config);
        let entities = EntityVersionStore::new(store.clone(), &config);
        let (events, _) = broadcast::channel(config.commit_event_capacity);
        let pipeline = Pipeline::new(
            clock.clone(),
            logs.clone(),
            entities.clone(),
            events.clone(),
            &config,
        );
        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                clock,
                store,
                logs,
                entities,
                pipeline,
                events,
            }),
        })
    }

    pub fn collection(&self, scope: Scope) -> Result<CollectionManager, EngineError> {
        scope.validate()?;
        Ok(CollectionManager::new(scope, self.shared.clone()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.shared.events.subscribe()
    }

    pub fn clock(&self) -> &Arc<VersionClock> {
        &self.shared.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.shared.pipeline
    }
}
