use std::sync::Arc;

use m2db_blob::BlobFile;
use m2db_registry::{Registry, RegistryNode};
use m2db_store::{DataStore, MemoryStore, Session};
use m2db_timeseries::TimeSeries;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::SdkResult;

/// One handle over every storage layer, sharing a single session.
#[derive(Clone, Debug)]
pub struct Database {
    config: DatabaseConfig,
    session: Arc<Session>,
    registry: Registry,
    series: TimeSeries,
}

impl Database {
    /// Connect to `store` and provision every table the layers need.
    pub fn open(store: Arc<dyn DataStore>, config: DatabaseConfig) -> SdkResult<Self> {
        let session = Arc::new(Session::new(store, config.session.clone()));
        let registry = Registry::new(Arc::clone(&session));
        let series = TimeSeries::new(Arc::clone(&session), config.series.clone());
        registry.provision()?;
        series.provision()?;
        info!(
            cache = config.session.statement_cache_capacity,
            consistency = %config.session.default_consistency,
            "database opened"
        );
        Ok(Self {
            config,
            session,
            registry,
            series,
        })
    }

    /// A database over a fresh [`MemoryStore`].
    pub fn in_memory(config: DatabaseConfig) -> SdkResult<Self> {
        Self::open(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn timeseries(&self) -> &TimeSeries {
        &self.series
    }

    pub fn node(&self, path: &str) -> SdkResult<RegistryNode> {
        Ok(self.registry.node(path)?)
    }

    /// The blob file stored under `path`, using the configured block size
    /// for new files.
    pub fn file(&self, path: &str) -> SdkResult<BlobFile> {
        let node = self.registry.node(path)?;
        Ok(BlobFile::with_config(node, self.config.blob.clone()))
    }

    /// Hard-delete every soft-deleted registry node.
    pub fn cleanup(&self) -> SdkResult<usize> {
        Ok(self.registry.cleanup()?)
    }

    /// Wait for fire-and-forget writes queued so far.
    pub fn drain(&self) -> SdkResult<()> {
        Ok(self.session.drain()?)
    }
}
