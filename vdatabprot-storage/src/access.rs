//! # Access Layer
//!
//! Front door for reads and writes.
//!
//! ```text
//! write:  bytes ──> codec.encode ──> store.put ──> access log (WRITE)
//!
//! read:   id ──> prefetch cache ──hit──> decode + verify ──> access log (READ)
//!                      │
//!                     miss
//!                      ▼
//!                 store.get ──> decode + verify ──> access log (READ)
//!                                                      │
//!                     links with strength > threshold ─┘──> stage targets
//! ```
//!
//! Prefetch is best effort. A linked target that is missing or unreadable is
//! skipped and never fails the read that triggered it. A cache hit does not
//! prefetch further.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use vdatabprot_core::config::{AccessConfig, Config};
use vdatabprot_core::error::{Error, Result};
use vdatabprot_core::metrics::{Metrics, Timer};
use vdatabprot_core::types::{AccessKind, ContextType, Link, VectorId, VectorRecord};
use vdatabprot_core::VectorCodec;

use crate::access_log::AccessLog;
use crate::auditor::Auditor;
use crate::cache::{CacheStats, PrefetchCache};
use crate::links::LinkGraph;
use crate::store::{LogStore, RecordStore};

pub struct AccessLayer {
    config: AccessConfig,
    codec: VectorCodec,
    store: Arc<dyn RecordStore>,
    links: Arc<LinkGraph>,
    access_log: Arc<AccessLog>,
    cache: PrefetchCache,
    metrics: Metrics,
}

impl AccessLayer {
    /// Open the store, link graph and access log under `storage.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = &config.storage;
        std::fs::create_dir_all(&storage.data_dir).map_err(|e| Error::Io {
            message: format!("Failed to create data directory {:?}", storage.data_dir),
            source: e,
        })?;

        let store = Arc::new(LogStore::open(storage.vectors_path(), storage)?);
        let links = Arc::new(LinkGraph::open(storage.links_path(), storage)?);
        let access_log = Arc::new(AccessLog::open(storage.access_log_path())?);

        info!(
            data_dir = ?storage.data_dir,
            records = store.len(),
            links = links.link_count(),
            "Access layer opened"
        );

        Ok(Self::with_components(config, store, links, access_log))
    }

    /// Build on caller-supplied components
    pub fn with_components(
        config: &Config,
        store: Arc<dyn RecordStore>,
        links: Arc<LinkGraph>,
        access_log: Arc<AccessLog>,
    ) -> Self {
        Self {
            config: config.access.clone(),
            codec: VectorCodec::new(&config.codec),
            store,
            links,
            access_log,
            cache: PrefetchCache::new(&config.cache),
            metrics: Metrics::new(),
        }
    }

    /// Encode and store `data`, generating an id unless one is given.
    /// Writing an existing id replaces its record.
    pub fn write(&self, data: &[u8], id: Option<VectorId>) -> Result<VectorId> {
        self.write_record(data, None, id)
    }

    /// Like [`write`](Self::write), recording the content type in the metadata
    pub fn write_typed(
        &self,
        data: &[u8],
        original_type: &str,
        id: Option<VectorId>,
    ) -> Result<VectorId> {
        self.write_record(data, Some(original_type), id)
    }

    fn write_record(
        &self,
        data: &[u8],
        original_type: Option<&str>,
        id: Option<VectorId>,
    ) -> Result<VectorId> {
        let timer = Timer::new("access_write");
        let id = id.unwrap_or_else(VectorId::generate);
        let record = self.codec.encode_typed(data, original_type)?;
        let stored = record.compressed_payload.len() as u64;

        self.store.put(&id, record)?;
        // A record staged before this write is no longer the current one
        self.cache.invalidate(&id);
        self.log_access(AccessKind::Write, &id);
        self.metrics.record_write(data.len() as u64, stored);

        debug!(%id, original = data.len(), stored, "Vector written");
        timer.stop();
        Ok(id)
    }

    /// Return the original bytes stored under `id`.
    ///
    /// Fails with `VectorNotFound` for an unknown id, and with
    /// `CorruptPayload` or `IntegrityViolation` when the stored record no
    /// longer yields the bytes it was written with.
    pub fn read(&self, id: &VectorId) -> Result<Vec<u8>> {
        let timer = Timer::new("access_read");

        if let Some(record) = self.cache.take(id) {
            let data = self.unpack(id, &record)?;
            self.log_access(AccessKind::Read, id);
            self.metrics.record_read(true);
            debug!(%id, "Served from prefetch cache");
            timer.stop();
            return Ok(data);
        }

        let record = match self.store.get(id)? {
            Some(record) => record,
            None => {
                self.metrics.record_not_found();
                return Err(Error::VectorNotFound { id: id.to_string() });
            }
        };

        let data = self.unpack(id, &record)?;
        self.log_access(AccessKind::Read, id);
        if self.config.prefetch_enabled {
            self.prefetch_linked(id);
        }
        self.metrics.record_read(false);
        timer.stop();
        Ok(data)
    }

    /// Add a link from `source` to `target`
    pub fn add_link(
        &self,
        source: &VectorId,
        target: &VectorId,
        context_type: ContextType,
        strength_score: f32,
    ) -> Result<()> {
        self.links.add_link(Link::new(
            source.clone(),
            target.clone(),
            context_type,
            strength_score,
        ))
    }

    pub fn links_for(&self, id: &VectorId) -> Vec<Link> {
        self.links.links_for(id)
    }

    /// An auditor over the same store, links and access log
    pub fn auditor(&self, config: &Config) -> Auditor {
        Auditor::new(
            config,
            Arc::clone(&self.store),
            Arc::clone(&self.links),
            Arc::clone(&self.access_log),
            self.metrics.clone(),
        )
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn links(&self) -> &Arc<LinkGraph> {
        &self.links
    }

    pub fn access_log(&self) -> &Arc<AccessLog> {
        &self.access_log
    }

    /// Sync the record logs to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()?;
        self.links.sync()
    }

    fn unpack(&self, id: &VectorId, record: &VectorRecord) -> Result<Vec<u8>> {
        let result = if self.config.verify_on_read {
            self.codec.reconstitute(id, record)
        } else {
            self.codec.decode(record)
        };

        result.map_err(|e| {
            if e.is_corruption() {
                self.metrics.record_integrity_failure();
                error!(%id, error = %e, "Stored record failed verification");
            }
            match e {
                Error::CorruptPayload { message } => Error::CorruptPayload {
                    message: format!("{}: {}", id, message),
                },
                other => other,
            }
        })
    }

    fn prefetch_linked(&self, id: &VectorId) {
        let threshold = self.config.prefetch_threshold;
        let mut staged = 0u64;
        let mut failed = 0u64;

        let links = self.links.links_for(id);
        for link in links.into_iter().filter(|l| l.strength_score > threshold) {
            let target = link.target_vector_id;
            match self.store.get(&target) {
                Ok(Some(record)) => {
                    self.cache.stage(target, record);
                    staged += 1;
                }
                Ok(None) => {
                    debug!(source = %id, %target, "Linked target was never written");
                }
                Err(e) => {
                    failed += 1;
                    warn!(source = %id, %target, error = %e, "Prefetch failed");
                }
            }
        }

        if staged > 0 || failed > 0 {
            debug!(%id, staged, failed, "Prefetched linked records");
            self.metrics.record_prefetch(staged, failed);
        }
    }

    fn log_access(&self, kind: AccessKind, id: &VectorId) {
        if let Err(e) = self.access_log.record(kind, id) {
            warn!(%id, kind = %kind, error = %e, "Failed to append to access log");
        }
    }
}
