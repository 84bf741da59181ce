//! # Integrity Auditor
//!
//! Maintenance passes over the store, the link graph and the access log:
//!
//! - **Integrity patrol**: decode and re-fingerprint every stored record
//! - **Anti-entropy**: find ids whose last recorded access is too old
//! - **Access pattern analysis**: link ids that were accessed close together
//!
//! Each pass can be run directly, or on a schedule via [`Auditor::spawn`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use vdatabprot_core::config::{AuditorConfig, Config};
use vdatabprot_core::error::{Error, Result};
use vdatabprot_core::metrics::{Metrics, Timer};
use vdatabprot_core::types::{ContextType, Link, Timestamp, VectorId};
use vdatabprot_core::VectorCodec;

use crate::access_log::AccessLog;
use crate::links::LinkGraph;
use crate::store::RecordStore;

/// Outcome of one integrity patrol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatrolReport {
    /// Records that decoded and matched their fingerprint
    pub verified: usize,
    /// Ids of records that did not, sorted
    pub corrupted: Vec<VectorId>,
}

impl PatrolReport {
    pub fn total(&self) -> usize {
        self.verified + self.corrupted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty()
    }
}

/// When the background auditor runs each pass
#[derive(Debug, Clone)]
pub struct AuditSchedule {
    pub patrol_interval: Duration,
    pub analysis_interval: Duration,
}

impl From<&AuditorConfig> for AuditSchedule {
    fn from(config: &AuditorConfig) -> Self {
        Self {
            patrol_interval: config.patrol_interval(),
            analysis_interval: config.analysis_interval(),
        }
    }
}

pub struct Auditor {
    config: AuditorConfig,
    codec: VectorCodec,
    store: Arc<dyn RecordStore>,
    links: Arc<LinkGraph>,
    access_log: Arc<AccessLog>,
    metrics: Metrics,
    /// Access log entries already covered by incremental analysis
    analyzed_entries: Mutex<usize>,
}

impl Auditor {
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        links: Arc<LinkGraph>,
        access_log: Arc<AccessLog>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config: config.auditor.clone(),
            codec: VectorCodec::new(&config.codec),
            store,
            links,
            access_log,
            metrics,
            analyzed_entries: Mutex::new(0),
        }
    }

    /// Verify every record in a snapshot of the store.
    ///
    /// A record that fails to decode or hashes to the wrong fingerprint is
    /// reported and the patrol moves on.
    pub fn run_integrity_patrol(&self) -> Result<PatrolReport> {
        let timer = Timer::new("integrity_patrol");
        let snapshot = self.store.snapshot()?;

        let mut report = PatrolReport::default();
        for (id, record) in &snapshot {
            match self.codec.reconstitute(id, record) {
                Ok(_) => report.verified += 1,
                Err(e) => {
                    warn!(%id, error = %e, "Patrol found corrupted record");
                    report.corrupted.push(id.clone());
                }
            }
        }
        report.corrupted.sort();

        self.metrics
            .record_patrol(report.verified as u64, report.corrupted.len() as u64);
        let duration = timer.stop();
        if report.is_clean() {
            info!(
                verified = report.verified,
                duration_ms = duration.as_millis() as u64,
                "Integrity patrol complete"
            );
        } else {
            error!(
                verified = report.verified,
                corrupted = report.corrupted.len(),
                duration_ms = duration.as_millis() as u64,
                "Integrity patrol found corruption"
            );
        }
        Ok(report)
    }

    /// Ids whose most recent access is older than `max_age`, sorted
    pub fn run_anti_entropy_analysis(&self, max_age: Duration) -> Result<Vec<VectorId>> {
        self.run_anti_entropy_analysis_at(max_age, chrono::Utc::now())
    }

    /// Staleness relative to `now`.
    ///
    /// Only ids that appear in the access log are considered. An id is stale
    /// when `now - last_access` is strictly greater than `max_age`.
    pub fn run_anti_entropy_analysis_at(
        &self,
        max_age: Duration,
        now: Timestamp,
    ) -> Result<Vec<VectorId>> {
        let max_age = to_chrono(max_age)?;
        let entries = self.access_log.entries()?;

        let mut last_access: HashMap<VectorId, Timestamp> = HashMap::new();
        for entry in entries {
            last_access
                .entry(entry.vector_id)
                .and_modify(|seen| {
                    if entry.timestamp > *seen {
                        *seen = entry.timestamp;
                    }
                })
                .or_insert(entry.timestamp);
        }

        let mut stale: Vec<VectorId> = last_access
            .into_iter()
            .filter(|(_, last)| now.signed_duration_since(*last) > max_age)
            .map(|(id, _)| id)
            .collect();
        stale.sort();

        debug!(stale = stale.len(), "Anti-entropy analysis complete");
        Ok(stale)
    }

    /// Link every pair of distinct ids accessed within `window` of each
    /// other, in both directions, as `AccessedWithin` with the configured
    /// strength. Returns the number of links added.
    ///
    /// Scans the whole access log each time; running it twice over the same
    /// log adds the same links twice.
    pub fn analyze_access_patterns(&self, window: Duration) -> Result<usize> {
        let window = to_chrono(window)?;
        let mut entries = self.access_log.entries()?;
        entries.sort_by_key(|entry| entry.timestamp);

        // Sliding window over time-sorted entries
        let mut created = 0usize;
        for (i, earlier) in entries.iter().enumerate() {
            for later in &entries[i + 1..] {
                if later.timestamp - earlier.timestamp > window {
                    break;
                }
                if earlier.vector_id == later.vector_id {
                    continue;
                }
                self.link_pair(&earlier.vector_id, &later.vector_id)?;
                created += 2;
            }
        }

        self.metrics.record_links_derived(created as u64);
        info!(links = created, "Access pattern analysis complete");
        Ok(created)
    }

    /// Like [`analyze_access_patterns`](Self::analyze_access_patterns) with
    /// the configured window, but only for pairs involving at least one
    /// entry appended since the previous call.
    ///
    /// Progress is kept per access log entry. If linking fails partway, the
    /// next call resumes at the entry that failed, so only that entry's
    /// links can be repeated.
    pub fn analyze_new_access_patterns(&self) -> Result<usize> {
        self.analyze_new_with(|source, target| self.link_pair(source, target))
    }

    fn analyze_new_with<F>(&self, mut link_pair: F) -> Result<usize>
    where
        F: FnMut(&VectorId, &VectorId) -> Result<()>,
    {
        let window = to_chrono(self.config.co_access_window())?;
        let mut analyzed = self.analyzed_entries.lock();
        let entries = self.access_log.entries()?;
        if *analyzed > entries.len() {
            warn!(
                previously = *analyzed,
                now = entries.len(),
                "Access log shrank, reanalyzing from the start"
            );
            *analyzed = 0;
        }

        // File positions ordered by access time
        let mut by_time: Vec<usize> = (0..entries.len()).collect();
        by_time.sort_by_key(|&i| entries[i].timestamp);

        let mut created = 0usize;
        for current in *analyzed..entries.len() {
            let entry = &entries[current];
            let start = entry
                .timestamp
                .checked_sub_signed(window)
                .map(|earliest| by_time.partition_point(|&i| entries[i].timestamp < earliest))
                .unwrap_or(0);

            // Each pair is linked once, when its later entry in file order is reached
            for &other in by_time[start..]
                .iter()
                .take_while(|&&i| entries[i].timestamp - entry.timestamp <= window)
            {
                if other >= current || entries[other].vector_id == entry.vector_id {
                    continue;
                }
                if let Err(e) = link_pair(&entries[other].vector_id, &entry.vector_id) {
                    self.metrics.record_links_derived(created as u64);
                    warn!(analyzed = *analyzed, error = %e, "Access pattern analysis interrupted");
                    return Err(e);
                }
                created += 2;
            }
            *analyzed = current + 1;
        }

        self.metrics.record_links_derived(created as u64);
        info!(links = created, "Access pattern analysis complete");
        Ok(created)
    }

    /// `AccessedWithin` links in both directions at the configured strength
    fn link_pair(&self, source: &VectorId, target: &VectorId) -> Result<()> {
        let link = Link::new(
            source.clone(),
            target.clone(),
            ContextType::AccessedWithin,
            self.config.derived_strength,
        );
        let reverse = link.reversed();
        self.links.add_link(link)?;
        self.links.add_link(reverse)
    }

    /// Run patrols and incremental analysis on `schedule` until the handle
    /// is shut down. Both passes run once immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self: Arc<Self>, schedule: AuditSchedule) -> AuditorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let last_patrol = Arc::new(Mutex::new(None));
        let report_slot = Arc::clone(&last_patrol);

        let task = tokio::spawn(async move {
            let mut patrol_interval = interval(non_zero(schedule.patrol_interval));
            patrol_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut analysis_interval = interval(non_zero(schedule.analysis_interval));
            analysis_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = patrol_interval.tick() => {
                        let auditor = Arc::clone(&self);
                        match tokio::task::spawn_blocking(move || auditor.run_integrity_patrol()).await {
                            Ok(Ok(report)) => *report_slot.lock() = Some(report),
                            Ok(Err(e)) => error!("Integrity patrol error: {:?}", e),
                            Err(e) => error!("Integrity patrol task failed: {:?}", e),
                        }
                    }
                    _ = analysis_interval.tick() => {
                        let auditor = Arc::clone(&self);
                        match tokio::task::spawn_blocking(move || auditor.analyze_new_access_patterns()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => error!("Access pattern analysis error: {:?}", e),
                            Err(e) => error!("Access pattern analysis task failed: {:?}", e),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Shutting down auditor task");
                        break;
                    }
                }
            }
        });

        AuditorHandle {
            shutdown: shutdown_tx,
            last_patrol,
            task,
        }
    }
}

/// Handle to a running background auditor
pub struct AuditorHandle {
    shutdown: watch::Sender<bool>,
    last_patrol: Arc<Mutex<Option<PatrolReport>>>,
    task: JoinHandle<()>,
}

impl AuditorHandle {
    /// Report of the most recent completed patrol
    pub fn last_patrol(&self) -> Option<PatrolReport> {
        self.last_patrol.lock().clone()
    }

    /// Stop the task and wait for an in-flight pass to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Auditor task ended abnormally: {:?}", e);
        }
    }
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration).map_err(|e| Error::Configuration {
        message: format!("Duration {:?} out of range: {}", duration, e),
    })
}

fn non_zero(duration: Duration) -> Duration {
    duration.max(Duration::from_millis(1))
}
