// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{path::Path, sync::Arc};
use anyhow::Result;
use chrono::Local;
use super::{
    config::Config,
    store::RetainedStore,
    metrics::MetricsSnapshot,
    health::HealthReport,
    capture::{CaptureSession, CaptureStatus, StartOutcome, StopOutcome},
    export::{self, ExportOutcome},
    query::{MetricsQuery, CaptureControl, Summary},
};

/// Owns the store and the capture session built from the config
pub struct System {
    config: Config,
    store: Arc<RetainedStore>,
    session: CaptureSession,
}

impl System {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(RetainedStore::new(
            config.retention.records,
            config.retention.snapshots,
        ));
        let session = CaptureSession::new(
            config.capture.command(),
            store.clone(),
            config.capture.batch_size,
        );
        System {
            config,
            store,
            session,
        }
    }

    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let config = Config::load(path)?;
        Ok(System::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<RetainedStore> {
        &self.store
    }

    /// Wait for the read loop of the last run.
    pub fn join(&self) {
        self.session.join()
    }
}

impl MetricsQuery for System {
    fn current_status(&self) -> CaptureStatus {
        self.session.status()
    }

    fn latest_snapshot(&self) -> Option<MetricsSnapshot> {
        self.store.latest_snapshot()
    }

    fn recent_snapshots(&self, n: usize) -> Vec<MetricsSnapshot> {
        self.store.recent_snapshots(n)
    }

    fn total_bytes_transferred(&self) -> u64 {
        self.store.total_bytes()
    }

    fn latest_health(&self) -> Option<HealthReport> {
        let (snapshot, batch) = self.store.latest_batch()?;
        Some(HealthReport::assess(&batch, &snapshot))
    }

    fn summary(&self) -> Summary {
        Summary {
            status: self.session.status(),
            interface: self.session.interface(),
            records: self.store.record_count(),
            snapshots: self.store.snapshot_count(),
        }
    }
}

impl CaptureControl for System {
    fn start(&self) -> StartOutcome {
        self.session.start()
    }

    fn stop(&self) -> StopOutcome {
        self.session.stop()
    }

    fn export_records(&self) -> ExportOutcome {
        let records = self.store.records();
        export::export_records(&records, &self.config.export.directory, Local::now())
    }

    fn set_interface(&self, name: &str) -> Result<String, String> {
        self.session.set_interface(name)
    }
}
