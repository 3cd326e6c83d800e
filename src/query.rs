// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use serde::{Serialize, Deserialize};
use super::{
    metrics::MetricsSnapshot,
    health::HealthReport,
    capture::{CaptureStatus, StartOutcome, StopOutcome},
    export::ExportOutcome,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub status: CaptureStatus,
    pub interface: Option<String>,
    pub records: usize,
    pub snapshots: usize,
}

/// Read side, callable from any thread while the capture is running
pub trait MetricsQuery {
    fn current_status(&self) -> CaptureStatus;

    fn latest_snapshot(&self) -> Option<MetricsSnapshot>;

    /// At most `n` snapshots in chronological order.
    fn recent_snapshots(&self, n: usize) -> Vec<MetricsSnapshot>;

    fn total_bytes_transferred(&self) -> u64;

    fn latest_health(&self) -> Option<HealthReport>;

    fn summary(&self) -> Summary;
}

pub trait CaptureControl {
    fn start(&self) -> StartOutcome;

    fn stop(&self) -> StopOutcome;

    fn export_records(&self) -> ExportOutcome;

    fn set_interface(&self, name: &str) -> Result<String, String>;
}
