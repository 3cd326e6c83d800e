// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use super::record::PacketRecord;

/// Reduction of a single batch, never merged with other snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    /// mean ack rtt, milliseconds
    pub latency: f64,
    /// standard deviation of the inter-frame delta, milliseconds
    pub jitter: f64,
    /// megabits per second
    pub bandwidth: f64,
    pub packet_count: usize,
    pub protocol_counts: HashMap<String, usize>,
    pub packet_sizes: Vec<u64>,
}

impl MetricsSnapshot {
    pub fn now(batch: &[PacketRecord]) -> Self {
        Self::calculate(batch, Utc::now())
    }

    pub fn calculate(batch: &[PacketRecord], timestamp: DateTime<Utc>) -> Self {
        let rtt = batch.iter().filter_map(|r| r.ack_rtt).collect::<Vec<_>>();
        let deltas = batch.iter().filter_map(|r| r.time_delta).collect::<Vec<_>>();

        let latency = mean(&rtt).map(|s| s * 1000.0).unwrap_or(0.0);
        let jitter = sample_std_dev(&deltas).map(|s| s * 1000.0).unwrap_or(0.0);

        let total_bytes = batch.iter().map(|r| r.frame_len).sum::<u64>();
        let time_span = time_span(batch);
        let bandwidth = if time_span > 0.0 {
            (total_bytes as f64 * 8.0) / (time_span * 1_000_000.0)
        } else {
            0.0
        };

        let mut protocol_counts = HashMap::new();
        for record in batch {
            *protocol_counts.entry(record.protocol.clone()).or_insert(0) += 1;
        }

        MetricsSnapshot {
            timestamp,
            latency,
            jitter,
            bandwidth,
            packet_count: batch.len(),
            protocol_counts,
            packet_sizes: batch.iter().map(|r| r.frame_len).collect(),
        }
    }
}

// a batch of less than two records spans one second
fn time_span(batch: &[PacketRecord]) -> f64 {
    if batch.len() < 2 {
        return 1.0;
    }
    let mut times = batch.iter().filter_map(|r| r.time);
    let first = match times.next() {
        Some(t) => t,
        None => return 0.0,
    };
    let (min, max) = times.fold((first, first), |(min, max), t| (min.min(t), max.max(t)));
    max - min
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

fn sample_std_dev(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mean = mean(samples)?;
    let squares = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>();
    Some((squares / (samples.len() - 1) as f64).sqrt())
}
