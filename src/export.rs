// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use serde::{Serialize, Deserialize};
use super::record::PacketRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportOutcome {
    Saved {
        identifier: String,
        path: PathBuf,
        records: usize,
    },
    NoData,
    Failed {
        reason: String,
    },
}

impl ExportOutcome {
    pub fn message(&self) -> String {
        match self {
            ExportOutcome::Saved { identifier, .. } => format!("Data saved to {}", identifier),
            ExportOutcome::NoData => "No data to save".to_string(),
            ExportOutcome::Failed { reason } => format!("Export failed: {}", reason),
        }
    }
}

pub fn file_name(now: &DateTime<Local>) -> String {
    format!("network_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Write `records` as csv into `directory`, nothing is created for an empty slice.
pub fn export_records(records: &[PacketRecord], directory: &Path, now: DateTime<Local>) -> ExportOutcome {
    if records.is_empty() {
        return ExportOutcome::NoData;
    }

    let identifier = file_name(&now);
    let path = directory.join(&identifier);
    match write_csv(records, &path) {
        Ok(()) => {
            tracing::info!(path = tracing::field::display(path.display()), records = records.len(), "records exported");
            ExportOutcome::Saved {
                identifier,
                path,
                records: records.len(),
            }
        },
        Err(error) => {
            tracing::error!(
                path = tracing::field::display(path.display()),
                error = tracing::field::display(&error),
                "failed to export records"
            );
            ExportOutcome::Failed {
                reason: error.to_string(),
            }
        },
    }
}

fn write_csv(records: &[PacketRecord], path: &Path) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(&PacketRecord::CSV_FIELDS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
