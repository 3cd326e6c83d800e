// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    io::{self, BufRead, BufReader, Read},
    thread,
};

const INFORMATIONAL: [&str; 5] = ["Capturing on", "File:", "Packets:", "Duration:", "Avg"];
const FAILURE: [&str; 3] = ["error", "failed", "permission denied"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrKind {
    /// progress chatter of the capture tool
    Informational,
    Failure,
    Other,
}

impl StderrKind {
    pub fn classify(line: &str) -> Self {
        if INFORMATIONAL.iter().any(|m| line.contains(m)) {
            return StderrKind::Informational;
        }
        let lower = line.to_lowercase();
        if FAILURE.iter().any(|m| lower.contains(m)) {
            StderrKind::Failure
        } else {
            StderrKind::Other
        }
    }
}

pub fn log_lines<R>(stderr: R, run: u64)
where
    R: Read,
{
    for line in BufReader::new(stderr).lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                tracing::debug!(run, error = tracing::field::display(&error), "capture stderr closed");
                break;
            },
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match StderrKind::classify(line) {
            StderrKind::Informational => tracing::debug!(run, "capture tool: {}", line),
            StderrKind::Failure => tracing::error!(run, "capture tool: {}", line),
            StderrKind::Other => tracing::info!(run, "capture tool: {}", line),
        }
    }
}

pub fn spawn<R>(stderr: R, run: u64) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("capture-stderr".to_string())
        .spawn(move || log_lines(stderr, run))
}
