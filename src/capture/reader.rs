// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    io::BufRead,
    str,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};
use crate::{record::PacketRecord, metrics::MetricsSnapshot, store::RetainedStore};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Run flag of one read loop.
///
/// Stores happen under the commit lock and only while the flag is set, so once
/// `stop` returns the loop never writes the store again.
#[derive(Debug)]
pub struct RunFlag {
    running: AtomicBool,
    commit: Mutex<()>,
}

impl RunFlag {
    pub fn new(running: bool) -> Self {
        RunFlag {
            running: AtomicBool::new(running),
            commit: Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Waits for a commit in progress.
    pub fn stop(&self) {
        let _commit = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        self.running.store(false, Ordering::Release);
    }

    fn commit<F>(&self, f: F) -> bool
    where
        F: FnOnce(),
    {
        let _commit = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_running() {
            return false;
        }
        f();
        true
    }
}

/// Counters of a finished read loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub records: usize,
    pub malformed: usize,
    pub batches: usize,
    /// records of the trailing incomplete batch, kept without a snapshot
    pub pending: usize,
}

/// Read lines until the end of the stream, a read error, or until `flag` is stopped.
///
/// Every `batch_size` valid records the batch goes into the `store` together
/// with its snapshot. When the stream ends the records of a trailing
/// incomplete batch are appended without a snapshot. A stopped loop drops them.
pub fn pump<R>(mut reader: R, store: &RetainedStore, batch_size: usize, flag: &RunFlag) -> PumpReport
where
    R: BufRead,
{
    let batch_size = batch_size.max(1);
    let mut report = PumpReport::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut buf = Vec::new();

    while flag.is_running() {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => (),
            Err(error) => {
                tracing::error!(error = tracing::field::display(&error), "failed to read capture output");
                break;
            },
        }
        let line = match str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(&['\n', '\r'][..]),
            Err(error) => {
                report.malformed += 1;
                tracing::warn!(
                    error = tracing::field::display(&error),
                    line = tracing::field::display(String::from_utf8_lossy(&buf).trim_end()),
                    "skipping capture line that is not UTF-8"
                );
                continue;
            },
        };
        if line.trim().is_empty() || PacketRecord::is_header_line(line) {
            continue;
        }

        match PacketRecord::parse_line(line) {
            Ok(record) => {
                report.records += 1;
                batch.push(record);
            },
            Err(error) => {
                report.malformed += 1;
                tracing::warn!(
                    error = tracing::field::display(&error),
                    line,
                    "skipping malformed capture line"
                );
                continue;
            },
        }

        if batch.len() >= batch_size {
            let snapshot = MetricsSnapshot::now(&batch);
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            if !flag.commit(|| store.commit_batch(full, snapshot)) {
                break;
            }
            report.batches += 1;
        }
    }

    // retained as records, but never reduced into a snapshot of its own
    if !batch.is_empty() {
        let pending = batch.len();
        if flag.commit(|| {
            store.append_records(batch);
        }) {
            report.pending = pending;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, BufReader, Cursor, Read},
        sync::Arc,
    };
    use super::*;

    fn line(i: usize) -> String {
        format!("{}.0,10.0.0.1,10.0.0.2,TCP,{},53422,443,64,0x0018,501,0.02,0,0.001\n", i, 60 + i)
    }

    #[test]
    fn trailing_records_have_no_snapshot() {
        let mut input = "frame.time_epoch,ip.src,ip.dst\n".to_string();
        for i in 0..250 {
            input.push_str(&line(i));
        }
        let store = RetainedStore::default();
        let report = pump(Cursor::new(input), &store, DEFAULT_BATCH_SIZE, &RunFlag::new(true));
        assert_eq!(report.records, 250);
        assert_eq!(report.batches, 2);
        assert_eq!(report.pending, 50);
        assert_eq!(report.malformed, 0);
        assert_eq!(store.record_count(), 250);
        assert_eq!(store.snapshot_count(), 2);
        assert_eq!(store.batch_records(100).last().map(|r| r.frame_len), Some(60 + 199));
        assert_eq!(store.latest_snapshot().map(|s| s.packet_count), Some(100));
    }

    #[test]
    fn malformed_line_is_skipped() {
        let input = format!("1.0,10.0.0.1,10.0.0.2,TCP,60\n\n{}", line(1));
        let store = RetainedStore::default();
        let report = pump(Cursor::new(input), &store, 1, &RunFlag::new(true));
        assert_eq!(report.malformed, 1);
        assert_eq!(report.records, 1);
        assert_eq!(store.records()[0].frame_len, 61);
    }

    #[test]
    fn crlf_line_endings() {
        let input = line(3).replace('\n', "\r\n");
        let store = RetainedStore::default();
        let report = pump(Cursor::new(input), &store, 1, &RunFlag::new(true));
        assert_eq!(report.records, 1);
        assert_eq!(store.records()[0].time_delta, Some(0.001));
    }

    #[test]
    fn stops_when_not_running() {
        let input = (0..10).map(line).collect::<String>();
        let store = RetainedStore::default();
        let report = pump(Cursor::new(input), &store, 1, &RunFlag::new(false));
        assert_eq!(report, PumpReport::default());
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn stopped_flag_rejects_commit() {
        let flag = RunFlag::new(true);
        assert!(flag.commit(|| ()));
        flag.stop();
        assert!(!flag.is_running());
        assert!(!flag.commit(|| panic!("committed after stop")));
    }

    // clears the flag once the data is exhausted, like a Stop racing the end of output
    struct StopAtEnd {
        data: Cursor<String>,
        flag: Arc<RunFlag>,
    }

    impl Read for StopAtEnd {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                self.flag.stop();
            }
            Ok(n)
        }
    }

    #[test]
    fn stopped_run_drops_partial_batch() {
        let flag = Arc::new(RunFlag::new(true));
        let input = StopAtEnd {
            data: Cursor::new((0..150).map(line).collect()),
            flag: flag.clone(),
        };
        let store = RetainedStore::default();
        let report = pump(BufReader::new(input), &store, 100, &flag);
        assert_eq!(report.records, 150);
        assert_eq!(report.batches, 1);
        assert_eq!(report.pending, 0);
        assert_eq!(store.record_count(), 100);
        assert_eq!(store.snapshot_count(), 1);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "pipe broke"))
        }
    }

    #[test]
    fn read_error_ends_loop() {
        let input = Cursor::new(line(0)).chain(Broken);
        let store = RetainedStore::default();
        let report = pump(BufReader::new(input), &store, 1, &RunFlag::new(true));
        assert_eq!(report.records, 1);
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut input = line(0).into_bytes();
        input.extend_from_slice(b"1.5,10.0.0.1,10.0.0.2,T\xffCP,60,53422,443,64,0x0018,501,0.02,0,0.001\n");
        for i in 1..4 {
            input.extend_from_slice(line(i).as_bytes());
        }
        let store = RetainedStore::default();
        let report = pump(Cursor::new(input), &store, 100, &RunFlag::new(true));
        assert_eq!(report.records, 4);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.pending, 4);
        assert_eq!(store.record_count(), 4);
        assert_eq!(store.records().last().map(|r| r.frame_len), Some(63));
    }
}
