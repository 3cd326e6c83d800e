// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    io::BufReader,
    process::Child,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
};
use serde::{Serialize, Deserialize};
use crate::store::RetainedStore;
use super::{command::CaptureCommand, reader::{self, RunFlag}, stderr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    Started,
    AlreadyCapturing,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOutcome {
    Stopped,
    NotCapturing,
}

struct Inner {
    status: CaptureStatus,
    command: CaptureCommand,
    // increments on every start, a finished loop only touches its own run
    run: u64,
    running: Arc<RunFlag>,
    child: Option<Child>,
    reader: Option<thread::JoinHandle<()>>,
    stderr: Option<thread::JoinHandle<()>>,
    // threads of stopped runs whose output may still be open
    retired: Vec<thread::JoinHandle<()>>,
}

/// Lifecycle of the external capture process and its read loop.
///
/// At most one read loop writes the store at any time. A stopped loop may
/// outlive its run while something else holds the pipe open, but its run flag
/// no longer lets it commit.
pub struct CaptureSession {
    control: Mutex<()>,
    inner: Arc<Mutex<Inner>>,
    store: Arc<RetainedStore>,
    batch_size: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_thread(handle: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            tracing::error!("capture thread panicked");
        }
    }
}

fn reap(mut child: Child, run: u64) {
    match child.wait() {
        Ok(status) if status.success() => tracing::info!(run, "capture process exited"),
        Ok(status) => tracing::warn!(run, status = tracing::field::display(&status), "capture process exited with failure"),
        Err(error) => tracing::warn!(run, error = tracing::field::display(&error), "cannot reap capture process"),
    }
}

impl CaptureSession {
    pub fn new(command: CaptureCommand, store: Arc<RetainedStore>, batch_size: usize) -> Self {
        CaptureSession {
            control: Mutex::new(()),
            inner: Arc::new(Mutex::new(Inner {
                status: CaptureStatus::Idle,
                command,
                run: 0,
                running: Arc::new(RunFlag::new(false)),
                child: None,
                reader: None,
                stderr: None,
                retired: Vec::new(),
            })),
            store,
            batch_size,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        lock(&self.inner).status
    }

    pub fn interface(&self) -> Option<String> {
        lock(&self.inner).command.interface().map(str::to_string)
    }

    pub fn store(&self) -> &Arc<RetainedStore> {
        &self.store
    }

    pub fn start(&self) -> StartOutcome {
        let _control = lock(&self.control);

        let mut inner = lock(&self.inner);
        if inner.status == CaptureStatus::Capturing {
            return StartOutcome::AlreadyCapturing;
        }
        // the loop of a stopped run may still be unwinding, it is joined later
        let previous = inner.reader.take().into_iter().chain(inner.stderr.take());
        let (finished, unwinding) = previous
            .chain(inner.retired.drain(..))
            .partition::<Vec<_>, _>(|handle| handle.is_finished());
        inner.retired = unwinding;
        finished.into_iter().for_each(|handle| join_thread(Some(handle)));

        let mut child = match inner.command.spawn() {
            Ok(child) => child,
            Err(error) => {
                tracing::error!(
                    program = inner.command.program(),
                    error = tracing::field::display(&error),
                    "failed to start capture process"
                );
                inner.status = CaptureStatus::Idle;
                return StartOutcome::Failed {
                    reason: format!("failed to start {}: {}", inner.command.program(), error),
                };
            },
        };

        let (stdout, stderr_pipe) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                inner.status = CaptureStatus::Idle;
                return StartOutcome::Failed {
                    reason: "capture process has no output pipes".to_string(),
                };
            },
        };

        let run = inner.run + 1;
        let running = Arc::new(RunFlag::new(true));

        let stderr_thread = match stderr::spawn(stderr_pipe, run) {
            Ok(handle) => handle,
            Err(error) => return self.abort_start(&mut inner, child, error),
        };

        let reader_thread = {
            let inner_ref = self.inner.clone();
            let store = self.store.clone();
            let running = running.clone();
            let batch_size = self.batch_size;
            thread::Builder::new()
                .name("capture-reader".to_string())
                .spawn(move || {
                    let report = reader::pump(BufReader::new(stdout), &store, batch_size, &running);
                    tracing::info!(
                        run,
                        records = report.records,
                        malformed = report.malformed,
                        batches = report.batches,
                        unbatched = report.pending,
                        "capture output ended"
                    );
                    finish_run(&inner_ref, run);
                })
        };
        let reader_thread = match reader_thread {
            Ok(handle) => handle,
            Err(error) => {
                let outcome = self.abort_start(&mut inner, child, error);
                join_thread(Some(stderr_thread));
                return outcome;
            },
        };

        tracing::info!(run, program = inner.command.program(), pid = child.id(), "capture started");
        inner.run = run;
        inner.running = running;
        inner.child = Some(child);
        inner.reader = Some(reader_thread);
        inner.stderr = Some(stderr_thread);
        inner.status = CaptureStatus::Capturing;

        StartOutcome::Started
    }

    fn abort_start(&self, inner: &mut Inner, mut child: Child, error: std::io::Error) -> StartOutcome {
        tracing::error!(error = tracing::field::display(&error), "failed to spawn capture thread");
        let _ = child.kill();
        let _ = child.wait();
        inner.status = CaptureStatus::Idle;
        StartOutcome::Failed {
            reason: format!("failed to spawn capture thread: {}", error),
        }
    }

    /// Kills the process and returns, the read loop finishes on its own.
    pub fn stop(&self) -> StopOutcome {
        let _control = lock(&self.control);

        let (child, run) = {
            let mut inner = lock(&self.inner);
            if inner.status != CaptureStatus::Capturing {
                return StopOutcome::NotCapturing;
            }
            inner.running.stop();
            inner.status = CaptureStatus::Stopped;
            (inner.child.take(), inner.run)
        };

        if let Some(mut child) = child {
            if let Err(error) = child.kill() {
                tracing::warn!(run, error = tracing::field::display(&error), "cannot kill capture process");
            }
            reap(child, run);
        }
        tracing::info!(run, "capture stopped");

        StopOutcome::Stopped
    }

    /// Block until the read loops and stderr threads of all runs are finished.
    pub fn join(&self) {
        let handles = {
            let mut inner = lock(&self.inner);
            let mut handles = inner.retired.drain(..).collect::<Vec<_>>();
            handles.extend(inner.reader.take());
            handles.extend(inner.stderr.take());
            handles
        };
        handles.into_iter().for_each(|handle| join_thread(Some(handle)));
    }

    pub fn set_interface(&self, name: &str) -> Result<String, String> {
        let _control = lock(&self.control);

        let mut inner = lock(&self.inner);
        inner.command.set_interface(name)?;
        let name = inner.command.interface().unwrap_or(name).to_string();
        tracing::info!(interface = name.as_str(), "capture interface selected");
        if inner.status == CaptureStatus::Capturing {
            Ok(format!("Interface set to {}, restart the capture to apply", name))
        } else {
            Ok(format!("Interface set to {}", name))
        }
    }
}

// the exit path of a read loop, takes only the state lock
fn finish_run(inner: &Mutex<Inner>, run: u64) {
    let child = {
        let mut inner = lock(inner);
        if inner.run != run {
            return;
        }
        if inner.status == CaptureStatus::Capturing {
            inner.status = CaptureStatus::Idle;
        }
        inner.child.take()
    };
    if let Some(child) = child {
        reap(child, run);
    }
}
