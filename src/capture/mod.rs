// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

mod command;
pub use self::command::CaptureCommand;

mod reader;
pub use self::reader::{pump, PumpReport, RunFlag, DEFAULT_BATCH_SIZE};

mod stderr;
pub use self::stderr::StderrKind;

mod session;
pub use self::session::{CaptureSession, CaptureStatus, StartOutcome, StopOutcome};
