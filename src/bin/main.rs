// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "pxmonitor")]
/// Network telemetry from a live tshark capture
struct Opt {
    #[structopt(long, parse(from_os_str))]
    /// Path to the config file, otherwise ./config.toml or /etc/pxmonitor/config.toml
    config: Option<PathBuf>,
    #[structopt(long)]
    /// Start capturing right away, regardless of the config
    autostart: bool,
}

fn main() -> anyhow::Result<()> {
    use std::{
        sync::{
            Arc,
            atomic::{Ordering, AtomicBool},
        },
        thread,
        time::Duration,
    };
    use tokio::runtime::Runtime;
    use pxmonitor::{
        System, server,
        capture::StartOutcome,
        query::CaptureControl,
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let opt = Opt::from_args();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))?;
    }

    let system = Arc::new(System::load_config(opt.config.as_deref())?);
    let port = system.config().http.port;

    let rt = Runtime::new()?;
    let addr = ([0, 0, 0, 0], port);
    let _server = rt.spawn(warp::serve(server::routes(system.clone())).run(addr));
    tracing::info!(port, "http server listening");

    if opt.autostart || system.config().capture.autostart {
        match system.start() {
            StartOutcome::Failed { reason } => tracing::error!(reason = reason.as_str(), "autostart failed"),
            outcome => tracing::info!(outcome = tracing::field::debug(&outcome), "autostart"),
        }
    }

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("shutting down");
    system.stop();
    system.join();
    rt.shutdown_timeout(Duration::from_secs(1));

    Ok(())
}
