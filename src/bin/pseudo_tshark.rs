// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]

use std::{
    io::{self, Write},
    process, thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use rand::{Rng, SeedableRng, rngs::SmallRng, seq::SliceRandom};
use structopt::StructOpt;

const HEADER: &str = "frame.time_epoch,ip.src,ip.dst,_ws.col.Protocol,frame.len,tcp.srcport,\
tcp.dstport,ip.ttl,tcp.flags,tcp.window_size_value,tcp.analysis.ack_rtt,\
tcp.analysis.retransmission,frame.time_delta";

const PROTOCOLS: [&str; 6] = ["TCP", "TLSv1.3", "HTTP", "UDP", "DNS", "QUIC"];
const SERVER_PORTS: [u16; 6] = [443, 80, 53, 22, 8080, 3000];

#[derive(StructOpt, Debug)]
#[structopt(name = "pseudo-tshark")]
/// Prints packet lines in the format of `tshark -T fields -E header=y -E separator=,`
struct Opt {
    #[structopt(long, default_value = "100")]
    /// Number of packet lines
    count: u64,
    #[structopt(long, default_value = "0")]
    /// Pause between lines, milliseconds
    interval_ms: u64,
    #[structopt(long)]
    /// Every n-th line is malformed
    malformed_every: Option<u64>,
    #[structopt(long, default_value = "0")]
    /// Exit code after the last line
    exit_code: i32,
    #[structopt(long)]
    /// Keep printing until killed
    follow: bool,
    #[structopt(long, default_value = "42")]
    seed: u64,
}

fn packet_line<R: Rng>(rng: &mut R, time: f64, delta: f64) -> String {
    let protocol = PROTOCOLS.choose(rng).copied().unwrap_or("TCP");
    let client = format!("192.168.1.{}", rng.gen_range(2..255));
    let server = format!("10.{}.{}.{}", rng.gen_range(0..255), rng.gen_range(0..255), rng.gen_range(1..255));
    let frame_len = rng.gen_range(60..1515);
    let ttl = *[64u8, 128, 255].choose(rng).unwrap_or(&64);

    let tcp = !matches!(protocol, "UDP" | "DNS" | "QUIC");
    let server_port = if protocol == "DNS" { 53 } else { *SERVER_PORTS.choose(rng).unwrap_or(&443) };
    let client_port = rng.gen_range(49152..65535);
    let (ports, flags, window, rtt, retransmission) = if tcp {
        let rtt = if rng.gen_bool(0.3) {
            format!("{:.6}", rng.gen_range(0.001..0.080))
        } else {
            String::new()
        };
        let retransmission = if rng.gen_bool(0.01) { "1" } else { "" };
        (
            format!("{},{}", client_port, server_port),
            format!("0x{:04x}", *[0x0010u16, 0x0018, 0x0002, 0x0011].choose(rng).unwrap_or(&0x0010)),
            rng.gen_range(500..65535).to_string(),
            rtt,
            retransmission,
        )
    } else {
        (",".to_string(), String::new(), String::new(), String::new(), "")
    };

    format!(
        "{:.6},{},{},{},{},{},{},{},{},{},{},{:.6}",
        time, client, server, protocol, frame_len, ports, ttl, flags, window, rtt, retransmission, delta,
    )
}

fn run(opt: &Opt) -> io::Result<()> {
    let mut rng = SmallRng::seed_from_u64(opt.seed);
    let interval = Duration::from_millis(opt.interval_ms);
    let mut time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    eprintln!("Capturing on 'pseudo0'");
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", HEADER)?;
    out.flush()?;

    let mut i = 0;
    while opt.follow || i < opt.count {
        i += 1;
        match opt.malformed_every {
            Some(n) if n > 0 && i % n == 0 => writeln!(out, "{:.6},garbage", time)?,
            _ => {
                let delta = rng.gen_range(0.0..0.01);
                time += delta;
                writeln!(out, "{}", packet_line(&mut rng, time, delta))?;
            },
        }
        out.flush()?;
        if opt.interval_ms > 0 {
            thread::sleep(interval);
        }
    }

    eprintln!("Packets: {}", i);
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    if let Err(error) = run(&opt) {
        // the reader closed the pipe
        if error.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("pseudo-tshark: error: {}", error);
            process::exit(2);
        }
    }
    process::exit(opt.exit_code);
}
