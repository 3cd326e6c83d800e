// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    io,
    process::{Child, Command, Stdio},
};

// order of the fields is the contract with `PacketRecord::parse_line`
const TSHARK_FIELDS: [&str; 13] = [
    "frame.time_epoch",
    "ip.src",
    "ip.dst",
    "_ws.col.Protocol",
    "frame.len",
    "tcp.srcport",
    "tcp.dstport",
    "ip.ttl",
    "tcp.flags",
    "tcp.window_size_value",
    "tcp.analysis.ack_rtt",
    "tcp.analysis.retransmission",
    "frame.time_delta",
];

#[derive(Debug, Clone, PartialEq)]
enum Args {
    Tshark { interface: String },
    Custom(Vec<String>),
}

/// The external program producing the packet lines
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCommand {
    program: String,
    args: Args,
}

impl CaptureCommand {
    pub fn tshark<P, I>(program: P, interface: I) -> Self
    where
        P: Into<String>,
        I: Into<String>,
    {
        CaptureCommand {
            program: program.into(),
            args: Args::Tshark {
                interface: interface.into(),
            },
        }
    }

    pub fn new<P, A>(program: P, args: A) -> Self
    where
        P: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        CaptureCommand {
            program: program.into(),
            args: Args::Custom(args.into_iter().map(Into::into).collect()),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn interface(&self) -> Option<&str> {
        match &self.args {
            Args::Tshark { interface } => Some(interface),
            Args::Custom(_) => None,
        }
    }

    pub fn set_interface(&mut self, name: &str) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("interface name must not be empty".to_string());
        }
        match &mut self.args {
            Args::Tshark { interface } => {
                *interface = name.to_string();
                Ok(())
            },
            Args::Custom(_) => Err(format!(
                "capture command {} takes fixed arguments, cannot select an interface",
                self.program,
            )),
        }
    }

    pub fn args(&self) -> Vec<String> {
        match &self.args {
            Args::Tshark { interface } => {
                let mut args = vec![
                    "-i".to_string(),
                    interface.clone(),
                    "-l".to_string(),
                    "-T".to_string(),
                    "fields".to_string(),
                    "-E".to_string(),
                    "header=y".to_string(),
                    "-E".to_string(),
                    "separator=,".to_string(),
                ];
                for field in &TSHARK_FIELDS {
                    args.push("-e".to_string());
                    args.push(field.to_string());
                }
                args
            },
            Args::Custom(args) => args.clone(),
        }
    }

    /// Spawn with stdin closed, stdout and stderr piped.
    pub fn spawn(&self) -> io::Result<Child> {
        Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}
