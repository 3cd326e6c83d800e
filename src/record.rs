// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::str::FromStr;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// One packet as reported by the capture tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub time: Option<f64>,
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: String,
    pub frame_len: u64,
    pub tcp_src_port: Option<u16>,
    pub tcp_dst_port: Option<u16>,
    pub ttl: Option<u8>,
    pub tcp_flags: Option<u16>,
    pub window_size: Option<u32>,
    pub ack_rtt: Option<f64>,
    pub retransmission: bool,
    pub time_delta: Option<f64>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("expected 13 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid value {value:?} in field {field}")]
    InvalidField {
        field: &'static str,
        value: String,
    },
}

const UNKNOWN: &str = "Unknown";

impl PacketRecord {
    pub const FIELD_COUNT: usize = 13;

    /// Column names, in the positional order of the capture output.
    pub const CSV_FIELDS: [&'static str; 13] = [
        "time",
        "src_ip",
        "dst_ip",
        "protocol",
        "frame_len",
        "tcp_src_port",
        "tcp_dst_port",
        "ttl",
        "tcp_flags",
        "window_size",
        "ack_rtt",
        "retransmission",
        "time_delta",
    ];

    /// Parse one comma separated line, fields beyond the thirteenth are ignored.
    ///
    /// The line looks like:
    /// 1690000000.123456,192.168.1.5,142.250.74.46,TLSv1.3,1514,53422,443,64,0x0018,501,0.021,,0.000113
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let fields = line
            .trim_end_matches(|c| c == '\r' || c == '\n')
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>();
        if fields.len() < Self::FIELD_COUNT {
            return Err(ParseError::FieldCount(fields.len()));
        }

        Ok(PacketRecord {
            time: optional("time", fields[0])?,
            src_ip: label(fields[1]),
            dst_ip: label(fields[2]),
            protocol: label(fields[3]),
            frame_len: optional("frame_len", fields[4])?.unwrap_or(0),
            tcp_src_port: optional("tcp_src_port", fields[5])?,
            tcp_dst_port: optional("tcp_dst_port", fields[6])?,
            ttl: optional("ttl", fields[7])?,
            tcp_flags: tcp_flags(fields[8])?,
            window_size: optional("window_size", fields[9])?,
            ack_rtt: optional("ack_rtt", fields[10])?,
            retransmission: optional::<i64>("retransmission", fields[11])?.unwrap_or(0) != 0,
            time_delta: optional("time_delta", fields[12])?,
        })
    }

    /// The capture tool prints the requested field names as the first line.
    pub fn is_header_line(line: &str) -> bool {
        line.trim_start().starts_with("frame.time_epoch")
    }
}

impl FromStr for PacketRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

fn label(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

fn optional<T>(field: &'static str, value: &str) -> Result<Option<T>, ParseError>
where
    T: FromStr,
{
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

// either `0x0018` or a plain number
fn tcp_flags(value: &str) -> Result<Option<u16>, ParseError> {
    let invalid = || ParseError::InvalidField {
        field: "tcp_flags",
        value: value.to_string(),
    };

    if value.is_empty() {
        return Ok(None);
    }
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        return u16::from_str_radix(hex, 16).map(Some).map_err(|_| invalid());
    }
    if let Ok(flags) = value.parse::<u16>() {
        return Ok(Some(flags));
    }
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= 0.0 && f <= u16::MAX as f64 => Ok(Some(f as u16)),
        _ => Err(invalid()),
    }
}
