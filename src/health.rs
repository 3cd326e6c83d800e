// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use super::{record::PacketRecord, metrics::MetricsSnapshot};

const TOP_APPLICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Congestion {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Unstable,
    #[serde(rename = "Very Unstable")]
    VeryUnstable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationUsage {
    pub application: String,
    pub bytes: u64,
}

/// Derived view of a batch, computed on demand, never retained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// retransmitted share of the batch, percent
    pub packet_loss: f64,
    /// mean inter-frame delta of DNS packets, milliseconds
    pub dns_delay: f64,
    pub avg_window: f64,
    pub congestion: Congestion,
    pub stability: Stability,
    pub health_score: u8,
    pub top_applications: Vec<ApplicationUsage>,
}

impl Default for HealthReport {
    fn default() -> Self {
        HealthReport {
            packet_loss: 0.0,
            dns_delay: 0.0,
            avg_window: 0.0,
            congestion: Congestion::Low,
            stability: Stability::Stable,
            health_score: 50,
            top_applications: Vec::new(),
        }
    }
}

impl HealthReport {
    /// The `snapshot` must be the reduction of `records`.
    pub fn assess(records: &[PacketRecord], snapshot: &MetricsSnapshot) -> Self {
        if records.is_empty() {
            return HealthReport::default();
        }

        let retransmitted = records.iter().filter(|r| r.retransmission).count();
        let packet_loss = retransmitted as f64 / records.len() as f64 * 100.0;

        let dns_delay = mean(
            records
                .iter()
                .filter(|r| r.protocol == "DNS")
                .filter_map(|r| r.time_delta),
        ) * 1000.0;
        let avg_window = mean(records.iter().filter_map(|r| r.window_size).map(f64::from));

        let congestion = Congestion::new(avg_window, snapshot.bandwidth);
        let stability = Stability::new(snapshot.jitter, packet_loss);
        let health_score = score(snapshot, packet_loss, dns_delay);

        HealthReport {
            packet_loss,
            dns_delay,
            avg_window,
            congestion,
            stability,
            health_score,
            top_applications: top_applications(records, TOP_APPLICATIONS),
        }
    }
}

impl Congestion {
    fn new(avg_window: f64, bandwidth: f64) -> Self {
        if avg_window > 8000.0 && bandwidth > 5.0 {
            Congestion::Low
        } else if avg_window > 4000.0 || bandwidth > 2.0 {
            Congestion::Moderate
        } else {
            Congestion::High
        }
    }
}

impl Stability {
    fn new(jitter: f64, packet_loss: f64) -> Self {
        if jitter < 10.0 && packet_loss < 1.0 {
            Stability::Stable
        } else if jitter < 30.0 && packet_loss < 5.0 {
            Stability::Unstable
        } else {
            Stability::VeryUnstable
        }
    }
}

fn score(snapshot: &MetricsSnapshot, packet_loss: f64, dns_delay: f64) -> u8 {
    let latency = (100.0 - snapshot.latency / 2.0).max(0.0) * 0.3;
    let jitter = (100.0 - snapshot.jitter * 2.0).max(0.0) * 0.2;
    let loss = (100.0 - packet_loss * 10.0).max(0.0) * 0.25;
    let bandwidth = (snapshot.bandwidth * 10.0).min(100.0) * 0.15;
    let dns = (100.0 - dns_delay * 2.0).max(0.0) * 0.1;

    let total = (latency + jitter + loss + bandwidth + dns).round();
    if total.is_nan() {
        return 1;
    }
    total.max(1.0).min(100.0) as u8
}

fn mean<I>(samples: I) -> f64
where
    I: Iterator<Item = f64>,
{
    let (sum, count) = samples.fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Well known service name of the port, if any.
pub fn service_name(port: u16) -> Option<&'static str> {
    let name = match port {
        20 => "FTP-DATA",
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        67 | 68 => "DHCP",
        69 => "TFTP",
        80 => "HTTP",
        110 => "POP3",
        123 => "NTP",
        137 => "NetBIOS-NS",
        138 => "NetBIOS-DGM",
        139 => "NetBIOS-SSN",
        143 => "IMAP",
        161 => "SNMP",
        162 => "SNMP-TRAP",
        179 => "BGP",
        389 => "LDAP",
        443 => "HTTPS",
        465 => "SMTPS",
        514 => "Syslog",
        587 => "SMTP-Submission",
        636 => "LDAPS",
        993 => "IMAPS",
        995 => "POP3S",
        1080 => "SOCKS",
        1194 => "OpenVPN",
        1433 => "MSSQL",
        1521 => "Oracle DB",
        1723 => "PPTP",
        1812 => "RADIUS",
        2049 => "NFS",
        2082 => "cPanel",
        2083 => "cPanel-SSL",
        3306 => "MySQL",
        3389 => "RDP",
        3690 => "Subversion",
        4444 => "Metasploit",
        5000 => "UPnP",
        5432 => "PostgreSQL",
        5631 => "PCAnywhere",
        5900 => "VNC",
        6379 => "Redis",
        8080 => "HTTP-Alt",
        8443 => "HTTPS-Alt",
        8888 => "Alternate HTTP",
        9001 => "Tor ORPort",
        9200 => "Elasticsearch",
        10000 => "Webmin",
        27017 => "MongoDB",
        50000 => "SAP",
        64738 => "Mumble",
        _ => return None,
    };
    Some(name)
}

fn application(record: &PacketRecord) -> String {
    let known = record
        .tcp_src_port
        .and_then(service_name)
        .or_else(|| record.tcp_dst_port.and_then(service_name));
    if let Some(name) = known {
        return name.to_string();
    }
    match record.tcp_dst_port {
        Some(port) if port > 1024 && port < 49151 => format!("App-Port-{}", port),
        _ => record.protocol.clone(),
    }
}

/// Applications ordered by transferred bytes, largest first.
pub fn top_applications(records: &[PacketRecord], limit: usize) -> Vec<ApplicationUsage> {
    let mut usage = HashMap::<String, u64>::new();
    for record in records {
        *usage.entry(application(record)).or_insert(0) += record.frame_len;
    }

    let mut usage = usage
        .into_iter()
        .map(|(application, bytes)| ApplicationUsage { application, bytes })
        .collect::<Vec<_>>();
    usage.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.application.cmp(&b.application)));
    usage.truncate(limit);
    usage
}
