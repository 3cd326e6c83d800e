// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};
use serde_json::Value;
use warp::http::StatusCode;
use pxmonitor::{
    capture::{CaptureStatus, StartOutcome, StopOutcome},
    export::ExportOutcome,
    health::HealthReport,
    metrics::MetricsSnapshot,
    query::{CaptureControl, MetricsQuery, Summary},
    record::PacketRecord,
    server,
};

struct Mock {
    status: Mutex<CaptureStatus>,
    interface: Mutex<String>,
    snapshots: Vec<MetricsSnapshot>,
}

impl Mock {
    fn new(snapshots: usize) -> Arc<Self> {
        let batch = ["1.0,a,b,TCP,100,,,,,,,,", "2.0,a,b,UDP,300,,,,,,,,"]
            .iter()
            .map(|l| l.parse::<PacketRecord>().unwrap())
            .collect::<Vec<_>>();
        Arc::new(Mock {
            status: Mutex::new(CaptureStatus::Idle),
            interface: Mutex::new("eth0".to_string()),
            snapshots: (0..snapshots).map(|_| MetricsSnapshot::now(&batch)).collect(),
        })
    }
}

impl MetricsQuery for Mock {
    fn current_status(&self) -> CaptureStatus {
        *self.status.lock().unwrap()
    }

    fn latest_snapshot(&self) -> Option<MetricsSnapshot> {
        self.snapshots.last().cloned()
    }

    fn recent_snapshots(&self, n: usize) -> Vec<MetricsSnapshot> {
        let skip = self.snapshots.len().saturating_sub(n);
        self.snapshots[skip..].to_vec()
    }

    fn total_bytes_transferred(&self) -> u64 {
        self.snapshots.iter().flat_map(|s| s.packet_sizes.iter()).sum()
    }

    fn latest_health(&self) -> Option<HealthReport> {
        self.snapshots.last().map(|_| HealthReport::default())
    }

    fn summary(&self) -> Summary {
        Summary {
            status: self.current_status(),
            interface: Some(self.interface.lock().unwrap().clone()),
            records: self.snapshots.len() * 2,
            snapshots: self.snapshots.len(),
        }
    }
}

impl CaptureControl for Mock {
    fn start(&self) -> StartOutcome {
        let mut status = self.status.lock().unwrap();
        if *status == CaptureStatus::Capturing {
            StartOutcome::AlreadyCapturing
        } else {
            *status = CaptureStatus::Capturing;
            StartOutcome::Started
        }
    }

    fn stop(&self) -> StopOutcome {
        let mut status = self.status.lock().unwrap();
        if *status == CaptureStatus::Capturing {
            *status = CaptureStatus::Stopped;
            StopOutcome::Stopped
        } else {
            StopOutcome::NotCapturing
        }
    }

    fn export_records(&self) -> ExportOutcome {
        if self.snapshots.is_empty() {
            ExportOutcome::NoData
        } else {
            ExportOutcome::Saved {
                identifier: "network_data_20240309_070501.csv".to_string(),
                path: "network_data_20240309_070501.csv".into(),
                records: 2,
            }
        }
    }

    fn set_interface(&self, name: &str) -> Result<String, String> {
        if name.is_empty() {
            return Err("interface name must not be empty".to_string());
        }
        *self.interface.lock().unwrap() = name.to_string();
        Ok(format!("Interface set to {}", name))
    }
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn status_and_cors() {
    let routes = server::routes(Mock::new(0));
    let res = warp::test::request().method("GET").path("/v1/status").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    let body = json(res.body());
    assert_eq!(body["status"], "Idle");
    assert_eq!(body["interface"], "eth0");
}

#[tokio::test]
async fn metrics_when_empty() {
    let routes = server::routes(Mock::new(0));
    let res = warp::test::request().path("/v1/metrics/latest").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(res.body())["error"], "no metrics available");

    let res = warp::test::request().path("/v1/health").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = warp::test::request().path("/v1/metrics").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res.body()), Value::Array(vec![]));
}

#[tokio::test]
async fn metrics_with_limit() {
    let routes = server::routes(Mock::new(5));
    let res = warp::test::request().path("/v1/metrics?limit=3").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res.body()).as_array().map(Vec::len), Some(3));

    let res = warp::test::request().path("/v1/metrics").reply(&routes).await;
    assert_eq!(json(res.body()).as_array().map(Vec::len), Some(5));

    let res = warp::test::request().path("/v1/metrics/latest").reply(&routes).await;
    let latest = json(res.body());
    assert_eq!(latest["packet_count"], 2);
    assert_eq!(latest["packet_sizes"], serde_json::json!([100, 300]));

    let res = warp::test::request().path("/v1/total").reply(&routes).await;
    assert_eq!(json(res.body())["total_bytes"], 2000);

    let res = warp::test::request().path("/v1/health").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res.body())["health_score"], 50);
}

#[tokio::test]
async fn capture_control() {
    let routes = server::routes(Mock::new(1));
    let post = |path: &'static str| warp::test::request().method("POST").path(path);

    let res = post("/v1/capture/start").reply(&routes).await;
    assert_eq!(json(res.body())["status"], "started");
    let res = post("/v1/capture/start").reply(&routes).await;
    assert_eq!(json(res.body())["status"], "already capturing");
    let res = post("/v1/capture/stop").reply(&routes).await;
    assert_eq!(json(res.body())["status"], "stopped");
    let res = post("/v1/capture/stop").reply(&routes).await;
    assert_eq!(json(res.body())["status"], "not capturing");

    let res = post("/v1/export").reply(&routes).await;
    assert_eq!(json(res.body())["message"], "Data saved to network_data_20240309_070501.csv");

    let res = warp::test::request().method("GET").path("/v1/capture/start").reply(&routes).await;
    assert_ne!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn export_without_data() {
    let routes = server::routes(Mock::new(0));
    let res = warp::test::request().method("POST").path("/v1/export").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res.body())["message"], "No data to save");
}

#[tokio::test]
async fn interface_selection() {
    let routes = server::routes(Mock::new(0));
    let res = warp::test::request()
        .method("POST")
        .path("/v1/interface")
        .json(&serde_json::json!({ "name": "wlan0" }))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res.body())["message"], "Interface set to wlan0");

    let res = warp::test::request().path("/v1/interface").reply(&routes).await;
    assert_eq!(json(res.body())["interface"], "wlan0");

    let res = warp::test::request()
        .method("POST")
        .path("/v1/interface")
        .json(&serde_json::json!({ "name": "" }))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
