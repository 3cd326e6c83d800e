// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{convert::Infallible, sync::Arc};
use serde::Deserialize;
use serde_json::json;
use warp::{
    Filter, Rejection, Reply,
    reply::{WithStatus, Json, self},
    http::StatusCode,
};
use super::{
    capture::{StartOutcome, StopOutcome},
    export::ExportOutcome,
    query::{MetricsQuery, CaptureControl},
};

const DEFAULT_LIMIT: usize = 100;

#[derive(Deserialize)]
struct MetricsParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct InterfaceBody {
    name: String,
}

fn ok<T>(value: &T) -> WithStatus<Json>
where
    T: serde::Serialize,
{
    reply::with_status(reply::json(value), StatusCode::OK)
}

fn error(status: StatusCode, message: &str) -> WithStatus<Json> {
    reply::with_status(reply::json(&json!({ "error": message })), status)
}

// control operations block on the process and on thread joins
async fn blocking<F>(f: F) -> Result<WithStatus<Json>, Infallible>
where
    F: FnOnce() -> WithStatus<Json> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(reply) => Ok(reply),
        Err(e) => {
            tracing::error!(error = tracing::field::display(&e), "control task failed");
            Ok(error(StatusCode::INTERNAL_SERVER_ERROR, "control task failed"))
        },
    }
}

fn status<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + Sync + Send + 'static,
{
    warp::path!("v1" / "status")
        .and(warp::get())
        .map(move || ok(&system.summary()))
}

fn latest<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + Sync + Send + 'static,
{
    warp::path!("v1" / "metrics" / "latest")
        .and(warp::get())
        .map(move || match system.latest_snapshot() {
            Some(snapshot) => ok(&snapshot),
            None => error(StatusCode::SERVICE_UNAVAILABLE, "no metrics available"),
        })
}

fn metrics<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + Sync + Send + 'static,
{
    warp::path!("v1" / "metrics")
        .and(warp::get())
        .and(warp::query::query())
        .map(move |params: MetricsParams| {
            let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
            ok(&system.recent_snapshots(limit))
        })
}

fn total<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + Sync + Send + 'static,
{
    warp::path!("v1" / "total")
        .and(warp::get())
        .map(move || ok(&json!({ "total_bytes": system.total_bytes_transferred() })))
}

fn health<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + Sync + Send + 'static,
{
    warp::path!("v1" / "health")
        .and(warp::get())
        .map(move || match system.latest_health() {
            Some(report) => ok(&report),
            None => error(StatusCode::SERVICE_UNAVAILABLE, "no metrics available"),
        })
}

fn start<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: CaptureControl + Sync + Send + 'static,
{
    warp::path!("v1" / "capture" / "start")
        .and(warp::post())
        .and_then(move || {
            let system = system.clone();
            blocking(move || match system.start() {
                StartOutcome::Started => ok(&json!({ "status": "started" })),
                StartOutcome::AlreadyCapturing => ok(&json!({ "status": "already capturing" })),
                StartOutcome::Failed { reason } => reply::with_status(
                    reply::json(&json!({ "status": "failed", "error": reason })),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ),
            })
        })
}

fn stop<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: CaptureControl + Sync + Send + 'static,
{
    warp::path!("v1" / "capture" / "stop")
        .and(warp::post())
        .and_then(move || {
            let system = system.clone();
            blocking(move || match system.stop() {
                StopOutcome::Stopped => ok(&json!({ "status": "stopped" })),
                StopOutcome::NotCapturing => ok(&json!({ "status": "not capturing" })),
            })
        })
}

fn export<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: CaptureControl + Sync + Send + 'static,
{
    warp::path!("v1" / "export")
        .and(warp::post())
        .and_then(move || {
            let system = system.clone();
            blocking(move || {
                let outcome = system.export_records();
                let status = match &outcome {
                    ExportOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::OK,
                };
                reply::with_status(reply::json(&json!({ "message": outcome.message() })), status)
            })
        })
}

fn interface<S>(system: Arc<S>) -> impl Filter<Extract=(WithStatus<Json>, ), Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + CaptureControl + Sync + Send + 'static,
{
    let get = {
        let system = system.clone();
        warp::path!("v1" / "interface")
            .and(warp::get())
            .map(move || ok(&json!({ "interface": system.summary().interface })))
    };
    let set = warp::path!("v1" / "interface")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: InterfaceBody| match system.set_interface(&body.name) {
            Ok(message) => ok(&json!({ "message": message })),
            Err(message) => error(StatusCode::BAD_REQUEST, &message),
        });
    get.or(set).unify()
}

pub fn routes<S>(
    system: Arc<S>,
) -> impl Filter<Extract=impl Reply, Error=Rejection> + Clone + Sync + Send + 'static
where
    S: MetricsQuery + CaptureControl + Sync + Send + 'static,
{
    use warp::reply::with;

    status(system.clone())
        .or(latest(system.clone()))
        .or(metrics(system.clone()))
        .or(total(system.clone()))
        .or(health(system.clone()))
        .or(start(system.clone()))
        .or(stop(system.clone()))
        .or(export(system.clone()))
        .or(interface(system))
        .with(with::header("Content-Type", "application/json"))
        .with(with::header("Access-Control-Allow-Origin", "*"))
}
