//! HTTP dashboard and operator JSON API.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    body::Incoming, server::conn::http1, service::service_fn, Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use metrics_store::{unix_timestamp, MetricsStore, StoreError};
use miner_probe::miner::{self, MinerApi};
use serde_json::json;
use std::{
    convert::Infallible,
    sync::{Arc, OnceLock},
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::fmt::{format_elapsed_time, format_hashrate};

static DASHBOARD_PAGE_HTML: OnceLock<String> = OnceLock::new();

const DASHBOARD_PAGE_TEMPLATE: &str = include_str!("../templates/dashboard.html");

/// Everything the request handlers need.
pub struct DashContext {
    pub store: MetricsStore,
    pub miner_api: MinerApi,
    pub probe_host: String,
    pub retention_days: i64,
    pub client_poll_interval_secs: u64,
}

pub async fn run_http_server(
    address: String,
    ctx: Arc<DashContext>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&address).await?;
    info!("🌐 dashboard listening on http://{}", address);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let ctx = ctx.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let ctx = ctx.clone();
                async move { handle_request(req, ctx).await }
            });

            if let Err(err) = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<DashContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let response = match (req.method(), path.as_str()) {
        (&Method::GET, "/") => dashboard_page(&ctx),
        (&Method::GET, "/health") => serve_health(&ctx).await,
        (&Method::GET, "/api/totals") => serve_totals(&ctx).await,
        (&Method::GET, "/api/miners") => serve_miners(&ctx, &query).await,
        (&Method::GET, "/api/pool") => serve_pool_stats(&ctx).await,
        (&Method::GET, "/api/alerts") => serve_alerts(&ctx, &query).await,
        (&Method::POST, "/api/alerts/ack-all") => ack_all_alerts(&ctx).await,
        (&Method::POST, "/api/purge") => purge(&ctx).await,
        (&Method::POST, "/api/probe") => reprobe(&ctx).await,
        (&Method::GET, path) if path.starts_with("/api/miners/") && path.ends_with("/history") => {
            let host = path
                .trim_start_matches("/api/miners/")
                .trim_end_matches("/history");
            serve_miner_history(&ctx, host, &query).await
        }
        (&Method::DELETE, path) if path.starts_with("/api/miners/") => {
            delete_miner(&ctx, path.trim_start_matches("/api/miners/")).await
        }
        (&Method::GET, path) if path.starts_with("/api/pool/") && path.ends_with("/history") => {
            let address = path
                .trim_start_matches("/api/pool/")
                .trim_end_matches("/history");
            serve_pool_history(&ctx, address, &query).await
        }
        (&Method::POST, path) if path.starts_with("/api/alerts/") && path.ends_with("/ack") => {
            let id = path
                .trim_start_matches("/api/alerts/")
                .trim_end_matches("/ack");
            ack_alert(&ctx, id).await
        }
        (&Method::DELETE, path) if path.starts_with("/api/alerts/") => {
            delete_alert(&ctx, path.trim_start_matches("/api/alerts/")).await
        }
        _ => {
            let mut response = Response::new(Full::new(Bytes::from("Not Found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    };

    Ok(response)
}

fn dashboard_page(ctx: &DashContext) -> Response<Full<Bytes>> {
    let interval_ms = ctx.client_poll_interval_secs * 1000;
    let html = DASHBOARD_PAGE_HTML.get_or_init(|| {
        DASHBOARD_PAGE_TEMPLATE.replace("{client_poll_interval_ms}", &interval_ms.to_string())
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(html.clone())))
        .unwrap()
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

fn store_error(context: &str, e: StoreError) -> Response<Full<Bytes>> {
    error!("{}: {}", context, e);
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": e.to_string() }),
    )
}

fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::BAD_REQUEST, json!({ "error": message }))
}

/// Extract one query parameter value by key.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|param| {
        param
            .split_once('=')
            .and_then(|(k, v)| (k == key).then_some(v))
    })
}

fn hours_param(query: &str) -> i64 {
    query_param(query, "hours")
        .and_then(|v| v.parse().ok())
        .unwrap_or(24)
}

async fn serve_health(ctx: &DashContext) -> Response<Full<Bytes>> {
    match ctx.store.totals().await {
        Ok(_) => json_response(StatusCode::OK, json!({ "healthy": true })),
        Err(e) => {
            error!("health check failed: {}", e);
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "healthy": false }),
            )
        }
    }
}

async fn serve_totals(ctx: &DashContext) -> Response<Full<Bytes>> {
    match ctx.store.totals().await {
        Ok(totals) => json_response(
            StatusCode::OK,
            serde_json::to_value(totals).unwrap_or_default(),
        ),
        Err(e) => store_error("totals query", e),
    }
}

async fn serve_miners(ctx: &DashContext, query: &str) -> Response<Full<Bytes>> {
    let online_only = query_param(query, "online") == Some("true");

    match ctx.store.list_miners(online_only).await {
        Ok(miners) => {
            let now = unix_timestamp();
            let data: Vec<_> = miners
                .iter()
                .map(|m| {
                    json!({
                        "host": m.host,
                        "status": m.status,
                        "hashrate": m.hashrate,
                        "hashrate_text": m.hashrate.map(format_hashrate),
                        "cpu_usage": m.cpu_usage,
                        "ram_usage": m.ram_usage,
                        "last_seen": m.last_seen,
                        "last_seen_text": format_elapsed_time(now, m.last_seen),
                    })
                })
                .collect();
            json_response(StatusCode::OK, json!({ "miners": data }))
        }
        Err(e) => store_error("miners query", e),
    }
}

async fn serve_miner_history(
    ctx: &DashContext,
    host: &str,
    query: &str,
) -> Response<Full<Bytes>> {
    if host.is_empty() {
        return bad_request("missing host");
    }

    match ctx.store.miner_history(host, hours_param(query)).await {
        Ok(samples) => json_response(
            StatusCode::OK,
            json!({ "host": host, "samples": samples }),
        ),
        Err(e) => store_error("miner history query", e),
    }
}

async fn delete_miner(ctx: &DashContext, host: &str) -> Response<Full<Bytes>> {
    if host.is_empty() {
        return bad_request("missing host");
    }

    match ctx.store.delete_miner(host).await {
        Ok(()) => json_response(StatusCode::OK, json!({ "deleted": host })),
        Err(e) => store_error("miner delete", e),
    }
}

async fn serve_pool_stats(ctx: &DashContext) -> Response<Full<Bytes>> {
    match ctx.store.list_pool_stats().await {
        Ok(stats) => {
            let now = unix_timestamp();
            let data: Vec<_> = stats
                .iter()
                .map(|s| {
                    json!({
                        "address": s.address,
                        "active_shares": s.active_shares,
                        "active_uncles": s.active_uncles,
                        "total_shares": s.total_shares,
                        "blocks_found": s.blocks_found,
                        "payouts_sent": s.payouts_sent,
                        "last_payout_amount": s.last_payout_amount,
                        "last_payout_time": s.last_payout_time,
                        "total_payout_amount": s.total_payout_amount,
                        "last_seen": s.last_seen,
                        "last_seen_text": format_elapsed_time(now, s.last_seen),
                    })
                })
                .collect();
            json_response(StatusCode::OK, json!({ "pool": data }))
        }
        Err(e) => store_error("pool query", e),
    }
}

async fn serve_pool_history(
    ctx: &DashContext,
    address: &str,
    query: &str,
) -> Response<Full<Bytes>> {
    if address.is_empty() {
        return bad_request("missing address");
    }

    match ctx.store.pool_history(address, hours_param(query)).await {
        Ok(samples) => json_response(
            StatusCode::OK,
            json!({ "address": address, "samples": samples }),
        ),
        Err(e) => store_error("pool history query", e),
    }
}

async fn serve_alerts(ctx: &DashContext, query: &str) -> Response<Full<Bytes>> {
    let acknowledged = match query_param(query, "acknowledged") {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };
    let limit = query_param(query, "limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    match ctx.store.list_alerts(acknowledged, limit).await {
        Ok(alerts) => {
            let now = unix_timestamp();
            let data: Vec<_> = alerts
                .iter()
                .map(|a| {
                    json!({
                        "id": a.id,
                        "timestamp": a.timestamp,
                        "timestamp_text": format_elapsed_time(now, a.timestamp),
                        "kind": a.kind,
                        "details": a.details,
                        "severity": a.severity,
                        "acknowledged": a.acknowledged,
                        "source_ip": a.source_ip,
                        "source_mac": a.source_mac,
                    })
                })
                .collect();
            json_response(StatusCode::OK, json!({ "alerts": data }))
        }
        Err(e) => store_error("alerts query", e),
    }
}

async fn ack_alert(ctx: &DashContext, id: &str) -> Response<Full<Bytes>> {
    let Ok(id) = id.parse::<i64>() else {
        return bad_request("invalid alert id");
    };

    match ctx.store.acknowledge_alert(id).await {
        Ok(()) => json_response(StatusCode::OK, json!({ "acknowledged": id })),
        Err(e) => store_error("alert ack", e),
    }
}

async fn ack_all_alerts(ctx: &DashContext) -> Response<Full<Bytes>> {
    match ctx.store.acknowledge_all().await {
        Ok(()) => json_response(StatusCode::OK, json!({ "acknowledged": "all" })),
        Err(e) => store_error("alert ack-all", e),
    }
}

async fn delete_alert(ctx: &DashContext, id: &str) -> Response<Full<Bytes>> {
    let Ok(id) = id.parse::<i64>() else {
        return bad_request("invalid alert id");
    };

    match ctx.store.delete_alert(id).await {
        Ok(()) => json_response(StatusCode::OK, json!({ "deleted": id })),
        Err(e) => store_error("alert delete", e),
    }
}

async fn purge(ctx: &DashContext) -> Response<Full<Bytes>> {
    match ctx.store.purge_older_than(ctx.retention_days).await {
        Ok(deleted) => json_response(
            StatusCode::OK,
            json!({ "deleted": deleted, "retention_days": ctx.retention_days }),
        ),
        Err(e) => store_error("purge", e),
    }
}

/// Probe the configured default host right now and store the result.
async fn reprobe(ctx: &DashContext) -> Response<Full<Bytes>> {
    if ctx.probe_host.is_empty() {
        return bad_request("no probe host configured");
    }

    match miner::check_host(&ctx.store, &ctx.miner_api, &ctx.probe_host).await {
        Ok(hashrate) => json_response(
            StatusCode::OK,
            json!({
                "host": ctx.probe_host,
                "hashrate": hashrate,
                "status": if hashrate.is_some() { "Online" } else { "Offline" },
            }),
        ),
        Err(e) => {
            error!("re-probe failed: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("online=true&limit=5", "online"), Some("true"));
        assert_eq!(query_param("online=true&limit=5", "limit"), Some("5"));
        assert_eq!(query_param("online=true", "hours"), None);
        assert_eq!(query_param("", "hours"), None);
    }

    #[test]
    fn test_hours_param_defaults_to_24() {
        assert_eq!(hours_param(""), 24);
        assert_eq!(hours_param("hours=48"), 48);
        assert_eq!(hours_param("hours=abc"), 24);
    }
}
