//! Server Metrics - game and HTTP counters with Prometheus + JSON export
//!
//! Every counter is a lock-free atomic, shared by the connection tasks, the
//! bevy tick and the HTTP handlers.
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text format
//! - `GET /metrics/json` - the same numbers as JSON

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiState;

#[derive(Debug)]
pub struct ServerMetrics {
    /// TCP connections accepted
    pub connections_total: AtomicU64,
    /// TCP connections currently open
    pub connections_active: AtomicU64,
    /// Successful logins (including register-and-login)
    pub logins_total: AtomicU64,
    /// Rejected AUTH / REGISTER attempts
    pub login_failures: AtomicU64,
    /// Client packets forwarded to the world
    pub packets_in: AtomicU64,
    /// Server packets handed to connection writers
    pub packets_out: AtomicU64,
    /// Lines that failed to decode
    pub protocol_errors: AtomicU64,
    /// Packets addressed to a connection that was already gone
    pub send_failures: AtomicU64,
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total HTTP request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative HTTP request duration in microseconds
    pub total_duration_us: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            logins_total: AtomicU64::new(0),
            login_failures: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // never below zero
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn requests_per_second(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed) as f64;
        let uptime = self.uptime_secs();
        if uptime > 0.0 { total / uptime } else { 0.0 }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// Axum Middleware
// ============================================================================

/// Records request count and duration for every HTTP request.
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

/// (players, monsters, entities, tick, avg tick ms) from the live snapshot
fn world_numbers(state: &ApiState) -> (usize, usize, usize, u64, f64) {
    let snap = state.world_snapshot.read().unwrap_or_else(|e| e.into_inner());
    let avg_tick = if snap.tick > 0 {
        (snap.uptime_secs / snap.tick as f64) * 1000.0
    } else {
        0.0
    };
    (
        snap.players.len(),
        snap.monster_count,
        snap.entity_count,
        snap.tick,
        avg_tick,
    )
}

// ============================================================================
// GET /metrics - Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
    let (player_count, monster_count, entity_count, tick, avg_tick_ms) = world_numbers(&state);

    let counters = [
        ("connections_total", "TCP connections accepted", "counter", load(&m.connections_total)),
        ("connections_active", "TCP connections currently open", "gauge", load(&m.connections_active)),
        ("logins_total", "Successful logins", "counter", load(&m.logins_total)),
        ("login_failures_total", "Rejected login or registration attempts", "counter", load(&m.login_failures)),
        ("packets_in_total", "Client packets forwarded to the world", "counter", load(&m.packets_in)),
        ("packets_out_total", "Server packets written to connections", "counter", load(&m.packets_out)),
        ("protocol_errors_total", "Client lines that failed to decode", "counter", load(&m.protocol_errors)),
        ("send_failures_total", "Packets dropped for closed connections", "counter", load(&m.send_failures)),
        ("requests_total", "Total HTTP requests served", "counter", load(&m.total_requests)),
        ("request_errors_total", "Total HTTP request errors (4xx/5xx)", "counter", load(&m.total_errors)),
        ("player_count", "Players in the world", "gauge", player_count as u64),
        ("monster_count", "Monsters in the world", "gauge", monster_count as u64),
        ("entity_count", "Total live entities", "gauge", entity_count as u64),
        ("tick_total", "Total server ticks processed", "counter", tick),
    ];

    let mut body = String::new();
    for (name, help, kind, value) in counters {
        body.push_str(&format!(
            "# HELP realm_{name} {help}\n# TYPE realm_{name} {kind}\nrealm_{name} {value}\n\n"
        ));
    }
    body.push_str(&format!(
        "# HELP realm_tick_duration_seconds Average tick duration\n\
         # TYPE realm_tick_duration_seconds gauge\n\
         realm_tick_duration_seconds {:.6}\n\
         \n\
         # HELP realm_uptime_seconds Server uptime\n\
         # TYPE realm_uptime_seconds gauge\n\
         realm_uptime_seconds {:.2}\n",
        avg_tick_ms / 1000.0,
        m.uptime_secs(),
    ));

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json
// ============================================================================

#[derive(Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub player_count: usize,
    pub monster_count: usize,
    pub entity_count: usize,
    pub tick: u64,
    pub avg_tick_time_ms: f64,
    pub connections_total: u64,
    pub connections_active: u64,
    pub logins_total: u64,
    pub login_failures: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub protocol_errors: u64,
    pub send_failures: u64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub rps: f64,
    pub avg_request_duration_ms: f64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    let (player_count, monster_count, entity_count, tick, avg_tick_ms) = world_numbers(&state);

    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        player_count,
        monster_count,
        entity_count,
        tick,
        avg_tick_time_ms: avg_tick_ms,
        connections_total: m.connections_total.load(Ordering::Relaxed),
        connections_active: m.connections_active.load(Ordering::Relaxed),
        logins_total: m.logins_total.load(Ordering::Relaxed),
        login_failures: m.login_failures.load(Ordering::Relaxed),
        packets_in: m.packets_in.load(Ordering::Relaxed),
        packets_out: m.packets_out.load(Ordering::Relaxed),
        protocol_errors: m.protocol_errors.load(Ordering::Relaxed),
        send_failures: m.send_failures.load(Ordering::Relaxed),
        total_requests: m.total_requests.load(Ordering::Relaxed),
        total_errors: m.total_errors.load(Ordering::Relaxed),
        rps: m.requests_per_second(),
        avg_request_duration_ms: m.avg_duration_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_metrics_defaults() {
        let m = ServerMetrics::default();
        assert_eq!(m.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(m.connections_active.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_connection_gauge() {
        let m = ServerMetrics::default();
        m.connection_opened();
        m.connection_opened();
        m.connection_closed();
        assert_eq!(m.connections_total.load(Ordering::Relaxed), 2);
        assert_eq!(m.connections_active.load(Ordering::Relaxed), 1);

        m.connection_closed();
        m.connection_closed();
        assert_eq!(m.connections_active.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_request() {
        let m = ServerMetrics::default();
        m.record_request(1500, false);
        m.record_request(2500, true);
        m.record_request(1000, false);

        assert_eq!(m.total_requests.load(Ordering::Relaxed), 3);
        assert_eq!(m.total_errors.load(Ordering::Relaxed), 1);
        assert_eq!(m.total_duration_us.load(Ordering::Relaxed), 5000);
    }

    #[test]
    fn test_avg_duration_ms() {
        let m = ServerMetrics::default();
        m.record_request(3000, false);
        m.record_request(5000, false);
        assert!((m.avg_duration_ms() - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_rps_zero_uptime() {
        let m = ServerMetrics::default();
        assert!(m.requests_per_second().is_finite());
    }
}
