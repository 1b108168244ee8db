//! Prometheus metrics.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug; it can only happen during
//! static initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, IntCounter, IntGauge, TextEncoder,
};
use pulse_core::ConnectionStatus;

/// Tick stream connection state (1 = connected, 0 = otherwise).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "pulse_ws_connected",
        "Tick stream connection state (1=connected)"
    )
    .unwrap()
});

/// Current connection status, one-hot by label.
/// Labels: status (disconnected/connecting/connected/error)
pub static WS_STATUS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pulse_ws_status",
        "Tick stream connection status (1=active, 0=inactive)",
        &["status"]
    )
    .unwrap()
});

/// Reconnect attempts.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pulse_ws_reconnect_total",
        "Total tick stream reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Ticks by merge outcome.
/// Labels: outcome (applied/stale/unknown/malformed)
pub static TICK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pulse_tick_total",
        "Total ticks received, by merge outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Bulk loads by category and result.
pub static LOAD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pulse_load_total",
        "Total bulk instrument loads",
        &["category", "result"]
    )
    .unwrap()
});

/// Instruments per category.
pub static CATALOG_INSTRUMENTS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pulse_catalog_instruments",
        "Instruments in the catalog",
        &["category"]
    )
    .unwrap()
});

/// View projections computed (memo misses).
pub static VIEW_RECOMPUTE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pulse_view_recompute_total",
        "Total view projections recomputed"
    )
    .unwrap()
});

/// Active flash markers.
pub static FLASH_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("pulse_flash_active", "Currently active flash markers").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set connection status. Only the active status is 1.
    pub fn connection_status(status: ConnectionStatus) {
        for s in ConnectionStatus::ALL {
            WS_STATUS.with_label_values(&[s.as_str()]).set(0.0);
        }
        WS_STATUS.with_label_values(&[status.as_str()]).set(1.0);
        WS_CONNECTED.set(if status.is_connected() { 1.0 } else { 0.0 });
    }

    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record one tick by outcome (applied/stale/unknown/malformed).
    pub fn tick(outcome: &str) {
        TICK_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn load(category: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        LOAD_TOTAL.with_label_values(&[category, result]).inc();
    }

    pub fn catalog_size(category: &str, count: usize) {
        CATALOG_INSTRUMENTS
            .with_label_values(&[category])
            .set(count as f64);
    }

    /// Advance the recompute counter to an absolute total.
    pub fn view_recomputes(total: u64) {
        let current = VIEW_RECOMPUTE_TOTAL.get();
        if total > current {
            VIEW_RECOMPUTE_TOTAL.inc_by(total - current);
        }
    }

    pub fn flash_active(count: usize) {
        FLASH_ACTIVE.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
