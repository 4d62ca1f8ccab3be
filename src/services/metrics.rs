use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static BOOKING_TRANSITIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENT_OUTCOMES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENT_AMOUNT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let transitions_counter = IntCounterVec::new(
        Opts::new(
            "booking_transitions_total",
            "Booking state machine transitions by edge",
        ),
        &["from", "to"],
    )
    .expect("Failed to create booking_transitions_total metric");

    let outcomes_counter = IntCounterVec::new(
        Opts::new(
            "payment_outcomes_total",
            "Payment reconciliation outcomes by result",
        ),
        &["outcome"],
    )
    .expect("Failed to create payment_outcomes_total metric");

    let amount_counter = IntCounterVec::new(
        Opts::new(
            "payment_amount_total",
            "Settled payment amounts by currency (in smallest unit)",
        ),
        &["currency"],
    )
    .expect("Failed to create payment_amount_total metric");

    registry
        .register(Box::new(transitions_counter.clone()))
        .expect("Failed to register booking_transitions_total");
    registry
        .register(Box::new(outcomes_counter.clone()))
        .expect("Failed to register payment_outcomes_total");
    registry
        .register(Box::new(amount_counter.clone()))
        .expect("Failed to register payment_amount_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    BOOKING_TRANSITIONS_TOTAL
        .set(transitions_counter)
        .expect("Failed to set booking_transitions_total");
    PAYMENT_OUTCOMES_TOTAL
        .set(outcomes_counter)
        .expect("Failed to set payment_outcomes_total");
    PAYMENT_AMOUNT_TOTAL
        .set(amount_counter)
        .expect("Failed to set payment_amount_total");
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record one booking state machine transition.
pub fn record_booking_transition(from: &str, to: &str) {
    if let Some(counter) = BOOKING_TRANSITIONS_TOTAL.get() {
        counter.with_label_values(&[from, to]).inc();
    }
}

/// Record a reconciliation outcome (success, failed, pending, stale).
pub fn record_payment_outcome(outcome: &str) {
    if let Some(counter) = PAYMENT_OUTCOMES_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a settled amount for reporting.
pub fn record_payment_amount(currency: &str, amount_minor: u64) {
    if let Some(counter) = PAYMENT_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[currency]).inc_by(amount_minor);
    }
}
