use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Event loop
    pub static ref EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smf_events_total", "Events processed by the session core"),
        &["event"]
    ).unwrap();

    pub static ref DISPATCH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("smf_dispatch_latency_seconds", "Time to process one event")
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05])
    ).unwrap();

    // Sessions
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::with_opts(
        Opts::new("smf_sessions_active", "Sessions in the registry")
    ).unwrap();

    pub static ref CONTINUATIONS_PENDING: IntGauge = IntGauge::with_opts(
        Opts::new("smf_continuations_pending", "Requests parked on a policy answer")
    ).unwrap();

    // Failures
    pub static ref DISCARDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smf_discards_total", "Events dropped without reaching a handler"),
        &["reason"]
    ).unwrap();

    pub static ref POLICY_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("smf_policy_failures_total", "Credit-Control answers with a non-success result")
    ).unwrap();

    pub static ref POLICY_TIMEOUTS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("smf_policy_timeouts_total", "Policy answers that missed their deadline")
    ).unwrap();
}

/// Register all metrics with the global registry. Safe to call more than once.
pub fn register_metrics() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(EVENTS_TOTAL.clone()),
        Box::new(DISPATCH_LATENCY_SECONDS.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(CONTINUATIONS_PENDING.clone()),
        Box::new(DISCARDS_TOTAL.clone()),
        Box::new(POLICY_FAILURES_TOTAL.clone()),
        Box::new(POLICY_TIMEOUTS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
