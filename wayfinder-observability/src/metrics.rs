use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus metrics for a Wayfinder instance. Optional — only compiled in
/// behind the `metrics` feature, and hosts that don't scrape never pay for it.
pub struct MetricsCollector {
    registry: Registry,

    /// Requests by routing strategy and outcome (`ok` | `no-gateway` | `network-error`).
    pub requests_total: IntCounterVec,

    /// End-to-end request latency, labeled by routing strategy.
    pub request_duration: HistogramVec,

    /// Verification outcomes by strategy and result (`passed` | `failed` | `skipped`).
    pub verifications_total: IntCounterVec,

    /// Gateway probe outcomes, labeled by host and result.
    pub probes_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("wayfinder_requests_total", "Total resolved ar:// requests")
                .namespace("wayfinder"),
            &["strategy", "outcome"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("wayfinder_request_duration_seconds", "Request latency")
                .namespace("wayfinder")
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            &["strategy"],
        )?;

        let verifications_total = IntCounterVec::new(
            Opts::new("wayfinder_verifications_total", "Verification outcomes")
                .namespace("wayfinder"),
            &["strategy", "result"],
        )?;

        let probes_total = IntCounterVec::new(
            Opts::new("wayfinder_probes_total", "Gateway HEAD probe outcomes")
                .namespace("wayfinder"),
            &["host", "result"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(verifications_total.clone()))?;
        registry.register(Box::new(probes_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            verifications_total,
            probes_total,
        })
    }

    pub fn record_request(&self, strategy: &str, outcome: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[strategy, outcome])
            .inc();
        self.request_duration
            .with_label_values(&[strategy])
            .observe(duration_secs);
    }

    pub fn record_verification(&self, strategy: &str, result: &str) {
        self.verifications_total
            .with_label_values(&[strategy, result])
            .inc();
    }

    pub fn record_probe(&self, host: &str, result: &str) {
        self.probes_total.with_label_values(&[host, result]).inc();
    }

    /// Prometheus text exposition for a `/metrics` scrape endpoint.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to construct metrics collector")
    }
}
