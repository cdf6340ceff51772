use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};
use wayfinder_core::config::TelemetrySettings;

/// Pushes sampled request-outcome events to a collector endpoint.
/// True no-op when disabled — `report()` becomes a branch-predicted check
/// with no channel or background task behind it.
pub struct TelemetryExporter {
    sender: Option<mpsc::Sender<serde_json::Value>>,
    sample_rate: f64,
    client_name: Option<String>,
    client_version: Option<String>,
}

const BATCH_SIZE: usize = 50;
const FLUSH_INTERVAL_SECS: u64 = 5;

impl TelemetryExporter {
    pub fn new(settings: &TelemetrySettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }
        let Some(endpoint) = settings.exporter_url.clone() else {
            return Self::disabled();
        };

        let (tx, rx) = mpsc::channel(10_000);
        tokio::spawn(Self::flush_loop(endpoint, settings.api_key.clone(), rx));
        Self {
            sender: Some(tx),
            sample_rate: settings.sample_rate,
            client_name: settings.client_name.clone(),
            client_version: settings.client_version.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            sender: None,
            sample_rate: 0.0,
            client_name: None,
            client_version: None,
        }
    }

    /// Report one request outcome. Subject to `sample_rate` — callers pass
    /// a `[0, 1)` draw so the decision stays testable without RNG plumbing.
    #[allow(clippy::too_many_arguments)]
    pub fn report(
        &self,
        sample_draw: f64,
        ar_io_hostname: &str,
        requested_url: &str,
        wayfinder_url: &str,
        http_status: u16,
        elapsed_ms: f64,
        routing_strategy: &str,
        verification_strategy: Option<&str>,
    ) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sample_draw >= self.sample_rate {
            return;
        }
        let entry = json!({
            "arIoHostname": ar_io_hostname,
            "requestedUrl": requested_url,
            "wayfinderUrl": wayfinder_url,
            "httpStatus": http_status,
            "elapsedMs": elapsed_ms,
            "routingStrategy": routing_strategy,
            "verificationStrategy": verification_strategy,
            "clientName": self.client_name,
            "clientVersion": self.client_version,
        });
        let _ = sender.try_send(entry);
    }

    async fn flush_loop(
        endpoint: String,
        api_key: Option<String>,
        mut rx: mpsc::Receiver<serde_json::Value>,
    ) {
        let client = reqwest::Client::new();
        let mut batch: Vec<serde_json::Value> = Vec::with_capacity(BATCH_SIZE);
        let mut flush_interval = interval(Duration::from_secs(FLUSH_INTERVAL_SECS));

        loop {
            tokio::select! {
                Some(entry) = rx.recv() => {
                    batch.push(entry);
                    if batch.len() >= BATCH_SIZE {
                        Self::flush(&client, &endpoint, api_key.as_deref(), &mut batch).await;
                    }
                }
                _ = flush_interval.tick() => {
                    if !batch.is_empty() {
                        Self::flush(&client, &endpoint, api_key.as_deref(), &mut batch).await;
                    }
                }
            }
        }
    }

    async fn flush(
        client: &reqwest::Client,
        endpoint: &str,
        api_key: Option<&str>,
        batch: &mut Vec<serde_json::Value>,
    ) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        let mut req = client.post(endpoint).json(&serde_json::json!({ "events": batch }));
        if let Some(key) = api_key {
            req = req.bearer_auth(key);
        }
        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(count, "flushed telemetry events");
            }
            Ok(resp) => error!(status = %resp.status(), "telemetry flush rejected"),
            Err(e) => error!(error = %e, "telemetry flush error"),
        }
        batch.clear();
    }
}
