pub mod emitter;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod telemetry;

pub use emitter::{EventEmitter, WayfinderEvent};

#[cfg(feature = "metrics")]
pub use metrics::MetricsCollector;

pub use telemetry::TelemetryExporter;
