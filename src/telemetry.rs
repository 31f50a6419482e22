//! Tracing and OpenTelemetry wiring.
//!
//! Structured logs always go through `tracing_subscriber::fmt` with an
//! `RUST_LOG`-style filter; when the `OTEL_*` environment points at a
//! collector, spans and metrics are also exported over OTLP (HTTP or gRPC).
//!
//! Two knobs matter for a quote gateway, where every request fans out into
//! per-adapter HTTP spans:
//! - `OTEL_TRACES_SAMPLER_ARG` — trace sampling ratio, default 1.0; busy
//!   deployments turn this down rather than drowning the collector.
//! - `OTEL_STDOUT_EXPORTER` — opt-in stdout metrics mirror for local
//!   debugging; off by default so request logs stay readable.
//!
//! Providers shut down on drop so the last batches flush on exit.

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Transport for OTLP export.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    HTTP,
    GRPC,
}

/// Export settings resolved from the environment. `None` when no `OTEL_*`
/// variable asks for export.
#[derive(Debug, Clone, Copy)]
struct OtlpConfig {
    protocol: TelemetryProtocol,
    sample_ratio: f64,
    stdout_metrics: bool,
}

impl OtlpConfig {
    fn from_env() -> Option<Self> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !is_enabled {
            return None;
        }
        let protocol = match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        };
        Some(Self {
            protocol,
            sample_ratio: sample_ratio_from(env::var("OTEL_TRACES_SAMPLER_ARG").ok()),
            stdout_metrics: env::var("OTEL_STDOUT_EXPORTER")
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Semantic `Resource` describing this gateway deployment.
    fn resource(&self) -> Resource {
        let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(env!("CARGO_PKG_NAME"))
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    fn meter_provider(&self) -> SdkMeterProvider {
        let exporter = opentelemetry_otlp::MetricExporter::builder();
        let exporter = match self.protocol {
            TelemetryProtocol::HTTP => exporter
                .with_http()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build(),
            TelemetryProtocol::GRPC => exporter
                .with_tonic()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build(),
        };
        let exporter = exporter.expect("Failed to build OTLP metric exporter");

        let reader = PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(30))
            .build();

        let mut builder = MeterProviderBuilder::default()
            .with_resource(self.resource())
            .with_reader(reader);
        if self.stdout_metrics {
            let stdout_reader =
                PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();
            builder = builder.with_reader(stdout_reader);
        }
        let meter_provider = builder.build();
        global::set_meter_provider(meter_provider.clone());
        meter_provider
    }

    fn tracer_provider(&self) -> SdkTracerProvider {
        let exporter = opentelemetry_otlp::SpanExporter::builder();
        let exporter = match self.protocol {
            TelemetryProtocol::HTTP => exporter.with_http().build(),
            TelemetryProtocol::GRPC => exporter.with_tonic().build(),
        };
        let exporter = exporter.expect("Failed to build OTLP span exporter");

        SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.sample_ratio,
            ))))
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(self.resource())
            .with_batch_exporter(exporter)
            .build()
    }
}

/// Parse and clamp the sampling ratio; anything unparsable samples fully.
fn sample_ratio_from(raw: Option<String>) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .map(|ratio| ratio.clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

/// Wrapper over the telemetry providers, for graceful shutdown.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Initialize tracing, with OTLP export when the environment asks for it.
    pub fn init() -> Self {
        let env_filter =
            || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        match OtlpConfig::from_env() {
            Some(otlp) => {
                let tracer_provider = otlp.tracer_provider();
                let meter_provider = otlp.meter_provider();
                let tracer = tracer_provider.tracer("tracing-otel-subscriber");

                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(tracing_subscriber::fmt::layer())
                    .with(MetricsLayer::new(meter_provider.clone()))
                    .with(OpenTelemetryLayer::new(tracer))
                    .init();

                tracing::info!(
                    protocol = ?otlp.protocol,
                    sample_ratio = otlp.sample_ratio,
                    "OpenTelemetry export enabled"
                );
                Self {
                    tracer_provider: Some(tracer_provider),
                    meter_provider: Some(meter_provider),
                }
            }
            None => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(tracing_subscriber::fmt::layer())
                    .init();
                tracing::info!("OpenTelemetry is not enabled");
                Self {
                    tracer_provider: None,
                    meter_provider: None,
                }
            }
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter_provider) = self.meter_provider.as_ref() {
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_ratio_parses_and_clamps() {
        assert_eq!(sample_ratio_from(None), 1.0);
        assert_eq!(sample_ratio_from(Some("0.25".to_string())), 0.25);
        assert_eq!(sample_ratio_from(Some("7".to_string())), 1.0);
        assert_eq!(sample_ratio_from(Some("-1".to_string())), 0.0);
        assert_eq!(sample_ratio_from(Some("nonsense".to_string())), 1.0);
    }
}
