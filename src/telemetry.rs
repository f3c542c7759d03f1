use crate::reconcile::Applied;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;

pub struct Metrics {
    frames_submitted: Counter<u64>,
    responses: Counter<u64>,
    recognition_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .unwrap();

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("attendance_kiosk");
        global::set_meter_provider(provider);

        let frames_submitted = meter
            .u64_counter("frames_submitted_total")
            .with_description("Frames dispatched to the recognition backend")
            .build();

        let responses = meter
            .u64_counter("recognition_responses_total")
            .with_description("Recognition responses by reconciliation result")
            .build();

        let recognition_duration = meter
            .u64_histogram("recognition_duration_ms")
            .with_boundaries(doubling_boundaries(50, 8))
            .with_description("Round-trip duration of recognition submissions in milliseconds")
            .build();

        Metrics {
            frames_submitted,
            responses,
            recognition_duration,
            registry,
        }
    }

    pub fn record_submission(&self) {
        self.frames_submitted.add(1, &[]);
    }

    pub fn record_response(&self, applied: Applied) {
        let result = match applied {
            Applied::Detected => "detected",
            Applied::EmptyHeld => "empty_held",
            Applied::EmptyCleared => "empty_cleared",
            Applied::FailureRecorded => "failed",
            Applied::Stale => "stale",
        };
        self.responses.add(1, &[KeyValue::new("result", result)]);
    }

    pub fn record_recognition_duration(&self, duration_ms: u64) {
        self.recognition_duration.record(duration_ms, &[]);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn doubling_boundaries(base_ms: u64, buckets: u32) -> Vec<f64> {
    (0..buckets).map(|i| (base_ms << i) as f64).collect()
}
