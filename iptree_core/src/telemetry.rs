//! Minimal run‑time metrics sink.
//!
//! Prometheus export is left out; instead the host process can register a
//! plain callback that receives name/labels/sample triples. Until a callback
//! is registered the `metrics` facade's no-op recorder swallows everything.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Recorder, SharedString, Unit};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// One metric update as seen by the recorder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Counter increment.
    Increment(u64),
    /// Counter set to an absolute value.
    Absolute(u64),
    /// Gauge set to a value.
    Set(f64),
    /// Gauge moved by a signed amount.
    Delta(f64),
    /// Histogram observation.
    Record(f64),
}

/// Signature for external collectors: metric name, labels, sample.
pub type StatsCallback = fn(name: &str, labels: &[(&str, &str)], sample: Sample);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register the callback and install the forwarding recorder.
///
/// Only the first registration wins; returns `false` if a callback was
/// already registered or another global recorder is in place.
pub fn register_stats_callback(cb: StatsCallback) -> bool {
    CALLBACK.set(cb).is_ok() && init()
}

fn emit(key: &Key, sample: Sample) {
    if let Some(cb) = CALLBACK.get() {
        let labels: Vec<(&str, &str)> = key.labels().map(|l| (l.key(), l.value())).collect();
        cb(key.name(), &labels, sample);
    }
}

/// Forwarding recorder. Uses the callback **if** it was registered.
struct CallbackRecorder;

struct CallbackCounter {
    key: Key,
}

struct CallbackGauge {
    key: Key,
}

struct CallbackHistogram {
    key: Key,
}

impl Recorder for CallbackRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CallbackCounter { key: key.clone() }))
    }
    fn register_gauge(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CallbackGauge { key: key.clone() }))
    }
    fn register_histogram(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CallbackHistogram { key: key.clone() }))
    }
}

impl metrics::CounterFn for CallbackCounter {
    fn increment(&self, value: u64) {
        emit(&self.key, Sample::Increment(value));
    }
    fn absolute(&self, value: u64) {
        emit(&self.key, Sample::Absolute(value));
    }
}

impl metrics::GaugeFn for CallbackGauge {
    fn set(&self, value: f64) {
        emit(&self.key, Sample::Set(value));
    }
    fn increment(&self, value: f64) {
        emit(&self.key, Sample::Delta(value));
    }
    fn decrement(&self, value: f64) {
        emit(&self.key, Sample::Delta(-value));
    }
}

impl metrics::HistogramFn for CallbackHistogram {
    fn record(&self, value: f64) {
        emit(&self.key, Sample::Record(value));
    }
}

/// Install the recorder exactly **once**.
fn init() -> bool {
    static INSTALLED: OnceCell<bool> = OnceCell::new();
    *INSTALLED.get_or_init(|| metrics::set_global_recorder(CallbackRecorder).is_ok())
}
