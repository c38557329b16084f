//! Metric declarations for the Anvil protocol stack.
//!
//! Every metric the codec, engine, simulator and session emit is declared once
//! here as a [`Metric`] constant so names cannot drift between emitters.
//! Emission goes through the `metrics` facade, which is a no-op until a
//! recorder is installed.
//!
//! ```rust,ignore
//! use anvil_metrics::{metric_defs, LinkLabels};
//!
//! let labels = LinkLabels::new("ttyMock1", "master");
//! metrics::counter!(metric_defs::ENGINE_FRAMES_SENT.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A declared metric.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name, `anvil.<component>.<what>`.
    pub name: &'static str,
    pub kind: MetricKind,
    pub unit: Unit,
    pub description: &'static str,
}

impl Metric {
    pub const fn counter(name: &'static str, unit: Unit, description: &'static str) -> Self {
        Metric {
            name,
            kind: MetricKind::Counter,
            unit,
            description,
        }
    }

    pub const fn gauge(name: &'static str, unit: Unit, description: &'static str) -> Self {
        Metric {
            name,
            kind: MetricKind::Gauge,
            unit,
            description,
        }
    }

    pub const fn histogram(name: &'static str, unit: Unit, description: &'static str) -> Self {
        Metric {
            name,
            kind: MetricKind::Histogram,
            unit,
            description,
        }
    }

    /// Register unit and description with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.description),
            MetricKind::Histogram => describe_histogram!(self.name, self.unit, self.description),
        }
    }
}

/// All metrics emitted by the workspace.
///
/// Engine metrics carry `port` and `role` labels (see [`LinkLabels`]).
pub mod metric_defs {
    use super::{Metric, Unit};

    pub const CODEC_FRAMES_DECODED: Metric = Metric::counter(
        "anvil.codec.frames_decoded",
        Unit::Count,
        "Frames decoded with a valid checksum",
    );
    pub const CODEC_CHECKSUM_ERRORS: Metric = Metric::counter(
        "anvil.codec.checksum_errors",
        Unit::Count,
        "Frames discarded on checksum mismatch",
    );
    pub const CODEC_RESYNC_BYTES: Metric = Metric::counter(
        "anvil.codec.resync_bytes",
        Unit::Bytes,
        "Bytes dropped while searching for a start byte",
    );

    pub const ENGINE_FRAMES_SENT: Metric = Metric::counter(
        "anvil.engine.frames_sent",
        Unit::Count,
        "Frames written to the transport",
    );
    pub const ENGINE_BYTES_SENT: Metric = Metric::counter(
        "anvil.engine.bytes_sent",
        Unit::Bytes,
        "Bytes written to the transport",
    );
    pub const ENGINE_BYTES_RECEIVED: Metric = Metric::counter(
        "anvil.engine.bytes_received",
        Unit::Bytes,
        "Bytes read from the transport",
    );

    /// Labelled by `port` and `command`.
    pub const SIM_RESPONSES_QUEUED: Metric = Metric::counter(
        "anvil.sim.responses_queued",
        Unit::Count,
        "Simulated responses queued for delayed delivery",
    );
    /// Labelled by `port`.
    pub const SIM_RESPONSE_LATENCY: Metric = Metric::histogram(
        "anvil.sim.response_latency_ms",
        Unit::Milliseconds,
        "Artificial latency applied to simulated responses",
    );

    /// Labelled by `from` and `to` state.
    pub const SESSION_STATE_TRANSITIONS: Metric = Metric::counter(
        "anvil.session.state_transitions",
        Unit::Count,
        "Accepted connection state machine transitions",
    );
    pub const SESSION_PENDING_WRITES: Metric = Metric::gauge(
        "anvil.session.pending_writes",
        Unit::Count,
        "Parameter writes awaiting acknowledgment",
    );

    pub const ALL: &[&Metric] = &[
        &CODEC_FRAMES_DECODED,
        &CODEC_CHECKSUM_ERRORS,
        &CODEC_RESYNC_BYTES,
        &ENGINE_FRAMES_SENT,
        &ENGINE_BYTES_SENT,
        &ENGINE_BYTES_RECEIVED,
        &SIM_RESPONSES_QUEUED,
        &SIM_RESPONSE_LATENCY,
        &SESSION_STATE_TRANSITIONS,
        &SESSION_PENDING_WRITES,
    ];
}

/// Labels identifying one end of a link.
#[derive(Debug, Clone)]
pub struct LinkLabels {
    /// Port identifier (`ttyMock1`, `/dev/ttyUSB0`, ...).
    pub port: String,
    /// `master` or `slave`.
    pub role: String,
}

impl LinkLabels {
    pub fn new(port: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            role: role.into(),
        }
    }

    /// Labels in the `metrics` crate's key/value form.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("port", self.port.clone()), ("role", self.role.clone())]
    }
}

/// Register descriptions for every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
