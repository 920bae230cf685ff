//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `brop_drafts_generated_total` - Drafts generated (including regenerations)
//! - `brop_periods_finalized_total` - Periods frozen into snapshots
//! - `brop_finalize_conflicts_total` - Finalize calls rejected by the CAS
//! - `brop_anomalies_total{severity}` - Anomalies found on generated drafts
//! - `brop_excise_tax_cents_total` - Excise tax on finalized periods
//! - `brop_generate_duration_seconds` - Histogram of draft generation latencies

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
///
/// Collectors live on a private registry, so several services can run in
/// one process.
#[derive(Clone)]
pub struct Metrics {
    /// Drafts generated
    pub drafts_generated: IntCounter,

    /// Periods finalized
    pub periods_finalized: IntCounter,

    /// Rejected finalize attempts
    pub finalize_conflicts: IntCounter,

    /// Anomalies by severity
    pub anomalies: IntCounterVec,

    /// Excise tax finalized, in cents
    pub excise_tax_cents: IntCounter,

    /// Draft generation duration
    pub generate_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let drafts_generated = IntCounter::new(
            "brop_drafts_generated_total",
            "Drafts generated, including regenerations",
        )?;
        registry.register(Box::new(drafts_generated.clone()))?;

        let periods_finalized =
            IntCounter::new("brop_periods_finalized_total", "Periods frozen into snapshots")?;
        registry.register(Box::new(periods_finalized.clone()))?;

        let finalize_conflicts = IntCounter::new(
            "brop_finalize_conflicts_total",
            "Finalize calls rejected because the period was finalized or the draft changed",
        )?;
        registry.register(Box::new(finalize_conflicts.clone()))?;

        let anomalies = IntCounterVec::new(
            Opts::new("brop_anomalies_total", "Anomalies found on generated drafts"),
            &["severity"],
        )?;
        registry.register(Box::new(anomalies.clone()))?;

        let excise_tax_cents = IntCounter::new(
            "brop_excise_tax_cents_total",
            "Excise tax on finalized periods, in cents",
        )?;
        registry.register(Box::new(excise_tax_cents.clone()))?;

        let generate_duration = Histogram::with_opts(
            HistogramOpts::new(
                "brop_generate_duration_seconds",
                "Histogram of draft generation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(generate_duration.clone()))?;

        Ok(Self {
            drafts_generated,
            periods_finalized,
            finalize_conflicts,
            anomalies,
            excise_tax_cents,
            generate_duration,
            registry,
        })
    }

    /// Record a generated draft and its anomalies
    pub fn record_draft(&self, severities: impl IntoIterator<Item = &'static str>) {
        self.drafts_generated.inc();
        for severity in severities {
            self.anomalies.with_label_values(&[severity]).inc();
        }
    }

    /// Record generation duration
    pub fn record_generate_duration(&self, duration_seconds: f64) {
        self.generate_duration.observe(duration_seconds);
    }

    /// Record a finalized period
    pub fn record_finalized(&self, total_tax_cents: i64) {
        self.periods_finalized.inc();
        self.excise_tax_cents
            .inc_by(u64::try_from(total_tax_cents).unwrap_or(0));
    }

    /// Record a rejected finalize
    pub fn record_finalize_conflict(&self) {
        self.finalize_conflicts.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("drafts_generated", &self.drafts_generated.get())
            .field("periods_finalized", &self.periods_finalized.get())
            .field("finalize_conflicts", &self.finalize_conflicts.get())
            .field("excise_tax_cents", &self.excise_tax_cents.get())
            .finish_non_exhaustive()
    }
}
