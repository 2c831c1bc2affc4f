//! # SpoofSentry
//!
//! Synthetic GPS-spoofing trajectories and a sequential rule-based spoof
//! detector for mobile location events.
//!
//! This crate re-exports the workspace members:
//!
//! - [`core`]: simulation, spoof injection, detection, evaluation and configuration
//! - [`agents`]: explainers for flagged events
//! - [`connectors`]: Arrow/CSV/JSON table I/O
//!
//! ```no_run
//! use spoof_sentry::connectors;
//! use spoof_sentry::SequentialRuleDetector;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = connectors::read_events_csv("data/test.csv")?;
//! let report = SequentialRuleDetector::default().detect(&records);
//! connectors::write_predictions_csv("rules_predictions.csv", &report)?;
//! # Ok(())
//! # }
//! ```

pub use spoof_sentry_agents as agents;
pub use spoof_sentry_connectors as connectors;
pub use spoof_sentry_core as core;

pub use spoof_sentry_core::{
    DatasetAssembler, DatasetSpec, DetectionReport, EventRecord, JourneyKind, JourneySimulator,
    LabeledDataset, LabeledRecord, LocationEvent, Rule, RuleKind, SequentialRuleDetector,
    SpoofInjector, SpoofKind,
};
