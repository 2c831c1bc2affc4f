//! # SpoofSentry Core
//!
//! Synthesizes labeled mobile location trajectories, with and without GPS
//! spoofing attacks, and detects spoofing with a deterministic rule engine
//! that reconstructs each device's motion history.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use spoof_sentry_core::dataset::{DatasetAssembler, DatasetSpec};
//! use spoof_sentry_core::detector::SequentialRuleDetector;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let spec = DatasetSpec {
//!     rows: 1_000,
//!     spoof_rate: 0.2,
//!     base_lat: 40.7128,
//!     base_lon: -74.0060,
//!     start_time: 1_700_000_000,
//! };
//! let dataset = DatasetAssembler::new(&mut rng).assemble(&mut rng, &spec);
//! let report = SequentialRuleDetector::default().detect(&dataset.unlabeled());
//! println!("{} events flagged", report.flagged_count());
//! ```
//!
//! ## Pieces
//!
//! - **geo**: haversine distance, implied speed and implied pressure
//! - **synth / journey**: the sensor noise model and the journey archetypes
//! - **inject**: the five spoof attack archetypes
//! - **dataset**: shuffled, labeled multi-device tables
//! - **detector / rule**: per-device motion reconstruction and the rule fold

pub mod config;
pub mod coverage;
pub mod dataset;
pub mod detector;
pub mod evaluation;
pub mod event;
pub mod explain;
pub mod geo;
pub mod inject;
pub mod journey;
pub mod rule;
pub mod synth;

pub use dataset::{DatasetAssembler, DatasetSpec, LabeledDataset};
pub use detector::{DetectionReport, SequentialRuleDetector};
pub use event::{EventRecord, LabeledRecord, LocationEvent};
pub use inject::{SpoofInjector, SpoofKind};
pub use journey::{JourneyKind, JourneySimulator};
pub use rule::{Rule, RuleKind};
