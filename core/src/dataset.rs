//! Labeled dataset assembly
//!
//! Builds a flat, shuffled table of events from many simulated devices, a
//! fixed share of which carry an injected spoof attack. Labels are assigned
//! per journey, never per event.

use crate::event::{EventRecord, LabeledRecord};
use crate::inject::{SpoofInjector, SpoofKind};
use crate::journey::{JourneyKind, JourneySimulator};
use crate::synth::AnchorPool;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Deterministic v4-shaped UUID drawn from `rng`.
pub fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

/// Parameters of one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub rows: usize,
    /// Share of journeys that are spoofed, in (0, 1]
    pub spoof_rate: f64,
    pub base_lat: f64,
    pub base_lon: f64,
    /// Unix timestamp of the first event of every journey
    pub start_time: i64,
}

/// What was generated for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneySummary {
    pub installation_id: Uuid,
    pub kind: JourneyKind,
    pub spoof: Option<SpoofKind>,
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub records: Vec<LabeledRecord>,
    pub journeys: Vec<JourneySummary>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The table with its label column dropped.
    pub fn unlabeled(&self) -> Vec<EventRecord> {
        self.records.iter().map(|r| r.record.clone()).collect()
    }

    /// Ground truth keyed by event id.
    pub fn labels(&self) -> BTreeMap<Uuid, bool> {
        self.records
            .iter()
            .map(|r| (r.event_id(), r.spoofed))
            .collect()
    }

    /// Fraction of rows labeled spoofed.
    pub fn spoof_fraction(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let spoofed = self.records.iter().filter(|r| r.spoofed).count();
        spoofed as f64 / self.records.len() as f64
    }

    pub fn attack_mix(&self) -> BTreeMap<SpoofKind, usize> {
        let mut mix = BTreeMap::new();
        for kind in self.journeys.iter().filter_map(|j| j.spoof) {
            *mix.entry(kind).or_insert(0) += 1;
        }
        mix
    }
}

pub struct DatasetAssembler {
    simulator: JourneySimulator,
    injector: SpoofInjector,
}

impl DatasetAssembler {
    pub const ROWS_PER_JOURNEY: usize = 25;
    pub const ORIGIN_JITTER_DEG: f64 = 0.1;
    pub const MIN_JOURNEY_LEN: usize = 15;
    pub const MAX_JOURNEY_LEN: usize = 40;

    /// Assembler with a fresh anchor pool drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_anchors(AnchorPool::generate(rng))
    }

    pub fn with_anchors(anchors: AnchorPool) -> Self {
        Self {
            simulator: JourneySimulator::new(anchors),
            injector: SpoofInjector::new(),
        }
    }

    /// Build a shuffled table of exactly `spec.rows` labeled events.
    ///
    /// # Panics
    ///
    /// Panics if `spec.spoof_rate` is outside (0, 1].
    pub fn assemble<R: Rng + ?Sized>(&self, rng: &mut R, spec: &DatasetSpec) -> LabeledDataset {
        assert!(
            spec.spoof_rate > 0.0 && spec.spoof_rate <= 1.0,
            "spoof rate must be in (0, 1], got {}",
            spec.spoof_rate
        );

        let n_journeys = spec.rows / Self::ROWS_PER_JOURNEY;
        let n_spoofed = (n_journeys as f64 * spec.spoof_rate).floor() as usize;
        let n_normal = n_journeys - n_spoofed;

        let mut records = Vec::with_capacity(spec.rows + Self::MAX_JOURNEY_LEN);
        let mut journeys = Vec::with_capacity(n_journeys);

        for slot in 0..n_journeys {
            let spoofed = slot >= n_normal;
            self.push_journey(rng, spec, spoofed, &mut records, &mut journeys);
        }

        let mut padding = 0;
        while records.len() < spec.rows {
            self.push_journey(rng, spec, false, &mut records, &mut journeys);
            padding += 1;
        }
        if padding > 0 {
            debug!(padding, "Padded dataset with extra normal journeys");
        }

        records.shuffle(rng);
        records.truncate(spec.rows);

        let dataset = LabeledDataset { records, journeys };
        info!(
            rows = dataset.len(),
            journeys = dataset.journeys.len(),
            spoofed_journeys = n_spoofed,
            spoof_fraction = dataset.spoof_fraction(),
            "Dataset assembled"
        );
        for (kind, count) in dataset.attack_mix() {
            debug!(attack = %kind, journeys = count, "Attack mix");
        }
        dataset
    }

    fn push_journey<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        spec: &DatasetSpec,
        spoofed: bool,
        records: &mut Vec<LabeledRecord>,
        journeys: &mut Vec<JourneySummary>,
    ) {
        let length = rng.gen_range(Self::MIN_JOURNEY_LEN..=Self::MAX_JOURNEY_LEN);
        let lat = spec.base_lat + rng.gen_range(-Self::ORIGIN_JITTER_DEG..=Self::ORIGIN_JITTER_DEG);
        let lon = spec.base_lon + rng.gen_range(-Self::ORIGIN_JITTER_DEG..=Self::ORIGIN_JITTER_DEG);

        let mut journey = self
            .simulator
            .simulate_normal(rng, spec.start_time, lat, lon, length);
        let spoof = if spoofed {
            Some(self.injector.inject_random(rng, &mut journey.events).kind)
        } else {
            None
        };

        let installation_id = random_uuid(rng);
        journeys.push(JourneySummary {
            installation_id,
            kind: journey.kind,
            spoof,
            events: journey.len(),
        });

        for event in journey.events {
            records.push(LabeledRecord {
                record: EventRecord {
                    event_id: random_uuid(rng),
                    installation_id,
                    event,
                },
                spoofed,
            });
        }
    }
}
