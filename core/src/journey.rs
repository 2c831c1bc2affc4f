//! Normal journey simulation
//!
//! A journey is a fixed-interval sequence of events from one device. Three
//! archetypes are modelled: a device sitting still, a loose random walk, and a
//! car holding a steady heading while hopping between cell towers.

use crate::event::LocationEvent;
use crate::geo::advance;
use crate::synth::{gaussian, AnchorPool, EventSynthesizer};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyKind {
    Stationary,
    Walking,
    Driving,
}

impl JourneyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyKind::Stationary => "stationary",
            JourneyKind::Walking => "walking",
            JourneyKind::Driving => "driving",
        }
    }
}

/// A simulated journey prior to identity assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    pub kind: JourneyKind,
    pub events: Vec<LocationEvent>,
}

impl Journey {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Wrap a bearing into [0, 360).
pub(crate) fn normalize_bearing(bearing: f64) -> f64 {
    let wrapped = bearing.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

pub struct JourneySimulator {
    synthesizer: EventSynthesizer,
    anchors: AnchorPool,
}

impl JourneySimulator {
    pub const SAMPLE_INTERVAL_S: i64 = 10;
    pub const WALKING_SPEED_MPS: f64 = 1.4;
    pub const DRIVING_SPEED_MPS: f64 = 15.0;
    pub const DRIVING_PROBABILITY: f64 = 0.3;
    pub const STATIONARY_PROBABILITY: f64 = 0.5;
    pub const STATIONARY_WIFI_PROBABILITY: f64 = 0.8;
    /// Inclusive range of steps between cell tower handoffs while driving.
    pub const HANDOFF_INTERVAL: (usize, usize) = (5, 10);

    pub fn new(anchors: AnchorPool) -> Self {
        Self {
            synthesizer: EventSynthesizer::new(),
            anchors,
        }
    }

    pub fn anchors(&self) -> &AnchorPool {
        &self.anchors
    }

    /// Pick an archetype: 30% driving, otherwise an even split between
    /// stationary and walking.
    pub fn choose_kind<R: Rng + ?Sized>(rng: &mut R) -> JourneyKind {
        if rng.gen_bool(Self::DRIVING_PROBABILITY) {
            JourneyKind::Driving
        } else if rng.gen_bool(Self::STATIONARY_PROBABILITY) {
            JourneyKind::Stationary
        } else {
            JourneyKind::Walking
        }
    }

    pub fn simulate_normal<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        start_time: i64,
        start_lat: f64,
        start_lon: f64,
        length: usize,
    ) -> Journey {
        let kind = Self::choose_kind(rng);
        self.simulate(rng, kind, start_time, start_lat, start_lon, length)
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        kind: JourneyKind,
        start_time: i64,
        start_lat: f64,
        start_lon: f64,
        length: usize,
    ) -> Journey {
        let events = match kind {
            JourneyKind::Stationary => {
                self.simulate_on_foot(rng, true, start_time, start_lat, start_lon, length)
            }
            JourneyKind::Walking => {
                self.simulate_on_foot(rng, false, start_time, start_lat, start_lon, length)
            }
            JourneyKind::Driving => {
                self.simulate_driving(rng, start_time, start_lat, start_lon, length)
            }
        };
        Journey { kind, events }
    }

    fn simulate_on_foot<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        stationary: bool,
        start_time: i64,
        start_lat: f64,
        start_lon: f64,
        length: usize,
    ) -> Vec<LocationEvent> {
        let nominal_speed = if stationary {
            0.0
        } else {
            Self::WALKING_SPEED_MPS
        };
        let wifi_bssid = if stationary && rng.gen_bool(Self::STATIONARY_WIFI_PROBABILITY) {
            self.anchors.random_wifi(rng)
        } else {
            None
        };
        let cell_tower_id = self.anchors.random_cell(rng);

        let (mut lat, mut lon) = (start_lat, start_lon);
        let mut events = Vec::with_capacity(length);

        for i in 0..length {
            let timestamp = start_time + i as i64 * Self::SAMPLE_INTERVAL_S;
            let mut event = self.synthesizer.synthesize(rng, timestamp, lat, lon);
            if stationary {
                event.speed = 0.0;
                event.bearing = 0.0;
            } else {
                event.speed = gaussian(rng, nominal_speed, 0.2).max(0.0);
                event.bearing = rng.gen_range(0.0..360.0);
            }
            event.wifi_bssid = wifi_bssid.clone();
            event.cell_tower_id = cell_tower_id.clone();
            events.push(event);

            if !stationary {
                // Loose walk: a fresh heading every step.
                let heading = rng.gen_range(0.0..360.0);
                (lat, lon) = advance(
                    lat,
                    lon,
                    nominal_speed * Self::SAMPLE_INTERVAL_S as f64,
                    heading,
                );
            }
        }

        events
    }

    fn simulate_driving<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        start_time: i64,
        start_lat: f64,
        start_lon: f64,
        length: usize,
    ) -> Vec<LocationEvent> {
        let (min_handoff, max_handoff) = Self::HANDOFF_INTERVAL;
        let base_bearing: f64 = rng.gen_range(0.0..360.0);
        let mut cell_tower_id = self.anchors.random_cell(rng);
        let mut next_handoff = rng.gen_range(min_handoff..=max_handoff);

        let (mut lat, mut lon) = (start_lat, start_lon);
        let mut events = Vec::with_capacity(length);

        for i in 0..length {
            let timestamp = start_time + i as i64 * Self::SAMPLE_INTERVAL_S;
            let mut event = self.synthesizer.synthesize(rng, timestamp, lat, lon);

            if i == next_handoff {
                cell_tower_id = self.anchors.random_cell(rng);
                next_handoff += rng.gen_range(min_handoff..=max_handoff);
            }

            event.speed = gaussian(rng, Self::DRIVING_SPEED_MPS, 2.0).max(0.0);
            event.bearing = normalize_bearing(base_bearing + gaussian(rng, 0.0, 5.0));
            event.wifi_bssid = None;
            event.cell_tower_id = cell_tower_id.clone();
            events.push(event);

            let heading = base_bearing + gaussian(rng, 0.0, 5.0);
            (lat, lon) = advance(
                lat,
                lon,
                Self::DRIVING_SPEED_MPS * Self::SAMPLE_INTERVAL_S as f64,
                heading,
            );
        }

        events
    }
}
