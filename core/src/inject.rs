//! Spoof attack injection
//!
//! Each archetype corrupts only the fields a real attack of that class would
//! touch, leaving the rest of the journey plausible. Length and timestamps are
//! never changed.

use crate::event::LocationEvent;
use crate::journey::JourneySimulator;
use crate::synth::gaussian;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoofKind {
    /// OS-level mock location provider left enabled.
    MockProvider,
    /// One position jumps ~11 km per axis while the anchors stay behind.
    Teleport,
    /// Scripted replay with a too-perfect, constant signature.
    BotReplay,
    /// Position pinned while the device keeps reporting walking speed.
    FrozenLocation,
    /// Altitude oscillates while pressure stays flat.
    SensorMismatch,
}

impl SpoofKind {
    pub const ALL: [SpoofKind; 5] = [
        SpoofKind::MockProvider,
        SpoofKind::Teleport,
        SpoofKind::BotReplay,
        SpoofKind::FrozenLocation,
        SpoofKind::SensorMismatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpoofKind::MockProvider => "mock_provider",
            SpoofKind::Teleport => "teleport",
            SpoofKind::BotReplay => "bot_replay",
            SpoofKind::FrozenLocation => "frozen_location",
            SpoofKind::SensorMismatch => "sensor_mismatch",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for SpoofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an injection actually did to a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Injection {
    pub kind: SpoofKind,
    /// Index of the teleported event, for [`SpoofKind::Teleport`].
    pub target_index: Option<usize>,
    /// False when the journey was too short for the archetype and left untouched.
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpoofInjector;

impl SpoofInjector {
    pub const TELEPORT_OFFSET_DEG: f64 = 0.1;
    pub const TELEPORT_BASE_SPEED_MPS: f64 = 1500.0;
    pub const REPLAY_ACCURACY_M: f64 = 1.0;
    pub const REPLAY_SATELLITES: u32 = 25;
    pub const REPLAY_BEARING_DEG: f64 = 45.0;
    /// Frozen journeys always claim at least this much speed.
    pub const FROZEN_MIN_SPEED_MPS: f64 = 1.05;

    pub fn new() -> Self {
        Self
    }

    /// Inject a uniformly chosen archetype.
    pub fn inject_random<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        events: &mut [LocationEvent],
    ) -> Injection {
        let kind = SpoofKind::random(rng);
        self.inject(rng, kind, events)
    }

    pub fn inject<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        kind: SpoofKind,
        events: &mut [LocationEvent],
    ) -> Injection {
        let mut injection = Injection {
            kind,
            target_index: None,
            applied: !events.is_empty(),
        };

        match kind {
            SpoofKind::MockProvider => {
                for event in events.iter_mut() {
                    event.mock_location_enabled = true;
                }
            }
            SpoofKind::Teleport => {
                if events.len() < 2 {
                    injection.applied = false;
                    return injection;
                }
                let index = rng.gen_range(1..events.len());
                let (wifi, cell) = {
                    let prev = &events[index - 1];
                    (prev.wifi_bssid.clone(), prev.cell_tower_id.clone())
                };
                let target = &mut events[index];
                target.latitude += Self::TELEPORT_OFFSET_DEG;
                target.longitude += Self::TELEPORT_OFFSET_DEG;
                target.wifi_bssid = wifi;
                target.cell_tower_id = cell;
                target.speed = Self::TELEPORT_BASE_SPEED_MPS + rng.gen_range(100.0..200.0);
                injection.target_index = Some(index);
            }
            SpoofKind::BotReplay => {
                for event in events.iter_mut() {
                    event.horizontal_accuracy = Self::REPLAY_ACCURACY_M;
                    event.vertical_accuracy = Self::REPLAY_ACCURACY_M;
                    event.num_satellites = Self::REPLAY_SATELLITES;
                    event.speed = JourneySimulator::DRIVING_SPEED_MPS;
                    event.bearing = Self::REPLAY_BEARING_DEG;
                }
            }
            SpoofKind::FrozenLocation => {
                let Some((lat, lon)) = events.first().map(|e| (e.latitude, e.longitude)) else {
                    return injection;
                };
                for event in events.iter_mut() {
                    event.latitude = lat;
                    event.longitude = lon;
                    event.speed = gaussian(rng, JourneySimulator::WALKING_SPEED_MPS, 0.2)
                        .max(Self::FROZEN_MIN_SPEED_MPS);
                }
            }
            SpoofKind::SensorMismatch => {
                let Some(base_pressure) = events.first().map(|e| e.pressure_hpa) else {
                    return injection;
                };
                for (i, event) in events.iter_mut().enumerate() {
                    event.altitude = 50.0 + 25.0 * (i as f64 / 5.0).sin();
                    event.pressure_hpa = base_pressure + gaussian(rng, 0.0, 0.1);
                }
            }
        }

        injection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{haversine_distance, implied_speed};
    use crate::journey::{Journey, JourneyKind};
    use crate::synth::AnchorPool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn journey(rng: &mut StdRng, kind: JourneyKind, len: usize) -> Journey {
        let sim = JourneySimulator::new(AnchorPool::generate(rng));
        sim.simulate(rng, kind, 1_700_000_000, 40.7128, -74.006, len)
    }

    #[test]
    fn test_mock_provider_only_sets_flag() {
        let mut rng = StdRng::seed_from_u64(1);
        let original = journey(&mut rng, JourneyKind::Walking, 20);
        let mut events = original.events.clone();
        SpoofInjector::new().inject(&mut rng, SpoofKind::MockProvider, &mut events);
        for (before, after) in original.events.iter().zip(&events) {
            assert!(after.mock_location_enabled);
            let mut restored = after.clone();
            restored.mock_location_enabled = false;
            assert_eq!(&restored, before);
        }
    }

    #[test]
    fn test_teleport_jumps_one_index_and_keeps_anchors() {
        let mut rng = StdRng::seed_from_u64(2);
        let original = journey(&mut rng, JourneyKind::Driving, 30);
        let mut events = original.events.clone();
        let injection = SpoofInjector::new().inject(&mut rng, SpoofKind::Teleport, &mut events);
        let i = injection.target_index.unwrap();
        assert!((1..30).contains(&i));

        assert!((events[i].latitude - original.events[i].latitude - 0.1).abs() < 1e-9);
        assert!((events[i].longitude - original.events[i].longitude - 0.1).abs() < 1e-9);
        assert_eq!(events[i].cell_tower_id, events[i - 1].cell_tower_id);
        assert_eq!(events[i].wifi_bssid, events[i - 1].wifi_bssid);
        assert!(events[i].speed >= 1600.0 && events[i].speed < 1700.0);

        let d = haversine_distance(
            events[i - 1].latitude,
            events[i - 1].longitude,
            events[i].latitude,
            events[i].longitude,
        )
        .unwrap();
        assert!(implied_speed(d, 10.0).unwrap() > 343.0);

        for (j, (before, after)) in original.events.iter().zip(&events).enumerate() {
            if j != i {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_teleport_short_journey_is_noop() {
        let mut rng = StdRng::seed_from_u64(3);
        let original = journey(&mut rng, JourneyKind::Walking, 1);
        let mut events = original.events.clone();
        let injection = SpoofInjector::new().inject(&mut rng, SpoofKind::Teleport, &mut events);
        assert!(!injection.applied);
        assert_eq!(events, original.events);
    }

    #[test]
    fn test_bot_replay_signature() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut events = journey(&mut rng, JourneyKind::Stationary, 15).events;
        SpoofInjector::new().inject(&mut rng, SpoofKind::BotReplay, &mut events);
        for e in &events {
            assert_eq!(e.horizontal_accuracy, 1.0);
            assert_eq!(e.vertical_accuracy, 1.0);
            assert_eq!(e.num_satellites, 25);
            assert_eq!(e.speed, 15.0);
            assert_eq!(e.bearing, 45.0);
        }
    }

    #[test]
    fn test_frozen_location_pins_position() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut events = journey(&mut rng, JourneyKind::Driving, 40).events;
        SpoofInjector::new().inject(&mut rng, SpoofKind::FrozenLocation, &mut events);
        let (lat, lon) = (events[0].latitude, events[0].longitude);
        for e in &events {
            assert_eq!((e.latitude, e.longitude), (lat, lon));
            assert!(e.speed > 1.0);
        }
    }

    #[test]
    fn test_sensor_mismatch_decouples_altitude() {
        let mut rng = StdRng::seed_from_u64(6);
        let original = journey(&mut rng, JourneyKind::Walking, 25);
        let mut events = original.events.clone();
        SpoofInjector::new().inject(&mut rng, SpoofKind::SensorMismatch, &mut events);
        let base = original.events[0].pressure_hpa;
        for (i, e) in events.iter().enumerate() {
            assert!((e.altitude - (50.0 + 25.0 * (i as f64 / 5.0).sin())).abs() < 1e-12);
            assert!((e.pressure_hpa - base).abs() < 1.0);
        }
    }

    #[test]
    fn test_empty_journey_is_safe_for_every_kind() {
        let mut rng = StdRng::seed_from_u64(7);
        for kind in SpoofKind::ALL {
            let mut events: Vec<LocationEvent> = Vec::new();
            let injection = SpoofInjector::new().inject(&mut rng, kind, &mut events);
            assert!(!injection.applied);
        }
    }

    #[test]
    fn test_random_kind_covers_all() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(SpoofKind::random(&mut rng));
        }
        assert_eq!(seen.len(), 5);
    }
}
