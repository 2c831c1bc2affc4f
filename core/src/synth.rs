//! Single-event sensor synthesis
//!
//! The noise model shared by every journey archetype. All randomness comes from
//! the generator handed in by the caller so that a seeded run is reproducible.

use crate::event::LocationEvent;
use crate::geo::implied_pressure;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw from Normal(mean, std_dev).
pub(crate) fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std_dev * z
}

/// Environmental anchors (WiFi access points and cell towers) a simulated
/// device may observe.
#[derive(Debug, Clone)]
pub struct AnchorPool {
    pub wifi_bssids: Vec<String>,
    pub cell_tower_ids: Vec<String>,
}

impl AnchorPool {
    pub const WIFI_COUNT: usize = 10;
    pub const CELL_COUNT: usize = 20;

    /// Build the standard pool: ten fixed BSSIDs and twenty randomly numbered
    /// cell towers.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let wifi_bssids = (0..Self::WIFI_COUNT)
            .map(|i| format!("0a:1b:2c:3d:4e:{:02x}", i))
            .collect();
        let cell_tower_ids = (0..Self::CELL_COUNT)
            .map(|_| {
                format!(
                    "420-55-{}-{}",
                    rng.gen_range(1000..=9999),
                    rng.gen_range(1000..=9999)
                )
            })
            .collect();
        Self {
            wifi_bssids,
            cell_tower_ids,
        }
    }

    pub fn random_wifi<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.wifi_bssids.choose(rng).cloned()
    }

    pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.cell_tower_ids.choose(rng).cloned()
    }
}

/// Produces individual sensor readings around a ground-truth position.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSynthesizer;

impl EventSynthesizer {
    pub const MIN_ALTITUDE_M: f64 = 10.0;
    pub const MIN_HORIZONTAL_ACCURACY_M: f64 = 2.0;
    pub const MIN_VERTICAL_ACCURACY_M: f64 = 3.0;
    pub const POSITION_NOISE_DEG: f64 = 1e-5;
    pub const CHARGING_PROBABILITY: f64 = 0.2;

    pub fn new() -> Self {
        Self
    }

    /// Synthesize a reading at `timestamp` near (`lat`, `lon`).
    ///
    /// Motion fields (speed, bearing) and anchors are left empty; the journey
    /// simulator fills them in.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timestamp: i64,
        lat: f64,
        lon: f64,
    ) -> LocationEvent {
        let altitude = gaussian(rng, 50.0, 10.0).max(Self::MIN_ALTITUDE_M);
        let horizontal_accuracy =
            gaussian(rng, 10.0, 5.0).max(Self::MIN_HORIZONTAL_ACCURACY_M);
        let vertical_accuracy = gaussian(rng, 15.0, 8.0).max(Self::MIN_VERTICAL_ACCURACY_M);
        let pressure_hpa = implied_pressure(altitude) + gaussian(rng, 0.0, 0.5);
        let latitude = lat + gaussian(rng, 0.0, Self::POSITION_NOISE_DEG);
        let longitude = lon + gaussian(rng, 0.0, Self::POSITION_NOISE_DEG);
        let ambient_light_lux = gaussian(rng, 200.0, 50.0).max(0.0);
        let num_satellites = rng.gen_range(8..=20);
        let device_is_charging = rng.gen_bool(Self::CHARGING_PROBABILITY);

        LocationEvent {
            timestamp_unix: timestamp,
            latitude,
            longitude,
            horizontal_accuracy,
            vertical_accuracy,
            altitude,
            pressure_hpa,
            ambient_light_lux,
            num_satellites,
            device_is_charging,
            mock_location_enabled: false,
            speed: 0.0,
            bearing: 0.0,
            wifi_bssid: None,
            cell_tower_id: None,
        }
    }
}
