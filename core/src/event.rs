use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single sensor reading reported by a device.
///
/// Floating point fields use `NaN` for "missing" once a table has been
/// ingested from an external source; simulated events are always complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub timestamp_unix: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
    pub altitude: f64,
    pub pressure_hpa: f64,
    pub ambient_light_lux: f64,
    pub num_satellites: u32,
    pub device_is_charging: bool,
    pub mock_location_enabled: bool,
    /// Reported speed in m/s
    pub speed: f64,
    /// Reported bearing in degrees, [0, 360)
    pub bearing: f64,
    pub wifi_bssid: Option<String>,
    pub cell_tower_id: Option<String>,
}

/// An event tagged with its identity inside a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub installation_id: Uuid,
    #[serde(flatten)]
    pub event: LocationEvent,
}

/// An event record together with its ground-truth label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: EventRecord,
    pub spoofed: bool,
}

impl LabeledRecord {
    pub fn event_id(&self) -> Uuid {
        self.record.event_id
    }
}
