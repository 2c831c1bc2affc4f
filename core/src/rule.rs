use crate::event::EventRecord;
use crate::geo::implied_pressure;
use serde::{Deserialize, Serialize};

/// Per-row view handed to every rule: the event itself plus the motion
/// reconstructed from the previous event of the same device.
#[derive(Debug, Clone, Copy)]
pub struct MotionContext<'a> {
    pub record: &'a EventRecord,
    /// Meters from the previous event; `None` for the first event of a device.
    pub distance_from_prev: Option<f64>,
    /// Implied speed from the previous event; `None` when undefined.
    pub speed_from_prev: Option<f64>,
}

/// The check a rule performs, with its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// The OS reports a mock location provider.
    MockLocation,
    /// Implied speed from the previous point exceeds a physical ceiling.
    ImpossibleSpeed { max_speed_mps: f64 },
    /// Horizontal accuracy equals an exact, suspiciously perfect value.
    PerfectAccuracy { accuracy: f64 },
    /// No displacement since the previous point while claiming motion.
    FrozenLocation { min_speed_mps: f64 },
    /// Pressure disagrees with the pressure implied by altitude.
    PressureMismatch { max_deviation_hpa: f64 },
}

impl RuleKind {
    /// Comparisons against missing (`None`/`NaN`) inputs are false, so a rule
    /// never fires on data it cannot evaluate.
    pub fn matches(&self, ctx: &MotionContext<'_>) -> bool {
        let event = &ctx.record.event;
        match self {
            RuleKind::MockLocation => event.mock_location_enabled,
            RuleKind::ImpossibleSpeed { max_speed_mps } => ctx
                .speed_from_prev
                .is_some_and(|speed| speed > *max_speed_mps),
            RuleKind::PerfectAccuracy { accuracy } => event.horizontal_accuracy == *accuracy,
            RuleKind::FrozenLocation { min_speed_mps } => {
                ctx.distance_from_prev == Some(0.0) && event.speed > *min_speed_mps
            }
            RuleKind::PressureMismatch { max_deviation_hpa } => {
                (event.pressure_hpa - implied_pressure(event.altitude)).abs() > *max_deviation_hpa
            }
        }
    }

    fn threshold(&self) -> Option<(&'static str, f64)> {
        match self {
            RuleKind::MockLocation => None,
            RuleKind::ImpossibleSpeed { max_speed_mps } => Some(("max_speed_mps", *max_speed_mps)),
            RuleKind::PerfectAccuracy { accuracy } => Some(("accuracy", *accuracy)),
            RuleKind::FrozenLocation { min_speed_mps } => Some(("min_speed_mps", *min_speed_mps)),
            RuleKind::PressureMismatch { max_deviation_hpa } => {
                Some(("max_deviation_hpa", *max_deviation_hpa))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional description of what the rule catches
    #[serde(default)]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            enabled: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn matches(&self, ctx: &MotionContext<'_>) -> bool {
        self.kind.matches(ctx)
    }

    /// Problems that make the rule meaningless, e.g. a non-finite threshold.
    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.id.trim().is_empty() {
            issues.push(format!("rule '{}' has an empty id", self.name));
        }
        if let Some((field, value)) = self.kind.threshold() {
            if !value.is_finite() {
                issues.push(format!("rule '{}': {} is not finite", self.id, field));
            } else if value <= 0.0 {
                issues.push(format!("rule '{}': {} must be positive", self.id, field));
            }
        }
        issues
    }
}

/// Speed of sound in air, used as a hard ceiling for ground devices.
pub const SPEED_OF_SOUND_MPS: f64 = 343.0;
pub const PRESSURE_DEVIATION_HPA: f64 = 15.0;
pub const FROZEN_SPEED_MPS: f64 = 1.0;
pub const PERFECT_ACCURACY_M: f64 = 1.0;

/// The standard rule set, in evaluation order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("mock_location", "Mock Location Flag", RuleKind::MockLocation)
            .with_description("Direct OS evidence of a mock location provider"),
        Rule::new(
            "impossible_speed",
            "Impossible Speed",
            RuleKind::ImpossibleSpeed {
                max_speed_mps: SPEED_OF_SOUND_MPS,
            },
        )
        .with_description("Implied speed from the previous point exceeds the speed of sound"),
        Rule::new(
            "perfect_accuracy",
            "Perfect Accuracy",
            RuleKind::PerfectAccuracy {
                accuracy: PERFECT_ACCURACY_M,
            },
        )
        .with_description("Bots and emulators often report exactly 1 m accuracy"),
        Rule::new(
            "frozen_location",
            "Frozen Location",
            RuleKind::FrozenLocation {
                min_speed_mps: FROZEN_SPEED_MPS,
            },
        )
        .with_description("Reported speed says moving, coordinates say otherwise"),
        Rule::new(
            "pressure_mismatch",
            "Altitude/Pressure Mismatch",
            RuleKind::PressureMismatch {
                max_deviation_hpa: PRESSURE_DEVIATION_HPA,
            },
        )
        .with_description("Barometric pressure inconsistent with reported altitude"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LocationEvent;
    use uuid::Uuid;

    fn record(altitude: f64, pressure_hpa: f64) -> EventRecord {
        EventRecord {
            event_id: Uuid::from_u128(1),
            installation_id: Uuid::from_u128(2),
            event: LocationEvent {
                timestamp_unix: 0,
                latitude: 40.7,
                longitude: -74.0,
                horizontal_accuracy: 8.0,
                vertical_accuracy: 12.0,
                altitude,
                pressure_hpa,
                ambient_light_lux: 200.0,
                num_satellites: 10,
                device_is_charging: false,
                mock_location_enabled: false,
                speed: 0.0,
                bearing: 0.0,
                wifi_bssid: None,
                cell_tower_id: None,
            },
        }
    }

    fn ctx(record: &EventRecord) -> MotionContext<'_> {
        MotionContext {
            record,
            distance_from_prev: None,
            speed_from_prev: None,
        }
    }

    #[test]
    fn test_pressure_mismatch_scenarios() {
        let rule = RuleKind::PressureMismatch {
            max_deviation_hpa: 15.0,
        };
        let consistent = record(50.0, 1013.25);
        assert!(!rule.matches(&ctx(&consistent)));
        let mismatched = record(50.0, 980.0);
        assert!(rule.matches(&ctx(&mismatched)));
        let missing = record(f64::NAN, 980.0);
        assert!(!rule.matches(&ctx(&missing)));
    }

    #[test]
    fn test_motion_rules_need_history() {
        let mut r = record(50.0, 1007.0);
        r.event.speed = 3.0;
        let speed = RuleKind::ImpossibleSpeed {
            max_speed_mps: 343.0,
        };
        let frozen = RuleKind::FrozenLocation { min_speed_mps: 1.0 };
        assert!(!speed.matches(&ctx(&r)));
        assert!(!frozen.matches(&ctx(&r)));

        let with_history = MotionContext {
            record: &r,
            distance_from_prev: Some(0.0),
            speed_from_prev: Some(0.0),
        };
        assert!(frozen.matches(&with_history));
        assert!(!speed.matches(&with_history));

        let teleport = MotionContext {
            record: &r,
            distance_from_prev: Some(14_000.0),
            speed_from_prev: Some(1_400.0),
        };
        assert!(speed.matches(&teleport));
        assert!(!frozen.matches(&teleport));
    }

    #[test]
    fn test_perfect_accuracy_is_exact() {
        let rule = RuleKind::PerfectAccuracy { accuracy: 1.0 };
        let mut r = record(50.0, 1007.0);
        r.event.horizontal_accuracy = 1.0;
        assert!(rule.matches(&ctx(&r)));
        r.event.horizontal_accuracy = 1.000_001;
        assert!(!rule.matches(&ctx(&r)));
    }

    #[test]
    fn test_rule_deserializes_from_tagged_map() {
        let json = r#"{"id":"speed","name":"Speed","type":"impossible_speed","max_speed_mps":300.0}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.kind,
            RuleKind::ImpossibleSpeed {
                max_speed_mps: 300.0
            }
        );
        assert!(rule.enabled);
        assert!(rule.lint().is_empty());
    }

    #[test]
    fn test_lint_rejects_bad_thresholds() {
        let rule = Rule::new(
            "bad",
            "Bad",
            RuleKind::PressureMismatch {
                max_deviation_hpa: -1.0,
            },
        );
        assert_eq!(rule.lint().len(), 1);
        let rule = Rule::new("", "Nan", RuleKind::FrozenLocation { min_speed_mps: f64::NAN });
        assert_eq!(rule.lint().len(), 2);
    }

    #[test]
    fn test_default_rules_order() {
        let ids: Vec<_> = default_rules().into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                "mock_location",
                "impossible_speed",
                "perfect_accuracy",
                "frozen_location",
                "pressure_mismatch"
            ]
        );
    }
}
