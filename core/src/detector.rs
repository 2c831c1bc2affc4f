//! Sequential rule-based spoof detection
//!
//! The detector rebuilds each device's chronological history from a flat
//! table, derives displacement and implied speed from the previous event, and
//! folds every enabled rule over each row with a logical OR. Nothing is kept
//! between calls.

use crate::config::DetectorConfig;
use crate::coverage::{CoverageReport, CoverageTracker};
use crate::event::EventRecord;
use crate::geo::{haversine_distance, implied_speed};
use crate::rule::{default_rules, MotionContext, Rule};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of one detection pass, keyed by event id.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub predictions: BTreeMap<Uuid, bool>,
    /// Ids of the rules that fired, for flagged events only.
    pub fired_rules: BTreeMap<Uuid, Vec<String>>,
    pub coverage: CoverageReport,
}

impl DetectionReport {
    pub fn is_flagged(&self, event_id: &Uuid) -> bool {
        self.predictions.get(event_id).copied().unwrap_or(false)
    }

    pub fn flagged_count(&self) -> usize {
        self.predictions.values().filter(|flag| **flag).count()
    }

    pub fn rules_for(&self, event_id: &Uuid) -> &[String] {
        self.fired_rules
            .get(event_id)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }
}

/// Group rows by device, order each group by time (event id breaks ties) and
/// attach the motion delta from the previous row of the same device.
///
/// # Panics
///
/// Panics if a row carries the nil installation id: such a row cannot be
/// placed in any device history, and guessing would silently produce wrong
/// labels.
pub fn reconstruct_motion(records: &[EventRecord]) -> Vec<MotionContext<'_>> {
    let mut by_device: BTreeMap<Uuid, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        assert!(
            !record.installation_id.is_nil(),
            "event {} has an empty installation id",
            record.event_id
        );
        by_device
            .entry(record.installation_id)
            .or_default()
            .push(record);
    }

    let mut contexts = Vec::with_capacity(records.len());
    for (_, mut history) in by_device {
        history.sort_by(|a, b| {
            a.event
                .timestamp_unix
                .cmp(&b.event.timestamp_unix)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });

        let mut prev: Option<&EventRecord> = None;
        for record in history {
            let (distance_from_prev, speed_from_prev) = match prev {
                Some(p) => {
                    let distance = haversine_distance(
                        record.event.latitude,
                        record.event.longitude,
                        p.event.latitude,
                        p.event.longitude,
                    );
                    let dt = (record.event.timestamp_unix - p.event.timestamp_unix) as f64;
                    (distance, distance.and_then(|d| implied_speed(d, dt)))
                }
                None => (None, None),
            };
            contexts.push(MotionContext {
                record,
                distance_from_prev,
                speed_from_prev,
            });
            prev = Some(record);
        }
    }

    contexts
}

pub struct SequentialRuleDetector {
    rules: Vec<Rule>,
}

impl Default for SequentialRuleDetector {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl SequentialRuleDetector {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.rules.clone())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn toggle_rule(&mut self, rule_id: &str, enabled: bool) -> Result<()> {
        match self.rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                Ok(())
            }
            None => anyhow::bail!("Rule not found: {}", rule_id),
        }
    }

    /// Flag every row of `records`. The result does not depend on row order.
    pub fn detect(&self, records: &[EventRecord]) -> DetectionReport {
        let enabled: Vec<&Rule> = self.rules.iter().filter(|r| r.enabled).collect();
        let contexts = reconstruct_motion(records);

        let mut tracker = CoverageTracker::new();
        let mut predictions = BTreeMap::new();
        let mut fired_rules: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();

        for ctx in &contexts {
            tracker.record_row();
            let fired: Vec<String> = enabled
                .iter()
                .filter(|rule| rule.matches(ctx))
                .map(|rule| rule.id.clone())
                .collect();
            for rule_id in &fired {
                tracker.record_fire(rule_id);
            }

            let event_id = ctx.record.event_id;
            let flag = predictions.entry(event_id).or_insert(false);
            *flag |= !fired.is_empty();
            if !fired.is_empty() {
                fired_rules.entry(event_id).or_default().extend(fired);
            }
        }

        let rule_ids: Vec<String> = enabled.iter().map(|r| r.id.clone()).collect();
        let coverage = tracker.report(&rule_ids);
        let report = DetectionReport {
            predictions,
            fired_rules,
            coverage,
        };

        for (rule_id, count) in &report.coverage.fire_counts {
            debug!(rule_id = %rule_id, fired = count, "Rule summary");
        }
        let devices: BTreeSet<Uuid> = records.iter().map(|r| r.installation_id).collect();
        info!(
            rows = records.len(),
            devices = devices.len(),
            rules = enabled.len(),
            flagged = report.flagged_count(),
            "Detection pass complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LocationEvent;
    use crate::rule::RuleKind;

    fn event(ts: i64, lat: f64, lon: f64) -> LocationEvent {
        LocationEvent {
            timestamp_unix: ts,
            latitude: lat,
            longitude: lon,
            horizontal_accuracy: 9.0,
            vertical_accuracy: 14.0,
            altitude: 50.0,
            pressure_hpa: 1007.2,
            ambient_light_lux: 180.0,
            num_satellites: 12,
            device_is_charging: false,
            mock_location_enabled: false,
            speed: 1.4,
            bearing: 90.0,
            wifi_bssid: None,
            cell_tower_id: Some("420-55-1111-2222".to_string()),
        }
    }

    fn record(id: u128, device: u128, event: LocationEvent) -> EventRecord {
        EventRecord {
            event_id: Uuid::from_u128(id),
            installation_id: Uuid::from_u128(device),
            event,
        }
    }

    #[test]
    fn test_first_event_has_no_history() {
        let rows = vec![
            record(2, 7, event(20, 40.0001, -74.0)),
            record(1, 7, event(10, 40.0, -74.0)),
        ];
        let contexts = reconstruct_motion(&rows);
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].record.event_id, Uuid::from_u128(1));
        assert!(contexts[0].distance_from_prev.is_none());
        assert!(contexts[0].speed_from_prev.is_none());
        let d = contexts[1].distance_from_prev.unwrap();
        assert!((d - 11.1).abs() < 0.2, "got {}", d);
        assert!((contexts[1].speed_from_prev.unwrap() - d / 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_time_delta_leaves_speed_undefined() {
        let rows = vec![
            record(1, 7, event(10, 40.0, -74.0)),
            record(2, 7, event(10, 41.0, -74.0)),
        ];
        let report = SequentialRuleDetector::default().detect(&rows);
        assert!(!report.is_flagged(&Uuid::from_u128(2)));
    }

    #[test]
    fn test_devices_do_not_share_history() {
        // Same time, far apart, different devices: no teleport
        let rows = vec![
            record(1, 1, event(10, 40.0, -74.0)),
            record(2, 2, event(20, 41.0, -73.0)),
        ];
        let report = SequentialRuleDetector::default().detect(&rows);
        assert_eq!(report.flagged_count(), 0);
    }

    #[test]
    fn test_teleport_and_frozen_rules_fire() {
        let mut frozen = event(30, 40.0, -74.0);
        frozen.speed = 1.5;
        let rows = vec![
            record(1, 1, event(10, 40.0, -74.0)),
            record(2, 1, event(20, 40.1, -73.9)),
            record(3, 2, event(10, 40.0, -74.0)),
            record(4, 2, frozen),
        ];
        let report = SequentialRuleDetector::default().detect(&rows);
        assert!(!report.is_flagged(&Uuid::from_u128(1)));
        assert_eq!(report.rules_for(&Uuid::from_u128(2)), ["impossible_speed"]);
        assert!(!report.is_flagged(&Uuid::from_u128(3)));
        assert_eq!(report.rules_for(&Uuid::from_u128(4)), ["frozen_location"]);
        assert_eq!(report.coverage.fire_counts["impossible_speed"], 1);
        assert!(report
            .coverage
            .silent_rules
            .contains(&"mock_location".to_string()));
    }

    #[test]
    fn test_multiple_rules_accumulate() {
        let mut e = event(10, 40.0, -74.0);
        e.mock_location_enabled = true;
        e.horizontal_accuracy = 1.0;
        e.pressure_hpa = 980.0;
        let rows = vec![record(1, 1, e)];
        let report = SequentialRuleDetector::default().detect(&rows);
        assert_eq!(
            report.rules_for(&Uuid::from_u128(1)),
            ["mock_location", "perfect_accuracy", "pressure_mismatch"]
        );
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let mut e = event(10, 40.0, -74.0);
        e.mock_location_enabled = true;
        let rows = vec![record(1, 1, e)];

        let mut detector = SequentialRuleDetector::default();
        detector.toggle_rule("mock_location", false).unwrap();
        assert!(!detector.detect(&rows).is_flagged(&Uuid::from_u128(1)));
        assert!(detector.toggle_rule("missing", true).is_err());
    }

    #[test]
    fn test_custom_rule_is_pure_data() {
        let mut e = event(10, 40.0, -74.0);
        e.horizontal_accuracy = 2.5;
        let rows = vec![record(1, 1, e)];
        let mut detector = SequentialRuleDetector::new(Vec::new());
        assert_eq!(detector.detect(&rows).flagged_count(), 0);
        detector.add_rule(Rule::new(
            "accuracy_2_5",
            "Accuracy 2.5",
            RuleKind::PerfectAccuracy { accuracy: 2.5 },
        ));
        assert_eq!(detector.detect(&rows).flagged_count(), 1);
    }

    #[test]
    #[should_panic(expected = "empty installation id")]
    fn test_nil_device_panics() {
        let rows = vec![record(1, 0, event(10, 40.0, -74.0))];
        SequentialRuleDetector::default().detect(&rows);
    }
}
