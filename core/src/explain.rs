//! Explanation boundary
//!
//! Flagged events are handed to an [`Explainer`], which turns the event's
//! evidence into a sentence for a human reviewer. Implementations live in the
//! agents crate.

use crate::detector::DetectionReport;
use crate::event::EventRecord;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedEvent {
    pub event_id: Uuid,
    pub spoof_score: f64,
    pub spoof_flag: bool,
    pub record: EventRecord,
    pub fired_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub event_id: Uuid,
    pub spoof_score: f64,
    pub spoof_flag: u8,
    pub explanation: String,
}

#[async_trait]
pub trait Explainer: Send + Sync {
    fn name(&self) -> &str;
    async fn explain(&self, event: &FlaggedEvent) -> anyhow::Result<String>;
}

/// Join the flagged predictions of `report` back to their rows by event id.
///
/// The rule engine has no graded score, so the flag doubles as the score.
pub fn flagged_events(records: &[EventRecord], report: &DetectionReport) -> Vec<FlaggedEvent> {
    records
        .iter()
        .filter(|r| report.is_flagged(&r.event_id))
        .map(|r| FlaggedEvent {
            event_id: r.event_id,
            spoof_score: 1.0,
            spoof_flag: true,
            record: r.clone(),
            fired_rules: report.rules_for(&r.event_id).to_vec(),
        })
        .collect()
}

/// Pick `round(fraction * len)` of `events` at random; a small fraction of a
/// short list can select nothing.
pub fn sample_flagged<R: Rng + ?Sized>(
    rng: &mut R,
    events: &[FlaggedEvent],
    fraction: f64,
) -> Vec<FlaggedEvent> {
    if events.is_empty() {
        return Vec::new();
    }
    let wanted = (events.len() as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
    events.choose_multiple(rng, wanted).cloned().collect()
}

pub async fn explain_all(
    explainer: &dyn Explainer,
    events: &[FlaggedEvent],
) -> anyhow::Result<Vec<Explanation>> {
    let mut explanations = Vec::with_capacity(events.len());
    for event in events {
        let text = explainer.explain(event).await?;
        debug!(
            explainer = explainer.name(),
            event_id = %event.event_id,
            "Explained flagged event"
        );
        explanations.push(Explanation {
            event_id: event.event_id,
            spoof_score: event.spoof_score,
            spoof_flag: u8::from(event.spoof_flag),
            explanation: text,
        });
    }
    Ok(explanations)
}
