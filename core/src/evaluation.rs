//! Scoring predictions against ground truth
//!
//! Predictions and labels are joined on event id. Rows present on only one
//! side are counted separately instead of being paired up by position.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    /// Predictions with no matching label
    pub unmatched_predictions: usize,
    /// Labels with no matching prediction
    pub unmatched_labels: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        predictions: &BTreeMap<Uuid, bool>,
        labels: &BTreeMap<Uuid, bool>,
    ) -> Self {
        let mut matrix = Self::default();
        for (event_id, predicted) in predictions {
            match labels.get(event_id) {
                Some(true) if *predicted => matrix.true_positives += 1,
                Some(true) => matrix.false_negatives += 1,
                Some(false) if *predicted => matrix.false_positives += 1,
                Some(false) => matrix.true_negatives += 1,
                None => matrix.unmatched_predictions += 1,
            }
        }
        matrix.unmatched_labels = labels
            .keys()
            .filter(|id| !predictions.contains_key(id))
            .count();
        matrix
    }

    pub fn matched(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.matched())
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            matrix: *self,
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
            accuracy: self.accuracy(),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationSummary {
    #[serde(flatten)]
    pub matrix: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Precision: {:.4}", self.precision)?;
        writeln!(f, "Recall:    {:.4}", self.recall)?;
        writeln!(f, "F1:        {:.4}", self.f1)?;
        writeln!(f, "Accuracy:  {:.4}", self.accuracy)?;
        write!(
            f,
            "TP={} FP={} TN={} FN={}",
            self.matrix.true_positives,
            self.matrix.false_positives,
            self.matrix.true_negatives,
            self.matrix.false_negatives
        )?;
        if self.matrix.unmatched_predictions + self.matrix.unmatched_labels > 0 {
            write!(
                f,
                " (unmatched: {} predictions, {} labels)",
                self.matrix.unmatched_predictions, self.matrix.unmatched_labels
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(u128, bool)]) -> BTreeMap<Uuid, bool> {
        entries
            .iter()
            .map(|(id, flag)| (Uuid::from_u128(*id), *flag))
            .collect()
    }

    #[test]
    fn test_join_by_event_id() {
        let predictions = map(&[(1, true), (2, true), (3, false), (4, false), (9, true)]);
        let labels = map(&[(4, true), (3, false), (2, false), (1, true), (8, false)]);
        let m = ConfusionMatrix::from_predictions(&predictions, &labels);
        assert_eq!(m.true_positives, 1);
        assert_eq!(m.false_positives, 1);
        assert_eq!(m.true_negatives, 1);
        assert_eq!(m.false_negatives, 1);
        assert_eq!(m.unmatched_predictions, 1);
        assert_eq!(m.unmatched_labels, 1);
        assert_eq!(m.precision(), 0.5);
        assert_eq!(m.recall(), 0.5);
        assert_eq!(m.f1(), 0.5);
        assert_eq!(m.accuracy(), 0.5);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let m = ConfusionMatrix::from_predictions(&map(&[(1, false)]), &map(&[(1, false)]));
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.f1(), 0.0);
        assert_eq!(m.accuracy(), 1.0);
    }

    #[test]
    fn test_summary_display() {
        let m = ConfusionMatrix::from_predictions(&map(&[(1, true)]), &map(&[(1, true)]));
        let text = m.summary().to_string();
        assert!(text.contains("Precision: 1.0000"));
        assert!(text.contains("TP=1 FP=0 TN=0 FN=0"));
    }
}
