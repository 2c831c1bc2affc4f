//! Rule coverage tracking
//!
//! Counts how often each rule fired during a detection pass so that rules
//! which never trigger on a dataset are easy to spot.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    fires: BTreeMap<String, u64>,
    evaluated_rows: u64,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_row(&mut self) {
        self.evaluated_rows += 1;
    }

    pub fn record_fire(&mut self, rule_id: &str) {
        *self.fires.entry(rule_id.to_string()).or_insert(0) += 1;
    }

    pub fn get_count(&self, rule_id: &str) -> u64 {
        self.fires.get(rule_id).copied().unwrap_or(0)
    }

    pub fn report(&self, all_rule_ids: &[String]) -> CoverageReport {
        let mut fire_counts = BTreeMap::new();
        let mut silent = Vec::new();
        for rule_id in all_rule_ids {
            let count = self.get_count(rule_id);
            if count == 0 {
                silent.push(rule_id.clone());
            }
            fire_counts.insert(rule_id.clone(), count);
        }

        let fired = all_rule_ids.len() - silent.len();
        CoverageReport {
            total_rules: all_rule_ids.len(),
            fired_rules: fired,
            silent_rules: silent,
            coverage_percentage: if all_rule_ids.is_empty() {
                0.0
            } else {
                (fired as f64 / all_rule_ids.len() as f64) * 100.0
            },
            evaluated_rows: self.evaluated_rows,
            fire_counts,
        }
    }
}

/// Per-rule firing summary of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub total_rules: usize,
    pub fired_rules: usize,
    pub silent_rules: Vec<String>,
    pub coverage_percentage: f64,
    pub evaluated_rows: u64,
    pub fire_counts: BTreeMap<String, u64>,
}

impl CoverageReport {
    /// Human-readable summary, one line per rule.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Rule coverage\n");
        out.push_str(&format!("{}\n", "=".repeat(40)));
        out.push_str(&format!("Rows evaluated: {}\n", self.evaluated_rows));
        out.push_str(&format!(
            "Rules fired: {}/{} ({:.1}%)\n",
            self.fired_rules, self.total_rules, self.coverage_percentage
        ));
        for (rule_id, count) in &self.fire_counts {
            out.push_str(&format!("  {:<20} {}\n", rule_id, count));
        }
        if !self.silent_rules.is_empty() {
            out.push_str(&format!("Never fired: {}\n", self.silent_rules.join(", ")));
        }
        out
    }
}
