use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use spoof_sentry_agents::{RemoteExplainer, TemplateExplainer};
use spoof_sentry_connectors as connectors;
use spoof_sentry_core::config::SpoofSentryConfig;
use spoof_sentry_core::dataset::{DatasetAssembler, LabeledDataset};
use spoof_sentry_core::detector::SequentialRuleDetector;
use spoof_sentry_core::evaluation::ConfusionMatrix;
use spoof_sentry_core::explain::{self, Explainer};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

fn load_config(path: Option<&Path>) -> Result<SpoofSentryConfig> {
    match path {
        Some(path) => SpoofSentryConfig::from_file(path),
        None => Ok(SpoofSentryConfig::default()),
    }
}

fn seeded_rng(seed: Option<u64>) -> (u64, StdRng) {
    let seed = seed.unwrap_or_else(rand::random::<u64>);
    (seed, StdRng::seed_from_u64(seed))
}

fn print_dataset(name: &str, dataset: &LabeledDataset) {
    println!(
        "{}: {} rows from {} devices, {:.1}% spoofed",
        name,
        dataset.len(),
        dataset.journeys.len(),
        dataset.spoof_fraction() * 100.0
    );
    for (kind, count) in dataset.attack_mix() {
        println!("   └─ {}: {} devices", kind, count);
    }
}

pub fn generate(config_path: Option<&Path>, out_dir: &Path, seed: Option<u64>) -> Result<()> {
    let config = load_config(config_path)?;
    let sim = &config.simulation;
    let (seed, mut rng) = seeded_rng(seed.or(sim.seed));
    let start_time = sim
        .start_time
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    info!(seed, start_time, "Generating datasets");

    let assembler = DatasetAssembler::new(&mut rng);
    let train_rate = sim.train_spoof_rate.sample(&mut rng);
    let train_spec = sim.dataset_spec(sim.train_rows, train_rate, start_time);
    let train = assembler.assemble(&mut rng, &train_spec);
    let test_rate = sim.test_spoof_rate.sample(&mut rng);
    let test_spec = sim.dataset_spec(sim.test_rows, test_rate, start_time);
    let test = assembler.assemble(&mut rng, &test_spec);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    connectors::write_labeled_csv(out_dir.join("train.csv"), &train.records)?;
    connectors::write_events_csv(out_dir.join("test.csv"), &test.unlabeled())?;
    connectors::write_labels_csv(out_dir.join("test_labels.csv"), &test.labels())?;

    println!("✅ Generated datasets in {} (seed {})", out_dir.display(), seed);
    print_dataset("train", &train);
    print_dataset("test", &test);
    Ok(())
}

#[derive(Debug, Serialize)]
struct RuleResult {
    event_id: Uuid,
    spoof_score_rules: f64,
    spoof_flag_rules: u8,
}

pub fn detect(config_path: Option<&Path>, input: &Path, out_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let records = connectors::read_events_csv(input)?;
    let detector = SequentialRuleDetector::from_config(&config.detector);
    let report = detector.detect(&records);

    // Results keep the input row order
    let results: Vec<RuleResult> = records
        .iter()
        .map(|r| {
            let flag = u8::from(report.is_flagged(&r.event_id));
            RuleResult {
                event_id: r.event_id,
                spoof_score_rules: f64::from(flag),
                spoof_flag_rules: flag,
            }
        })
        .collect();

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    connectors::write_predictions_csv(out_dir.join("rules_predictions.csv"), &report)?;
    connectors::write_json(out_dir.join("results.json"), &results)?;

    println!(
        "✅ Flagged {} of {} events",
        report.flagged_count(),
        records.len()
    );
    println!("{}", report.coverage.render());
    Ok(())
}

pub fn evaluate(predictions: &Path, labels: &Path, json: bool) -> Result<()> {
    let predictions = connectors::read_predictions_csv(predictions)?;
    let labels = connectors::read_labels_csv(labels)?;
    let summary = ConfusionMatrix::from_predictions(&predictions, &labels).summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

pub async fn explain(
    config_path: Option<&Path>,
    input: &Path,
    output: &Path,
    fraction: Option<f64>,
    seed: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let fraction = fraction.unwrap_or(config.explain.sample_fraction);
    if !(fraction > 0.0 && fraction <= 1.0) {
        anyhow::bail!("Sample fraction must lie in (0, 1], got {}", fraction);
    }

    let records = connectors::read_events_csv(input)?;
    let report = SequentialRuleDetector::from_config(&config.detector).detect(&records);
    let flagged = explain::flagged_events(&records, &report);
    if flagged.is_empty() {
        println!("No events flagged as spoofed. Nothing to explain.");
        return Ok(());
    }

    let (seed, mut rng) = seeded_rng(seed.or(config.simulation.seed));
    let sample = explain::sample_flagged(&mut rng, &flagged, fraction);
    info!(seed, flagged = flagged.len(), sampled = sample.len(), "Sampled flagged events");

    let explainer: Box<dyn Explainer> = match RemoteExplainer::from_config(&config.explain)? {
        Some(remote) => Box::new(remote),
        None => Box::new(TemplateExplainer),
    };
    let explanations = explain::explain_all(explainer.as_ref(), &sample).await?;
    connectors::write_json(output, &explanations)?;

    println!(
        "✅ Explained {} of {} flagged events with the {} explainer",
        explanations.len(),
        flagged.len(),
        explainer.name()
    );
    Ok(())
}

pub fn validate(config_path: &Path) -> Result<()> {
    let config = SpoofSentryConfig::from_file(config_path)?;
    println!(
        "✅ Configuration is valid ({} rules, {} enabled)",
        config.detector.rules.len(),
        config.detector.rules.iter().filter(|r| r.enabled).count()
    );
    for rule in &config.detector.rules {
        let status = if rule.enabled { "on" } else { "off" };
        println!("   └─ [{}] {} ({})", status, rule.name, rule.id);
    }
    Ok(())
}
