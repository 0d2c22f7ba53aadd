// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation CLI for real-vs-synthetic image detectors
//!
//! Usage:
//!   evaluate-detector --datasets datasets.json --scores scores.csv --model-name ojha2023
//!   evaluate-detector --real-path ./real --fake-path ./fake --source synthbuster --key sdxl --random

use anyhow::{bail, Result};
use clap::Parser;
use detector_eval::datasets::DatasetSpec;
use detector_eval::detectors::{Detector, RandomDetector, ScoreTableDetector};
use detector_eval::pipeline::{EvaluationConfig, EvaluationPipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "evaluate-detector")]
#[command(about = "Evaluate a real-vs-synthetic image detector on benchmark datasets")]
#[command(version)]
struct Args {
    /// JSON manifest of datasets (used unless real/fake/source are all given)
    #[arg(short, long, default_value = "datasets.json")]
    datasets: PathBuf,

    /// Directory or path-list file of real images
    #[arg(long)]
    real_path: Option<PathBuf>,

    /// Directory or path-list file of generated images
    #[arg(long)]
    fake_path: Option<PathBuf>,

    /// Benchmark source tag (e.g. wang2020, ojha2023, synthbuster)
    #[arg(long)]
    source: Option<String>,

    /// Dataset key for a single-dataset run
    #[arg(long, default_value = "custom")]
    key: String,

    /// Generator family for a single-dataset run
    #[arg(long, default_value = "")]
    family: String,

    /// CSV of precomputed detector scores (path,score)
    #[arg(long, conflicts_with = "random")]
    scores: Option<PathBuf>,

    /// Use the seeded chance-level detector instead of a score table
    #[arg(long)]
    random: bool,

    /// Images sampled per class per dataset
    #[arg(long, default_value_t = 20)]
    max_sample: usize,

    #[arg(long, default_value = "Imagenet:resnet50")]
    backbone: String,

    #[arg(long, default_value = "linear")]
    classifier: String,

    #[arg(long, default_value = "detector")]
    model_name: String,

    /// Root directory for results
    #[arg(short, long, default_value = "result")]
    result_folder: PathBuf,

    #[arg(short, long, default_value_t = 32)]
    batch_size: usize,

    /// JPEG quality the scores were computed under (100, 90, ... 30)
    #[arg(long)]
    jpeg_quality: Option<u32>,

    /// Gaussian blur sigma the scores were computed under (0..4)
    #[arg(long)]
    gaussian_sigma: Option<u32>,

    /// Random seed re-applied for each dataset
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Skip datasets that fail instead of aborting
    #[arg(long)]
    skip_failed: bool,
}

impl Args {
    fn dataset_specs(&self) -> Result<Vec<DatasetSpec>> {
        match (&self.real_path, &self.fake_path, &self.source) {
            (Some(real_path), Some(fake_path), Some(source)) => Ok(vec![DatasetSpec {
                real_path: real_path.clone(),
                fake_path: fake_path.clone(),
                source: source.clone(),
                key: self.key.clone(),
                family: self.family.clone(),
            }]),
            _ => DatasetSpec::load_manifest(&self.datasets),
        }
    }

    fn detector(&self) -> Result<Box<dyn Detector>> {
        if self.random {
            return Ok(Box::new(RandomDetector::new(self.seed)));
        }
        match &self.scores {
            Some(path) => Ok(Box::new(ScoreTableDetector::from_csv(self.model_name.clone(), path)?)),
            None => bail!("either --scores or --random is required"),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("classifier: {}", args.classifier);
    tracing::info!("backbone: {}", args.backbone);
    tracing::info!("model_name: {}", args.model_name);

    let datasets = args.dataset_specs()?;
    let mut detector = args.detector()?;

    let config = EvaluationConfig {
        seed: args.seed,
        model_name: args.model_name.clone(),
        classifier: args.classifier.clone(),
        backbone: args.backbone.clone(),
        max_sample: args.max_sample,
        batch_size: args.batch_size,
        jpeg_quality: args.jpeg_quality,
        gaussian_sigma: args.gaussian_sigma,
        result_folder: args.result_folder.clone(),
        skip_failed_datasets: args.skip_failed,
    };

    let pipeline = EvaluationPipeline::new(config, datasets);
    let results = pipeline.run_and_save(detector.as_mut())?;

    println!("\n{}", "=".repeat(70));
    println!("EVALUATION SUMMARY ({})", results.detector);
    println!("{}", "=".repeat(70));
    println!(
        "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Dataset", "AP", "AUC", "Acc@.5", "Oracle", "Thresh"
    );
    println!("{:-<70}", "");
    for report in &results.reports {
        let m = &report.metrics;
        let oracle = m.oracle_threshold.map_or("-".to_string(), |s| format!("{:.4}", s.acc));
        let threshold = m.best_threshold.map_or("-".to_string(), |t| format!("{:.3}", t));
        println!(
            "{:<20} {:>8.4} {:>8.4} {:>8.4} {:>8} {:>8}",
            report.key, m.ap, m.roc_auc, m.threshold_05.acc, oracle, threshold
        );
    }
    println!("{:-<70}", "");

    if !results.skipped.is_empty() {
        println!("Skipped: {}", results.skipped.join(", "));
    }
    println!("Results saved to: {}", pipeline.config().output_folder().display());

    Ok(())
}
