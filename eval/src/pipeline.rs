// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible multi-dataset evaluation of one detector
//!
//! Orchestrates:
//! - Seeded per-dataset sampling
//! - Batched scoring through a [`Detector`]
//! - Metrics computation with oracle threshold search
//! - Results serialization via [`crate::report`]

use crate::datasets::{Dataset, DatasetSpec, Label, Sample};
use crate::detectors::Detector;
use crate::metrics::{evaluate, MetricsReport};
use crate::report;
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the evaluation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Seed re-applied before sampling each dataset
    pub seed: u64,
    /// Detector family name (e.g. "ojha2023")
    pub model_name: String,
    /// Classifier head name (e.g. "linear")
    pub classifier: String,
    /// Feature backbone identifier, recorded for provenance
    pub backbone: String,
    /// Images sampled per class per dataset
    pub max_sample: usize,
    /// Samples per detector call
    pub batch_size: usize,
    /// JPEG re-compression quality applied upstream, if any
    pub jpeg_quality: Option<u32>,
    /// Gaussian blur sigma applied upstream, if any
    pub gaussian_sigma: Option<u32>,
    /// Root directory for results
    pub result_folder: PathBuf,
    /// Log and continue when a dataset fails instead of aborting the run
    pub skip_failed_datasets: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            model_name: "detector".to_string(),
            classifier: "linear".to_string(),
            backbone: "Imagenet:resnet50".to_string(),
            max_sample: 20,
            batch_size: 32,
            jpeg_quality: None,
            gaussian_sigma: None,
            result_folder: PathBuf::from("result"),
            skip_failed_datasets: false,
        }
    }
}

impl EvaluationConfig {
    /// `<result_folder>/<model>_<classifier>/_jpeg_<q>_gaussian_<s>`
    pub fn output_folder(&self) -> PathBuf {
        self.result_folder
            .join(format!("{}_{}", self.model_name, self.classifier))
            .join(format!(
                "_jpeg_{}_gaussian_{}",
                perturbation_tag(self.jpeg_quality),
                perturbation_tag(self.gaussian_sigma)
            ))
    }
}

fn perturbation_tag(value: Option<u32>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

/// Metrics for one dataset, tagged with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub source: String,
    pub key: String,
    pub family: String,
    pub metrics: MetricsReport,
}

/// Complete evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub config: EvaluationConfig,
    pub detector: String,
    pub reports: Vec<DatasetReport>,
    /// Keys of datasets that failed and were skipped
    pub skipped: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Score `samples` in batches and evaluate the collected scores
pub fn validate(
    detector: &mut dyn Detector,
    samples: &[Sample],
    batch_size: usize,
    search_oracle_threshold: bool,
) -> Result<MetricsReport> {
    ensure!(batch_size > 0, "batch size must be positive");

    let mut labels: Vec<Label> = Vec::with_capacity(samples.len());
    let mut scores: Vec<f64> = Vec::with_capacity(samples.len());

    for batch in samples.chunks(batch_size) {
        let predictions = detector.predict(batch)?;
        ensure!(
            predictions.len() == batch.len(),
            "detector '{}' returned {} scores for a batch of {}",
            detector.name(),
            predictions.len(),
            batch.len()
        );
        scores.extend(predictions);
        labels.extend(batch.iter().map(|s| s.label));
    }

    Ok(evaluate(&labels, &scores, search_oracle_threshold)?)
}

/// Main evaluation pipeline
pub struct EvaluationPipeline {
    config: EvaluationConfig,
    datasets: Vec<DatasetSpec>,
}

impl EvaluationPipeline {
    pub fn new(config: EvaluationConfig, datasets: Vec<DatasetSpec>) -> Self {
        Self { config, datasets }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    fn evaluate_dataset(&self, detector: &mut dyn Detector, spec: &DatasetSpec) -> Result<DatasetReport> {
        let dataset = Dataset::load(spec, self.config.max_sample, self.config.seed)
            .with_context(|| format!("Failed to load dataset '{}'", spec.key))?;

        tracing::info!("{} {} {}", spec.source, spec.key, dataset.len());

        let metrics = validate(detector, &dataset.samples, self.config.batch_size, true)
            .with_context(|| format!("Failed to evaluate dataset '{}'", spec.key))?;

        Ok(DatasetReport {
            source: spec.source.clone(),
            key: spec.key.clone(),
            family: spec.family.clone(),
            metrics,
        })
    }

    /// Evaluate every dataset, in manifest order
    pub fn run(&self, detector: &mut dyn Detector) -> Result<EvaluationResults> {
        tracing::info!(
            "Evaluating '{}' ({} / {}) on {} datasets",
            detector.name(),
            self.config.model_name,
            self.config.classifier,
            self.datasets.len()
        );

        let mut reports = Vec::new();
        let mut skipped = Vec::new();

        for spec in &self.datasets {
            match self.evaluate_dataset(detector, spec) {
                Ok(report) => {
                    tracing::info!(
                        "  {} - AP: {:.4}, ROC-AUC: {:.4}, Acc@0.5: {:.4}",
                        report.key,
                        report.metrics.ap,
                        report.metrics.roc_auc,
                        report.metrics.threshold_05.acc
                    );
                    reports.push(report);
                }
                Err(err) if self.config.skip_failed_datasets => {
                    tracing::warn!("Skipping dataset '{}': {:#}", spec.key, err);
                    skipped.push(spec.key.clone());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(EvaluationResults {
            config: self.config.clone(),
            detector: detector.name().to_string(),
            reports,
            skipped,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Run and write everything to [`EvaluationConfig::output_folder`]
    pub fn run_and_save(&self, detector: &mut dyn Detector) -> Result<EvaluationResults> {
        let results = self.run(detector)?;
        report::write_metrics(&self.config.output_folder(), &results)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{RandomDetector, ScoreTableDetector};
    use crate::error::MetricsError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Real images score low, fake images score high
    struct OracleDetector;

    impl Detector for OracleDetector {
        fn predict(&mut self, batch: &[Sample]) -> Result<Vec<f64>> {
            Ok(batch.iter().map(|s| if s.label.is_fake() { 0.9 } else { 0.1 }).collect())
        }

        fn name(&self) -> &str {
            "Oracle"
        }
    }

    struct ShortDetector;

    impl Detector for ShortDetector {
        fn predict(&mut self, batch: &[Sample]) -> Result<Vec<f64>> {
            Ok(vec![0.5; batch.len().saturating_sub(1)])
        }

        fn name(&self) -> &str {
            "Short"
        }
    }

    fn make_dataset(root: &Path, key: &str, real: usize, fake: usize) -> DatasetSpec {
        let real_dir = root.join(key).join("real");
        let fake_dir = root.join(key).join("fake");
        fs::create_dir_all(&real_dir).unwrap();
        fs::create_dir_all(&fake_dir).unwrap();
        for i in 0..real {
            fs::write(real_dir.join(format!("{}.png", i)), b"").unwrap();
        }
        for i in 0..fake {
            fs::write(fake_dir.join(format!("{}.jpg", i)), b"").unwrap();
        }
        DatasetSpec {
            real_path: real_dir,
            fake_path: fake_dir,
            source: "wang2020".to_string(),
            key: key.to_string(),
            family: "gan".to_string(),
        }
    }

    fn samples(labels: &[Label]) -> Vec<Sample> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| Sample {
                path: PathBuf::from(format!("{}.png", i)),
                label: *label,
            })
            .collect()
    }

    #[test]
    fn test_output_folder_naming() {
        let config = EvaluationConfig {
            model_name: "ojha2023".to_string(),
            classifier: "linear".to_string(),
            jpeg_quality: Some(90),
            result_folder: PathBuf::from("out"),
            ..EvaluationConfig::default()
        };
        assert_eq!(
            config.output_folder(),
            PathBuf::from("out/ojha2023_linear/_jpeg_90_gaussian_None")
        );
    }

    #[test]
    fn test_validate_batches_in_order() {
        let labels = [Label::Real, Label::Real, Label::Real, Label::Fake, Label::Fake];
        let report = validate(&mut OracleDetector, &samples(&labels), 2, true).unwrap();

        assert!((report.roc_auc - 1.0).abs() < 1e-12);
        assert_eq!(report.threshold_05.acc, 1.0);
        assert!(report.best_threshold.is_some());
    }

    #[test]
    fn test_validate_rejects_short_predictions() {
        let labels = [Label::Real, Label::Fake];
        let err = validate(&mut ShortDetector, &samples(&labels), 8, false).unwrap_err();
        assert!(err.to_string().contains("returned 1 scores"));
    }

    #[test]
    fn test_validate_surfaces_degenerate_labels() {
        let labels = [Label::Fake, Label::Fake];
        let err = validate(&mut RandomDetector::new(0), &samples(&labels), 8, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetricsError>(),
            Some(MetricsError::DegenerateLabelSet { .. })
        ));
    }

    #[test]
    fn test_pipeline_runs_all_datasets() {
        let tmp = TempDir::new().unwrap();
        let specs = vec![
            make_dataset(tmp.path(), "progan", 6, 6),
            make_dataset(tmp.path(), "stylegan", 4, 9),
        ];
        let config = EvaluationConfig {
            max_sample: 5,
            batch_size: 3,
            result_folder: tmp.path().join("results"),
            ..EvaluationConfig::default()
        };

        let pipeline = EvaluationPipeline::new(config, specs);
        let results = pipeline.run(&mut OracleDetector).unwrap();

        assert_eq!(results.reports.len(), 2);
        assert_eq!(results.reports[0].key, "progan");
        assert_eq!(results.reports[1].family, "gan");
        assert!(results.reports.iter().all(|r| r.metrics.oracle_threshold.is_some()));
        assert!(results.skipped.is_empty());
    }

    #[test]
    fn test_pipeline_is_reproducible() {
        let tmp = TempDir::new().unwrap();
        let specs = vec![make_dataset(tmp.path(), "dalle", 30, 30)];
        let config = EvaluationConfig {
            max_sample: 10,
            seed: 3,
            ..EvaluationConfig::default()
        };
        let pipeline = EvaluationPipeline::new(config, specs);

        let a = pipeline.run(&mut RandomDetector::new(1)).unwrap();
        let b = pipeline.run(&mut RandomDetector::new(1)).unwrap();
        assert_eq!(a.reports, b.reports);
    }

    #[test]
    fn test_pipeline_skip_or_abort() {
        let tmp = TempDir::new().unwrap();
        let specs = vec![
            make_dataset(tmp.path(), "only_real", 4, 0),
            make_dataset(tmp.path(), "biggan", 4, 4),
        ];

        let abort = EvaluationPipeline::new(EvaluationConfig::default(), specs.clone());
        assert!(abort.run(&mut OracleDetector).is_err());

        let config = EvaluationConfig {
            skip_failed_datasets: true,
            ..EvaluationConfig::default()
        };
        let results = EvaluationPipeline::new(config, specs).run(&mut OracleDetector).unwrap();
        assert_eq!(results.skipped, vec!["only_real".to_string()]);
        assert_eq!(results.reports.len(), 1);
    }

    #[test]
    fn test_run_and_save_with_score_table() {
        let tmp = TempDir::new().unwrap();
        let spec = make_dataset(tmp.path(), "glide", 3, 3);
        let mut table = Vec::new();
        for i in 0..3 {
            table.push((spec.real_path.join(format!("{}.png", i)), 0.2 + i as f64 * 0.1));
            table.push((spec.fake_path.join(format!("{}.jpg", i)), 0.6 + i as f64 * 0.1));
        }
        let mut detector = ScoreTableDetector::new("table", table);

        let config = EvaluationConfig {
            result_folder: tmp.path().join("results"),
            ..EvaluationConfig::default()
        };
        let output = config.output_folder();
        let results = EvaluationPipeline::new(config, vec![spec])
            .run_and_save(&mut detector)
            .unwrap();

        assert_eq!(results.reports.len(), 1);
        assert!(output.join("metrics.json").exists());
        assert!(output.join("curves.json").exists());
    }
}
