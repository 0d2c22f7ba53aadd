// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! On-disk results layout
//!
//! One output folder per run:
//! - `ap.txt`, `roc_auc.txt`: `key: <percent>`
//! - `acc_05.txt`, `acc_oracle.txt`: `key: <real>  <fake>  <overall>` in percent
//! - `best_threshold.txt`: `key: <threshold>`
//! - `metrics.json`: every report without its curves
//! - `curves.json`: ROC and PR curves with dataset identity
//! - `run.json`: configuration and provenance

use crate::curves::{PrPoint, RocPoint};
use crate::metrics::{ConfusionStats, MetricsReport};
use crate::pipeline::{DatasetReport, EvaluationConfig, EvaluationResults};
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const METRICS_FILE: &str = "metrics.json";
pub const CURVES_FILE: &str = "curves.json";
pub const RUN_FILE: &str = "run.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetricsEntry {
    ap: f64,
    roc_auc: f64,
    threshold_05: ConfusionStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    best_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    oracle_threshold: Option<ConfusionStats>,
    source: String,
    key: String,
    family: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CurvesEntry {
    roc_curve: Vec<RocPoint>,
    precision_recall_curve: Vec<PrPoint>,
    key: String,
    source: String,
    family: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunEntry {
    config: EvaluationConfig,
    detector: String,
    datasets: Vec<String>,
    skipped: Vec<String>,
    timestamp: DateTime<Utc>,
    version: String,
}

/// Round like the percent summaries do and keep at least one decimal
///
/// `format_number(0.5, 2) == "0.5"`, `format_number(50.0, 2) == "50.0"`.
pub fn format_number(value: f64, places: usize) -> String {
    let rounded: f64 = format!("{:.*}", places, value).parse().unwrap_or(value);
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}

/// A rate as a percentage with two decimals
pub fn format_metric(metric: f64) -> String {
    format_number(metric * 100.0, 2)
}

fn accuracy_line(key: &str, stats: &ConfusionStats) -> String {
    format!(
        "{}: {}  {}  {}\n",
        key,
        format_metric(stats.r_acc),
        format_metric(stats.f_acc),
        format_metric(stats.acc)
    )
}

fn summary_files(reports: &[DatasetReport]) -> Vec<(&'static str, String)> {
    let mut ap = String::new();
    let mut roc_auc = String::new();
    let mut acc_05 = String::new();
    let mut acc_oracle = String::new();
    let mut best_threshold = String::new();

    for report in reports {
        let m = &report.metrics;
        ap.push_str(&format!("{}: {}\n", report.key, format_metric(m.ap)));
        roc_auc.push_str(&format!("{}: {}\n", report.key, format_metric(m.roc_auc)));
        acc_05.push_str(&accuracy_line(&report.key, &m.threshold_05));
        if let Some(stats) = &m.oracle_threshold {
            acc_oracle.push_str(&accuracy_line(&report.key, stats));
        }
        if let Some(threshold) = m.best_threshold {
            best_threshold.push_str(&format!("{}: {}\n", report.key, format_number(threshold, 3)));
        }
    }

    vec![
        ("ap.txt", ap),
        ("acc_05.txt", acc_05),
        ("acc_oracle.txt", acc_oracle),
        ("roc_auc.txt", roc_auc),
        ("best_threshold.txt", best_threshold),
    ]
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Replace `output_folder` with a fresh copy of every results file
pub fn write_metrics(output_folder: &Path, results: &EvaluationResults) -> Result<()> {
    if output_folder.exists() {
        fs::remove_dir_all(output_folder)
            .with_context(|| format!("Failed to clear {}", output_folder.display()))?;
    }
    fs::create_dir_all(output_folder)
        .with_context(|| format!("Failed to create {}", output_folder.display()))?;

    for (name, contents) in summary_files(&results.reports) {
        let path = output_folder.join(name);
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let (metrics, curves): (Vec<MetricsEntry>, Vec<CurvesEntry>) = results
        .reports
        .iter()
        .map(|r| {
            let m = &r.metrics;
            (
                MetricsEntry {
                    ap: m.ap,
                    roc_auc: m.roc_auc,
                    threshold_05: m.threshold_05,
                    best_threshold: m.best_threshold,
                    oracle_threshold: m.oracle_threshold,
                    source: r.source.clone(),
                    key: r.key.clone(),
                    family: r.family.clone(),
                },
                CurvesEntry {
                    roc_curve: m.roc_curve.clone(),
                    precision_recall_curve: m.precision_recall_curve.clone(),
                    key: r.key.clone(),
                    source: r.source.clone(),
                    family: r.family.clone(),
                },
            )
        })
        .unzip();

    write_json(&output_folder.join(METRICS_FILE), &metrics)?;
    write_json(&output_folder.join(CURVES_FILE), &curves)?;
    write_json(
        &output_folder.join(RUN_FILE),
        &RunEntry {
            config: results.config.clone(),
            detector: results.detector.clone(),
            datasets: results.reports.iter().map(|r| r.key.clone()).collect(),
            skipped: results.skipped.clone(),
            timestamp: results.timestamp,
            version: results.version.clone(),
        },
    )?;

    tracing::info!("Results saved to {}", output_folder.display());
    Ok(())
}

/// Rebuild dataset reports from `metrics.json` and `curves.json`
pub fn read_reports(output_folder: &Path) -> Result<Vec<DatasetReport>> {
    let metrics: Vec<MetricsEntry> = read_json(&output_folder.join(METRICS_FILE))?;
    let curves: Vec<CurvesEntry> = read_json(&output_folder.join(CURVES_FILE))?;

    ensure!(
        metrics.len() == curves.len(),
        "{} lists {} datasets but {} lists {}",
        METRICS_FILE,
        metrics.len(),
        CURVES_FILE,
        curves.len()
    );

    metrics
        .into_iter()
        .zip(curves)
        .enumerate()
        .map(|(idx, (entry, curves))| -> Result<DatasetReport> {
            ensure!(
                entry.key == curves.key && entry.source == curves.source,
                "Entry {} is {}/{} in {} but {}/{} in {}",
                idx,
                entry.source,
                entry.key,
                METRICS_FILE,
                curves.source,
                curves.key,
                CURVES_FILE
            );
            Ok(DatasetReport {
                source: entry.source,
                key: entry.key,
                family: entry.family,
                metrics: MetricsReport {
                    ap: entry.ap,
                    roc_auc: entry.roc_auc,
                    roc_curve: curves.roc_curve,
                    precision_recall_curve: curves.precision_recall_curve,
                    threshold_05: entry.threshold_05,
                    best_threshold: entry.best_threshold,
                    oracle_threshold: entry.oracle_threshold,
                },
            })
        })
        .collect()
}
