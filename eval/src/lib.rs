// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation pipeline for real-vs-synthetic image detectors
//!
//! This crate provides:
//! - Threshold search (separable midpoint and oracle accuracy grid)
//! - Detection metrics (AP, ROC-AUC, ROC and PR curves, confusion rates)
//! - Seeded sampling of benchmark datasets
//! - A multi-dataset pipeline over any [`Detector`]
//! - Text and JSON results writers

pub mod curves;
pub mod datasets;
pub mod detectors;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod threshold;

pub use curves::{average_precision, precision_recall_curve, roc_auc, roc_curve, PrPoint, RocPoint};
pub use datasets::{Dataset, DatasetSpec, Label, Sample};
pub use detectors::{Detector, RandomDetector, ScoreTableDetector};
pub use error::{MetricsError, MetricsResult};
pub use metrics::{confusion_stats_at, evaluate, ConfusionMatrix, ConfusionStats, MetricsReport};
pub use pipeline::{validate, DatasetReport, EvaluationConfig, EvaluationPipeline, EvaluationResults};
pub use threshold::{search_best_accuracy_threshold, search_separable_threshold};
