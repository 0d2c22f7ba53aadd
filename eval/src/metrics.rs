// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for real-vs-fake image detectors
//!
//! Implements the evaluation protocol:
//! - Confusion matrix and derived rates at a fixed threshold
//! - Average precision and ROC-AUC
//! - ROC and precision-recall curves
//! - Optional oracle threshold and the statistics at it

use crate::curves::{self, PrPoint, RocPoint};
use crate::datasets::Label;
use crate::error::{check_both_classes, check_finite, check_shape, MetricsResult};
use crate::threshold::search_best_accuracy_threshold;
use serde::{Deserialize, Serialize};

/// Threshold every report is computed at
pub const REFERENCE_THRESHOLD: f64 = 0.5;

/// Confusion matrix for binary detection (fake = positive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Real images predicted real
    pub tn: usize,
    /// Real images predicted fake
    pub fp: usize,
    /// Fake images predicted real
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// Fake images predicted fake
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Apply `score > threshold` and tally against ground truth
    pub fn at_threshold(labels: &[Label], scores: &[f64], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for (label, score) in labels.iter().zip(scores) {
            match (label, *score > threshold) {
                (Label::Real, false) => matrix.tn += 1,
                (Label::Real, true) => matrix.fp += 1,
                (Label::Fake, false) => matrix.fn_ += 1,
                (Label::Fake, true) => matrix.tp += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy over real images only (TNR)
    pub fn real_accuracy(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    /// Accuracy over fake images only (TPR)
    pub fn fake_accuracy(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Positive predictive value: TP / (TP + FP)
    pub fn ppv(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Negative predictive value: TN / (TN + FN)
    pub fn npv(&self) -> f64 {
        ratio(self.tn, self.tn + self.fn_)
    }

    /// Recall: TP / (TP + FN)
    pub fn tpr(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Specificity: TN / (FP + TN)
    pub fn tnr(&self) -> f64 {
        ratio(self.tn, self.fp + self.tn)
    }
}

/// Zero when the denominator is empty
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Everything derived from the confusion matrix at one threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusionStats {
    pub r_acc: f64,
    pub f_acc: f64,
    pub acc: f64,
    #[serde(flatten)]
    pub matrix: ConfusionMatrix,
    pub ppv: f64,
    pub npv: f64,
    pub tpr: f64,
    pub tnr: f64,
}

impl ConfusionStats {
    pub fn from_matrix(matrix: ConfusionMatrix) -> Self {
        Self {
            r_acc: matrix.real_accuracy(),
            f_acc: matrix.fake_accuracy(),
            acc: matrix.accuracy(),
            ppv: matrix.ppv(),
            npv: matrix.npv(),
            tpr: matrix.tpr(),
            tnr: matrix.tnr(),
            matrix,
        }
    }
}

/// Statistics at `threshold` with the rule `score > threshold` means fake
///
/// Never fails on a single-class outcome; empty-denominator rates are 0.
pub fn confusion_stats_at(labels: &[Label], scores: &[f64], threshold: f64) -> MetricsResult<ConfusionStats> {
    check_shape(labels, scores)?;
    Ok(ConfusionStats::from_matrix(ConfusionMatrix::at_threshold(
        labels, scores, threshold,
    )))
}

/// Full result of evaluating one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Average precision
    pub ap: f64,
    pub roc_auc: f64,
    pub roc_curve: Vec<RocPoint>,
    pub precision_recall_curve: Vec<PrPoint>,
    /// Statistics at [`REFERENCE_THRESHOLD`]
    pub threshold_05: ConfusionStats,
    /// Oracle threshold, when searched
    pub best_threshold: Option<f64>,
    /// Statistics at the oracle threshold, when searched
    pub oracle_threshold: Option<ConfusionStats>,
}

/// Evaluate one dataset's labels and scores
///
/// Fails with [`crate::MetricsError::DegenerateLabelSet`] when only one
/// class is present, since AP and ROC-AUC are undefined.
pub fn evaluate(labels: &[Label], scores: &[f64], search_oracle_threshold: bool) -> MetricsResult<MetricsReport> {
    check_shape(labels, scores)?;
    check_finite(scores)?;
    check_both_classes(labels)?;

    let (best_threshold, oracle_threshold) = if search_oracle_threshold {
        let threshold = search_best_accuracy_threshold(labels, scores)?;
        (Some(threshold), Some(confusion_stats_at(labels, scores, threshold)?))
    } else {
        (None, None)
    };

    Ok(MetricsReport {
        ap: curves::average_precision(labels, scores)?,
        roc_auc: curves::roc_auc(labels, scores)?,
        roc_curve: curves::roc_curve(labels, scores)?,
        precision_recall_curve: curves::precision_recall_curve(labels, scores)?,
        threshold_05: confusion_stats_at(labels, scores, REFERENCE_THRESHOLD)?,
        best_threshold,
        oracle_threshold,
    })
}

impl MetricsReport {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut output = format!(
            "AP:      {:.4}\nROC-AUC: {:.4}\n\n",
            self.ap, self.roc_auc
        );

        output.push_str(&format_stats("Threshold 0.5", &self.threshold_05));

        if let (Some(threshold), Some(stats)) = (self.best_threshold, &self.oracle_threshold) {
            output.push('\n');
            output.push_str(&format_stats(&format!("Oracle threshold {:.3}", threshold), stats));
        }

        output.push_str(&format!(
            "\nCurves: {} ROC points, {} PR points\n",
            self.roc_curve.len(),
            self.precision_recall_curve.len()
        ));

        output
    }
}

fn format_stats(title: &str, stats: &ConfusionStats) -> String {
    let m = &stats.matrix;
    format!(
        r#"{}
  Real acc: {:.4}  Fake acc: {:.4}  Acc: {:.4}
  PPV: {:.4}  NPV: {:.4}  TPR: {:.4}  TNR: {:.4}
                 Predicted
                 Real    Fake
  Actual Real  {:>6}  {:>6}
         Fake  {:>6}  {:>6}
"#,
        title,
        stats.r_acc,
        stats.f_acc,
        stats.acc,
        stats.ppv,
        stats.npv,
        stats.tpr,
        stats.tnr,
        m.tn,
        m.fp,
        m.fn_,
        m.tp,
    )
}
