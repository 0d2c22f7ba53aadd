// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Ranking metrics for binary detectors
//!
//! Implements:
//! - ROC curve with collinear points dropped, and ROC-AUC (trapezoidal)
//! - Precision-recall curve with flat-recall points dropped
//! - Average precision (step-wise, no interpolation)
//!
//! Fake is the positive class. All functions need both classes present.

use crate::datasets::Label;
use crate::error::{check_both_classes, check_finite, check_shape, MetricsResult};
use serde::{Deserialize, Serialize};

/// One ROC operating point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Samples scoring at or above this are predicted fake
    pub threshold: f64,
}

/// One precision-recall operating point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub precision: f64,
    pub recall: f64,
    /// `None` for the terminal (precision 1, recall 0) point
    pub threshold: Option<f64>,
}

/// Cumulative counts at each distinct score, highest score first
#[derive(Debug, Clone, Default)]
struct OperatingPoints {
    fps: Vec<usize>,
    tps: Vec<usize>,
    thresholds: Vec<f64>,
}

impl OperatingPoints {
    fn from_scores(labels: &[Label], scores: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut points = Self::default();
        let mut tp = 0usize;
        let mut fp = 0usize;
        for (rank, &idx) in order.iter().enumerate() {
            if labels[idx].is_fake() {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_tie = order
                .get(rank + 1)
                .map_or(true, |&next| scores[next] != scores[idx]);
            if last_of_tie {
                points.fps.push(fp);
                points.tps.push(tp);
                points.thresholds.push(scores[idx]);
            }
        }
        points
    }

    fn len(&self) -> usize {
        self.thresholds.len()
    }

    fn retain_indices(&mut self, keep: &[usize]) {
        self.fps = keep.iter().map(|&i| self.fps[i]).collect();
        self.tps = keep.iter().map(|&i| self.tps[i]).collect();
        self.thresholds = keep.iter().map(|&i| self.thresholds[i]).collect();
    }

    fn total_positives(&self) -> usize {
        self.tps.last().copied().unwrap_or(0)
    }

    fn total_negatives(&self) -> usize {
        self.fps.last().copied().unwrap_or(0)
    }
}

fn validate(labels: &[Label], scores: &[f64]) -> MetricsResult<()> {
    check_shape(labels, scores)?;
    check_finite(scores)?;
    check_both_classes(labels)
}

fn second_difference_nonzero(values: &[usize], i: usize) -> bool {
    // values[i+1] - 2*values[i] + values[i-1] != 0
    values[i + 1] + values[i - 1] != 2 * values[i]
}

/// ROC curve ordered by decreasing threshold, starting at the origin
///
/// The origin carries a threshold of `max_score + 1` so nothing is predicted
/// fake there.
pub fn roc_curve(labels: &[Label], scores: &[f64]) -> MetricsResult<Vec<RocPoint>> {
    validate(labels, scores)?;
    let mut ops = OperatingPoints::from_scores(labels, scores);

    if ops.len() > 2 {
        let last = ops.len() - 1;
        let keep: Vec<usize> = (0..ops.len())
            .filter(|&i| {
                i == 0
                    || i == last
                    || second_difference_nonzero(&ops.fps, i)
                    || second_difference_nonzero(&ops.tps, i)
            })
            .collect();
        ops.retain_indices(&keep);
    }

    let negatives = ops.total_negatives() as f64;
    let positives = ops.total_positives() as f64;

    let mut curve = Vec::with_capacity(ops.len() + 1);
    curve.push(RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: ops.thresholds[0] + 1.0,
    });
    for i in 0..ops.len() {
        curve.push(RocPoint {
            fpr: ops.fps[i] as f64 / negatives,
            tpr: ops.tps[i] as f64 / positives,
            threshold: ops.thresholds[i],
        });
    }
    Ok(curve)
}

/// Area under the ROC curve
pub fn roc_auc(labels: &[Label], scores: &[f64]) -> MetricsResult<f64> {
    let curve = roc_curve(labels, scores)?;
    Ok(trapezoid(curve.iter().map(|p| (p.fpr, p.tpr))))
}

/// Precision-recall curve ordered by increasing threshold
///
/// Ends with the (precision 1, recall 0) point, which has no threshold.
pub fn precision_recall_curve(labels: &[Label], scores: &[f64]) -> MetricsResult<Vec<PrPoint>> {
    validate(labels, scores)?;
    let mut ops = OperatingPoints::from_scores(labels, scores);

    if ops.len() > 2 {
        let last = ops.len() - 1;
        let keep: Vec<usize> = (0..ops.len())
            .filter(|&i| {
                i == 0 || i == last || ops.tps[i] != ops.tps[i - 1] || ops.tps[i] != ops.tps[i + 1]
            })
            .collect();
        ops.retain_indices(&keep);
    }

    let positives = ops.total_positives() as f64;
    let mut curve: Vec<PrPoint> = (0..ops.len())
        .rev()
        .map(|i| PrPoint {
            precision: precision(ops.tps[i], ops.fps[i]),
            recall: ops.tps[i] as f64 / positives,
            threshold: Some(ops.thresholds[i]),
        })
        .collect();
    curve.push(PrPoint {
        precision: 1.0,
        recall: 0.0,
        threshold: None,
    });
    Ok(curve)
}

/// Average precision: `sum (R_k - R_{k-1}) * P_k` over every operating point
pub fn average_precision(labels: &[Label], scores: &[f64]) -> MetricsResult<f64> {
    validate(labels, scores)?;
    let ops = OperatingPoints::from_scores(labels, scores);
    let positives = ops.total_positives() as f64;

    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for i in 0..ops.len() {
        let recall = ops.tps[i] as f64 / positives;
        ap += (recall - prev_recall) * precision(ops.tps[i], ops.fps[i]);
        prev_recall = recall;
    }
    Ok(ap)
}

fn precision(tp: usize, fp: usize) -> f64 {
    if tp + fp == 0 {
        return 0.0;
    }
    tp as f64 / (tp + fp) as f64
}

fn trapezoid(points: impl Iterator<Item = (f64, f64)>) -> f64 {
    let mut area = 0.0;
    let mut prev: Option<(f64, f64)> = None;
    for (x, y) in points {
        if let Some((px, py)) = prev {
            area += (x - px) * (y + py) / 2.0;
        }
        prev = Some((x, y));
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;
    use proptest::prelude::*;

    fn labels(bits: &[u8]) -> Vec<Label> {
        bits.iter().map(|b| Label::from_binary(*b).unwrap()).collect()
    }

    #[test]
    fn test_roc_perfect() {
        let l = labels(&[0, 0, 1, 1]);
        let s = [0.1, 0.2, 0.8, 0.9];
        let curve = roc_curve(&l, &s).unwrap();

        let fpr: Vec<f64> = curve.iter().map(|p| p.fpr).collect();
        let tpr: Vec<f64> = curve.iter().map(|p| p.tpr).collect();
        assert_eq!(fpr, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(tpr, vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(curve[0].threshold, 1.9);
        assert!((roc_auc(&l, &s).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_drops_collinear_points() {
        let l = labels(&[0, 0, 1, 1]);
        let s = [0.1, 0.4, 0.35, 0.8];
        let curve = roc_curve(&l, &s).unwrap();

        let fpr: Vec<f64> = curve.iter().map(|p| p.fpr).collect();
        let tpr: Vec<f64> = curve.iter().map(|p| p.tpr).collect();
        let thresholds: Vec<f64> = curve.iter().map(|p| p.threshold).collect();
        assert_eq!(fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(thresholds, vec![1.8, 0.8, 0.4, 0.35, 0.1]);
        assert!((roc_auc(&l, &s).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_ties_share_a_point() {
        let l = labels(&[0, 1, 0, 1]);
        let s = [0.5, 0.5, 0.5, 0.5];
        let curve = roc_curve(&l, &s).unwrap();
        assert_eq!(curve.len(), 2);
        assert!((roc_auc(&l, &s).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pr_curve_shape() {
        let l = labels(&[0, 0, 1, 1]);
        let s = [0.1, 0.4, 0.35, 0.8];
        let curve = precision_recall_curve(&l, &s).unwrap();

        let precision: Vec<f64> = curve.iter().map(|p| p.precision).collect();
        let recall: Vec<f64> = curve.iter().map(|p| p.recall).collect();
        let thresholds: Vec<Option<f64>> = curve.iter().map(|p| p.threshold).collect();

        assert_eq!(recall, vec![1.0, 1.0, 0.5, 0.5, 0.0]);
        assert!((precision[0] - 0.5).abs() < 1e-12);
        assert!((precision[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((precision[2] - 0.5).abs() < 1e-12);
        assert_eq!(precision[3], 1.0);
        assert_eq!(precision[4], 1.0);
        assert_eq!(thresholds, vec![Some(0.1), Some(0.35), Some(0.4), Some(0.8), None]);
    }

    #[test]
    fn test_pr_curve_drops_flat_recall_runs() {
        // tps per distinct score: 1, 1, 1, 1, 2 -> the two middle points go
        let l = labels(&[1, 0, 0, 0, 1]);
        let s = [0.9, 0.8, 0.7, 0.6, 0.5];
        let curve = precision_recall_curve(&l, &s).unwrap();
        let thresholds: Vec<Option<f64>> = curve.iter().map(|p| p.threshold).collect();
        assert_eq!(thresholds, vec![Some(0.5), Some(0.6), Some(0.9), None]);
    }

    #[test]
    fn test_average_precision() {
        let l = labels(&[0, 0, 1, 1]);
        let s = [0.1, 0.4, 0.35, 0.8];
        // Ranked: 0.8(+) 0.4(-) 0.35(+) 0.1(-)
        let expected = 0.5 * 1.0 + 0.5 * (2.0 / 3.0);
        assert!((average_precision(&l, &s).unwrap() - expected).abs() < 1e-12);

        let perfect = average_precision(&l, &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scores_outside_unit_interval() {
        let l = labels(&[0, 0, 1, 1]);
        let s = [-0.05, 0.2, 0.9, 1.02];
        assert!((roc_auc(&l, &s).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_and_non_finite() {
        let l = labels(&[1, 1, 1]);
        assert_eq!(
            roc_curve(&l, &[0.1, 0.2, 0.3]),
            Err(MetricsError::DegenerateLabelSet { class: Label::Fake })
        );
        assert_eq!(
            average_precision(&labels(&[0, 1]), &[0.1, f64::NAN]),
            Err(MetricsError::NonFiniteScore { index: 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_curves_are_monotone(
            pairs in prop::collection::vec((any::<bool>(), 0.0f64..1.0f64), 2..120)
        ) {
            let mut l: Vec<Label> = pairs.iter().map(|(f, _)| if *f { Label::Fake } else { Label::Real }).collect();
            let s: Vec<f64> = pairs.iter().map(|(_, s)| *s).collect();
            l[0] = Label::Real;
            l[1] = Label::Fake;

            let roc = roc_curve(&l, &s).unwrap();
            prop_assert!(roc.windows(2).all(|w| w[0].fpr <= w[1].fpr && w[0].tpr <= w[1].tpr));
            prop_assert_eq!(roc.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));

            let pr = precision_recall_curve(&l, &s).unwrap();
            prop_assert!(pr.windows(2).all(|w| w[0].recall >= w[1].recall));

            let auc = roc_auc(&l, &s).unwrap();
            let ap = average_precision(&l, &s).unwrap();
            prop_assert!((0.0..=1.0 + 1e-12).contains(&auc));
            prop_assert!((0.0..=1.0 + 1e-12).contains(&ap));
        }
    }
}
