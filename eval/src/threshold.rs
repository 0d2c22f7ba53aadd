// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Decision threshold search
//!
//! Two searches with deliberately different rules:
//! - [`search_separable_threshold`] assumes real-then-fake ordering, takes a
//!   midpoint when the halves separate, and otherwise scans observed scores
//!   with `score >= candidate`, keeping the last candidate that ties the best.
//! - [`search_best_accuracy_threshold`] scans a fixed grid over [0, 1] with
//!   `score > candidate`, keeping the first candidate that reaches the best.

use crate::datasets::Label;
use crate::error::{check_finite, check_shape, MetricsError, MetricsResult};

/// Number of evenly spaced candidates in the oracle grid, endpoints included
pub const ACCURACY_GRID_SIZE: usize = 100;

/// Find a threshold for a batch laid out as `N/2` real samples then fake ones
///
/// # Preconditions
///
/// `labels[..N/2]` must all be [`Label::Real`] and `labels[N/2..]` all
/// [`Label::Fake`]. This is checked and reported as
/// [`MetricsError::LabelOrdering`]. Non-finite scores are rejected with
/// [`MetricsError::NonFiniteScore`].
///
/// When the largest real score is at most the smallest fake score the
/// midpoint of the two is returned. Otherwise every observed score is tried
/// as a candidate, in array order.
pub fn search_separable_threshold(labels: &[Label], scores: &[f64]) -> MetricsResult<f64> {
    check_shape(labels, scores)?;
    let n = labels.len();
    if n < 2 {
        return Err(MetricsError::TooFewSamples { needed: 2, actual: n });
    }
    check_ordering(labels)?;
    check_finite(scores)?;

    let half = n / 2;
    let real_max = scores[..half].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let fake_min = scores[half..].iter().copied().fold(f64::INFINITY, f64::min);

    if real_max <= fake_min {
        return Ok((real_max + fake_min) / 2.0);
    }

    let mut best_correct = 0usize;
    let mut best_threshold = 0.0;
    for &candidate in scores {
        let correct = agreement(labels, scores, |s| s >= candidate);
        if correct >= best_correct {
            best_correct = correct;
            best_threshold = candidate;
        }
    }

    Ok(best_threshold)
}

/// Oracle threshold: best accuracy over a 100-point grid on [0, 1]
///
/// Does not depend on sample order. Ties keep the lowest threshold.
pub fn search_best_accuracy_threshold(labels: &[Label], scores: &[f64]) -> MetricsResult<f64> {
    check_shape(labels, scores)?;

    let mut best_correct = 0usize;
    let mut best_threshold = 0.0;
    for candidate in accuracy_grid() {
        let correct = agreement(labels, scores, |s| s > candidate);
        if correct > best_correct {
            best_correct = correct;
            best_threshold = candidate;
        }
    }

    Ok(best_threshold)
}

/// `i / 99` for `i in 0..100`, with the last point pinned to exactly 1.0
pub fn accuracy_grid() -> impl Iterator<Item = f64> {
    let step = 1.0 / (ACCURACY_GRID_SIZE - 1) as f64;
    (0..ACCURACY_GRID_SIZE).map(move |i| {
        if i == ACCURACY_GRID_SIZE - 1 {
            1.0
        } else {
            i as f64 * step
        }
    })
}

fn check_ordering(labels: &[Label]) -> MetricsResult<()> {
    let half = labels.len() / 2;
    let violation = labels.iter().enumerate().position(|(i, label)| {
        let expected = if i < half { Label::Real } else { Label::Fake };
        *label != expected
    });
    match violation {
        Some(index) => Err(MetricsError::LabelOrdering { index }),
        None => Ok(()),
    }
}

fn agreement(labels: &[Label], scores: &[f64], predict_fake: impl Fn(f64) -> bool) -> usize {
    labels
        .iter()
        .zip(scores)
        .filter(|(label, score)| predict_fake(**score) == label.is_fake())
        .count()
}
