// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error taxonomy for the metrics engine
//!
//! Every failure here is deterministic: the same inputs always fail the same
//! way, so callers should skip the dataset or abort rather than retry.

use crate::datasets::Label;
use thiserror::Error;

/// Errors raised by threshold search, curve computation and evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("shape mismatch: {labels} labels vs {scores} scores")]
    ShapeMismatch { labels: usize, scores: usize },

    #[error("too few samples: need at least {needed}, got {actual}")]
    TooFewSamples { needed: usize, actual: usize },

    #[error("degenerate label set: every label is {class:?}, AP and ROC-AUC are undefined")]
    DegenerateLabelSet { class: Label },

    #[error("labels are not ordered real-then-fake: first violation at index {index}")]
    LabelOrdering { index: usize },

    #[error("invalid label value {value}, expected 0 (real) or 1 (fake)")]
    InvalidLabel { value: u8 },

    #[error("non-finite score at index {index}")]
    NonFiniteScore { index: usize },
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Check that labels and scores are aligned and non-empty
pub(crate) fn check_shape(labels: &[Label], scores: &[f64]) -> MetricsResult<()> {
    if labels.len() != scores.len() || labels.is_empty() {
        return Err(MetricsError::ShapeMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(scores: &[f64]) -> MetricsResult<()> {
    match scores.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(MetricsError::NonFiniteScore { index }),
        None => Ok(()),
    }
}

/// Both classes must be present for ranking metrics to be defined
pub(crate) fn check_both_classes(labels: &[Label]) -> MetricsResult<()> {
    let first = labels[0];
    if labels.iter().all(|l| *l == first) {
        return Err(MetricsError::DegenerateLabelSet { class: first });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shape() {
        assert!(check_shape(&[Label::Real], &[0.3]).is_ok());
        assert_eq!(
            check_shape(&[Label::Real, Label::Fake], &[0.3]),
            Err(MetricsError::ShapeMismatch { labels: 2, scores: 1 })
        );
        assert_eq!(
            check_shape(&[], &[]),
            Err(MetricsError::ShapeMismatch { labels: 0, scores: 0 })
        );
    }

    #[test]
    fn test_check_finite() {
        assert!(check_finite(&[0.0, 1.2, -0.1]).is_ok());
        assert_eq!(
            check_finite(&[0.0, f64::NAN]),
            Err(MetricsError::NonFiniteScore { index: 1 })
        );
    }

    #[test]
    fn test_degenerate_message() {
        let err = check_both_classes(&[Label::Fake, Label::Fake]).unwrap_err();
        assert_eq!(err, MetricsError::DegenerateLabelSet { class: Label::Fake });
        assert!(err.to_string().contains("Fake"));
    }
}
