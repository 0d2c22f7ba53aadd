// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Detector interface consumed by the evaluation pipeline
//!
//! A detector maps a batch of image samples to scores in roughly [0, 1],
//! where higher means more likely generated. Network inference lives outside
//! this crate; the implementations here cover precomputed score tables and a
//! seeded chance-level reference.

use crate::datasets::Sample;
use anyhow::{anyhow, bail, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Trait for all detectors under evaluation
pub trait Detector {
    /// Score a batch; one score per sample, in batch order
    fn predict(&mut self, batch: &[Sample]) -> Result<Vec<f64>>;

    /// Get detector name
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ScoreRecord {
    path: PathBuf,
    score: f64,
}

/// Scores produced offline by an external model run
///
/// Loaded from a CSV with `path,score` columns. Samples are looked up by
/// exact path first, then by file name. A file name shared by several rows
/// (e.g. `real/0001.png` and `fake/0001.png`) only resolves when exactly one
/// of those rows ends with the sample path or is a suffix of it.
#[derive(Debug, Clone)]
pub struct ScoreTableDetector {
    name: String,
    by_path: HashMap<PathBuf, f64>,
    by_file_name: HashMap<String, Vec<PathBuf>>,
}

impl ScoreTableDetector {
    pub fn new(name: impl Into<String>, scores: impl IntoIterator<Item = (PathBuf, f64)>) -> Self {
        let mut by_path = HashMap::new();
        let mut by_file_name = HashMap::new();
        for (path, score) in scores {
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                let paths: &mut Vec<PathBuf> = by_file_name.entry(file_name.to_string()).or_default();
                if !paths.contains(&path) {
                    paths.push(path.clone());
                }
            }
            by_path.insert(path, score);
        }
        Self {
            name: name.into(),
            by_path,
            by_file_name,
        }
    }

    pub fn from_csv(name: impl Into<String>, path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open score table: {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut scores = Vec::new();
        for (idx, record) in reader.deserialize::<ScoreRecord>().enumerate() {
            let record = record.with_context(|| format!("Failed to read record {} in {}", idx, path.display()))?;
            scores.push((record.path, record.score));
        }

        tracing::info!("Loaded {} scores from {}", scores.len(), path.display());
        Ok(Self::new(name, scores))
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    fn lookup(&self, path: &Path) -> Result<f64> {
        if let Some(score) = self.by_path.get(path) {
            return Ok(*score);
        }

        let candidates = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.by_file_name.get(n))
            .ok_or_else(|| anyhow!("No score for {} in table '{}'", path.display(), self.name))?;

        let matched: Vec<&PathBuf> = if candidates.len() == 1 {
            candidates.iter().collect()
        } else {
            candidates
                .iter()
                .filter(|c| c.ends_with(path) || path.ends_with(c))
                .collect()
        };

        match matched.as_slice() {
            [only] => self
                .by_path
                .get(*only)
                .copied()
                .ok_or_else(|| anyhow!("No score for {} in table '{}'", path.display(), self.name)),
            [] => bail!(
                "No score for {} in table '{}': file name matches {} rows at other paths",
                path.display(),
                self.name,
                candidates.len()
            ),
            _ => bail!(
                "Ambiguous score for {} in table '{}': {} rows match",
                path.display(),
                self.name,
                matched.len()
            ),
        }
    }
}

impl Detector for ScoreTableDetector {
    fn predict(&mut self, batch: &[Sample]) -> Result<Vec<f64>> {
        batch.iter().map(|sample| self.lookup(&sample.path)).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Chance-level reference: uniform random scores from a fixed seed
#[derive(Debug, Clone)]
pub struct RandomDetector {
    rng: ChaCha8Rng,
}

impl RandomDetector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Detector for RandomDetector {
    fn predict(&mut self, batch: &[Sample]) -> Result<Vec<f64>> {
        Ok(batch.iter().map(|_| self.rng.gen::<f64>()).collect())
    }

    fn name(&self) -> &str {
        "Random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Label;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn samples(paths: &[&str]) -> Vec<Sample> {
        paths
            .iter()
            .map(|p| Sample {
                path: PathBuf::from(p),
                label: Label::Real,
            })
            .collect()
    }

    #[test]
    fn test_score_table_lookup() {
        let mut detector = ScoreTableDetector::new(
            "table",
            vec![
                (PathBuf::from("/data/real/a.png"), 0.1),
                (PathBuf::from("/data/fake/b.png"), 0.9),
            ],
        );

        let scores = detector
            .predict(&samples(&["/data/real/a.png", "/elsewhere/b.png"]))
            .unwrap();
        assert_eq!(scores, vec![0.1, 0.9]);
    }

    #[test]
    fn test_score_table_missing_sample() {
        let mut detector = ScoreTableDetector::new("table", vec![(PathBuf::from("a.png"), 0.1)]);
        let err = detector.predict(&samples(&["c.png"])).unwrap_err();
        assert!(err.to_string().contains("c.png"));
    }

    #[test]
    fn test_score_table_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "path,score").unwrap();
        writeln!(file, "real/a.png,0.25").unwrap();
        writeln!(file, "fake/b.png,1.01").unwrap();

        let detector = ScoreTableDetector::from_csv("csv", file.path()).unwrap();
        assert_eq!(detector.len(), 2);
        assert_eq!(detector.lookup(Path::new("fake/b.png")).unwrap(), 1.01);
    }

    #[test]
    fn test_shared_file_name_resolves_by_path_suffix() {
        let mut detector = ScoreTableDetector::new(
            "table",
            vec![
                (PathBuf::from("/bench/real/0001.png"), 0.1),
                (PathBuf::from("/bench/fake/0001.png"), 0.9),
            ],
        );

        let batch = vec![
            Sample {
                path: PathBuf::from("bench/real/0001.png"),
                label: Label::Real,
            },
            Sample {
                path: PathBuf::from("fake/0001.png"),
                label: Label::Fake,
            },
        ];
        assert_eq!(detector.predict(&batch).unwrap(), vec![0.1, 0.9]);
    }

    #[test]
    fn test_shared_file_name_without_matching_path_errors() {
        let mut detector = ScoreTableDetector::new(
            "table",
            vec![
                (PathBuf::from("/bench/real/0001.png"), 0.1),
                (PathBuf::from("/bench/fake/0001.png"), 0.9),
            ],
        );

        let err = detector.predict(&samples(&["/elsewhere/0001.png"])).unwrap_err();
        assert!(err.to_string().contains("0001.png"));
        assert!(detector.predict(&samples(&["0001.png"])).is_err());
    }

    #[test]
    fn test_score_table_bad_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "path,score").unwrap();
        writeln!(file, "a.png,not-a-number").unwrap();

        assert!(ScoreTableDetector::from_csv("csv", file.path()).is_err());
    }

    #[test]
    fn test_random_detector_seeded() {
        let batch = samples(&["a", "b", "c"]);
        let a = RandomDetector::new(42).predict(&batch).unwrap();
        let b = RandomDetector::new(42).predict(&batch).unwrap();

        assert_eq!(a, b);
        assert!(a.iter().all(|s| (0.0..1.0).contains(s)));
    }
}
