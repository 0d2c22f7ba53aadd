// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Benchmark dataset manifests and seeded per-class sampling
//!
//! A dataset is a pair of image sources, one real and one synthetic. Each
//! source is either a directory of images or a text file listing image paths.
//! Images are never decoded here; samples carry paths for the detector.

use crate::error::MetricsError;
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"];

/// Binary ground truth for image authenticity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Camera-captured image (negative class, 0)
    Real,
    /// Generated image (positive class, 1)
    Fake,
}

impl Label {
    pub fn to_binary(self) -> u8 {
        match self {
            Label::Real => 0,
            Label::Fake => 1,
        }
    }

    pub fn from_binary(value: u8) -> Result<Self, MetricsError> {
        match value {
            0 => Ok(Label::Real),
            1 => Ok(Label::Fake),
            value => Err(MetricsError::InvalidLabel { value }),
        }
    }

    pub fn is_fake(self) -> bool {
        self == Label::Fake
    }
}

impl TryFrom<u8> for Label {
    type Error = MetricsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Label::from_binary(value)
    }
}

/// One image to score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub path: PathBuf,
    pub label: Label,
}

/// Where a benchmark's images live and how its results are tagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Directory or path-list file of real images
    pub real_path: PathBuf,
    /// Directory or path-list file of generated images
    pub fake_path: PathBuf,
    /// Benchmark collection the dataset belongs to (e.g. "synthbuster")
    pub source: String,
    /// Unique dataset key used in every report line
    pub key: String,
    /// Generator family (e.g. "gan", "diffusion")
    #[serde(default)]
    pub family: String,
}

impl DatasetSpec {
    /// Load a JSON array of dataset specs
    pub fn load_manifest(path: &Path) -> Result<Vec<DatasetSpec>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset manifest: {}", path.display()))?;
        let specs: Vec<DatasetSpec> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse dataset manifest: {}", path.display()))?;
        tracing::debug!("Loaded {} dataset specs from {}", specs.len(), path.display());
        Ok(specs)
    }
}

/// A sampled dataset ready for scoring
///
/// Samples are ordered with every real image before every fake image. The
/// separable threshold search relies on this ordering.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub spec: DatasetSpec,
    pub samples: Vec<Sample>,
}

impl Dataset {
    /// Sample up to `max_sample` images per class, shuffled by `seed`
    pub fn load(spec: &DatasetSpec, max_sample: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let real = Self::sample_side(&spec.real_path, max_sample, &mut rng)?;
        let fake = Self::sample_side(&spec.fake_path, max_sample, &mut rng)?;

        let samples = real
            .into_iter()
            .map(|path| Sample { path, label: Label::Real })
            .chain(fake.into_iter().map(|path| Sample { path, label: Label::Fake }))
            .collect();

        Ok(Self {
            spec: spec.clone(),
            samples,
        })
    }

    fn sample_side(source: &Path, max_sample: usize, rng: &mut ChaCha8Rng) -> Result<Vec<PathBuf>> {
        let mut paths = list_images(source)?;
        paths.sort();
        paths.shuffle(rng);
        paths.truncate(max_sample);
        Ok(paths)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.samples.iter().map(|s| s.label).collect()
    }

    pub fn label_distribution(samples: &[Sample]) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for sample in samples {
            *dist.entry(sample.label).or_insert(0) += 1;
        }
        dist
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// List image files in a directory, or the paths named in a list file
///
/// Relative entries in a list file resolve against the file's directory.
fn list_images(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_dir() {
        let mut paths = Vec::new();
        let entries = fs::read_dir(source)
            .with_context(|| format!("Failed to read image directory: {}", source.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {}", source.display()))?
                .path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        return Ok(paths);
    }

    let file = File::open(source)
        .with_context(|| format!("Failed to open image list: {}", source.display()))?;
    let base = source.parent().unwrap_or_else(|| Path::new(""));
    let mut paths = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} in {}", idx, source.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let path = Path::new(trimmed);
        if path.is_absolute() {
            paths.push(path.to_path_buf());
        } else {
            paths.push(base.join(path));
        }
    }
    Ok(paths)
}
