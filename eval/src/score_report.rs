// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone metrics report for one labelled score file
//!
//! Reads a CSV with `label,score` columns (label 0 = real, 1 = fake) and
//! prints the full report for quick inspection

use anyhow::{Context, Result};
use clap::Parser;
use detector_eval::datasets::Label;
use detector_eval::metrics::evaluate;
use detector_eval::threshold::search_separable_threshold;
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "score-report")]
#[command(about = "Print detection metrics for a labelled score CSV")]
#[command(version)]
struct Args {
    /// CSV file with label,score columns
    input: PathBuf,

    /// Skip the oracle threshold search
    #[arg(long)]
    no_oracle: bool,

    /// Also run the separable threshold search (rows must be real then fake)
    #[arg(long)]
    separable: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
struct Row {
    label: u8,
    score: f64,
}

fn read_rows(args: &Args) -> Result<(Vec<Label>, Vec<f64>)> {
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut labels = Vec::new();
    let mut scores = Vec::new();
    for (idx, row) in reader.deserialize::<Row>().enumerate() {
        let row = row.with_context(|| format!("Failed to read row {} in {}", idx, args.input.display()))?;
        labels.push(Label::from_binary(row.label).with_context(|| format!("Bad label on row {}", idx))?);
        scores.push(row.score);
    }
    Ok((labels, scores))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (labels, scores) = read_rows(&args)?;
    tracing::info!("Read {} rows from {}", labels.len(), args.input.display());

    let report = evaluate(&labels, &scores, !args.no_oracle)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.format());
    }

    if args.separable {
        match search_separable_threshold(&labels, &scores) {
            Ok(threshold) => println!("Separable threshold: {:.4}", threshold),
            Err(err) => tracing::warn!("Separable threshold search unavailable: {}", err),
        }
    }

    Ok(())
}
