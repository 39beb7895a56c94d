// samdict: Candidate deduplication and cloud merging for linked-read alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Pick the best alignment of each read
    Best {
        // Input .sam or .sam.gz file
        #[arg(group = "input", required = true, help = "Input file")]
        input_file: PathBuf,

        // Output file path, defaults to stdout
        #[arg(short = 'o', long = "output", required = false)]
        out_file: Option<PathBuf>,

        // Number of hash table buckets as a power of two
        #[arg(long = "capacity-bits", default_value_t = 20)]
        capacity_bits: u32,

        // Candidates kept per read
        #[arg(long = "max-candidates", default_value_t = samdict::MAX_CANDIDATES)]
        max_candidates: usize,

        // Report a secondary alignment when the primary weight is at most this
        #[arg(long = "threshold", default_value_t = samdict::SECONDARY_ALIGN_THRESH)]
        threshold: f64,

        // Minimum number of records processed at once
        #[arg(long = "window-size", default_value_t = 100_000)]
        window_size: usize,

        // Width of the locus bins that split a barcode into clouds
        #[arg(long = "cloud-span", default_value_t = 50_000)]
        cloud_span: usize,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
