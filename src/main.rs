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
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use clap::CommandFactory;
use clap::Parser;
use flate2::read::MultiGzDecoder;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

/// Opens `path` for reading, decompressing if it ends in `.gz`.
fn open_input(path: &Path) -> Result<Box<dyn BufRead>, E> {
    let f = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

fn main() -> Result<(), E> {
    let cli = cli::Cli::parse();

    // Subcommands:
    match &cli.command {
        // Best
        Some(cli::Commands::Best {
            input_file,
            out_file,
            capacity_bits,
            max_candidates,
            threshold,
            window_size,
            cloud_span,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });

            let capacity = 1_usize.checked_shl(*capacity_bits).unwrap_or(0);
            let params = samdict::Params::new(capacity, *max_candidates, *threshold)?;
            let opts = samdict::WindowOpts{ window_size: *window_size, cloud_span: *cloud_span, ..Default::default() };

            let conn_in = open_input(input_file)?;
            let conn_out: Box<dyn Write> = if let Some(file) = out_file {
                Box::new(BufWriter::new(File::create(file)?))
            } else {
                Box::new(BufWriter::new(std::io::stdout().lock()))
            };

            samdict::dedup_from_read_to_write(&params, &opts, conn_in, conn_out)?;
        },
        None => {
            cli::Cli::command().print_help()?;
        },
    }

    Ok(())
}
