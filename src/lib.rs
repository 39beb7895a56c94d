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

//! samdict is a library and a command-line client for resolving candidate
//! alignments of linked reads:
//!
//!   - Deduplicating candidate alignments per read.
//!   - Merging the read clouds that share a read.
//!   - Picking the best supported alignment of each read, and an alternative
//!     alignment when the best one is ambiguous.
//!
//! ## Usage
//!
//! ### Command line
//!
//! `samdict best` reads a [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf)
//! file (optionally gzipped) containing all candidate alignments of each read
//! and writes the primary alignment of each read. The summed weight of the
//! primary alignment is stored in the `XG:f` tag and the alternative, if any,
//! in the `XA:Z` tag.
//!
//! Reads with a `BX:Z` barcode tag are assigned to clouds by barcode and
//! locus, reads without one form a cloud of their own.
//!
//! ### Rust API
//!
//! The building blocks are:
//!
//!   - [Clouds](cloud::Clouds): arena of read clouds that can be merged.
//!   - [Dict](dict::Dict): candidate alignments keyed by read identity.
//!   - [find_best_record](select::find_best_record): primary and secondary alignment of one read.
//!
//! Records are only borrowed by [Dict](dict::Dict), which must be cleared or
//! recycled before the records of a window are dropped.
//! [dedup_from_read_to_write] shows the full cycle on SAM data.
//!

use std::io::BufRead;
use std::io::Write;

use ahash::AHashMap;
use bstr::BString;
use noodles_sam as sam;
use noodles_sam::alignment::io::Write as AlignmentWrite;

use chrom::Chroms;
use cloud::CloudId;
use cloud::Clouds;
use dict::AddResult;
use dict::Dict;
use record::SamRecord;
use select::AltAlignment;
use select::find_best_record;

pub mod chrom;
pub mod cloud;
pub mod dict;
pub mod printer;
pub mod record;
pub mod select;

type E = Box<dyn std::error::Error>;

/// Default number of buckets in [Dict](dict::Dict).
pub const SAM_DICT_CAP: usize = 1 << 20;
/// Default number of candidates kept per read.
pub const MAX_CANDIDATES: usize = 64;
/// Default summed weight at or below which a secondary alignment is reported.
pub const SECONDARY_ALIGN_THRESH: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct InvalidParams {
    pub reason: String,
}

impl std::fmt::Display for InvalidParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invalid parameters: {}", self.reason)
    }
}

impl std::error::Error for InvalidParams {}

/// Tunable parameters of [Dict](dict::Dict) and the selector.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    capacity: usize,
    max_candidates: usize,
    secondary_threshold: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params{
            capacity: SAM_DICT_CAP,
            max_candidates: MAX_CANDIDATES,
            secondary_threshold: SECONDARY_ALIGN_THRESH,
        }
    }
}

impl Params {
    /// Terminates with [InvalidParams] if `capacity` is not a power of two,
    /// `max_candidates` is zero or `secondary_threshold` is not finite.
    pub fn new(
        capacity: usize,
        max_candidates: usize,
        secondary_threshold: f64,
    ) -> Result<Self, E> {
        if !capacity.is_power_of_two() {
            return Err(Box::new(InvalidParams{ reason: format!("capacity {} is not a power of two", capacity) }))
        }
        if max_candidates == 0 {
            return Err(Box::new(InvalidParams{ reason: "max_candidates must be at least 1".to_string() }))
        }
        if !secondary_threshold.is_finite() {
            return Err(Box::new(InvalidParams{ reason: format!("secondary threshold {} is not finite", secondary_threshold) }))
        }
        Ok(Params{ capacity, max_candidates, secondary_threshold })
    }

    /// Number of buckets, always a power of two.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn secondary_threshold(&self) -> f64 {
        self.secondary_threshold
    }
}

/// Settings for [dedup_from_read_to_write].
#[derive(Clone, Debug, PartialEq)]
pub struct WindowOpts {
    /// Minimum number of records per window. A window only ends between
    /// two different read names.
    pub window_size: usize,
    /// Width of the locus bins used together with the barcode to form clouds.
    pub cloud_span: usize,
    /// Longest CIGAR that can be reported for an alternative alignment.
    pub alt_cigar_capacity: usize,
}

impl Default for WindowOpts {
    fn default() -> Self {
        WindowOpts{ window_size: 100_000, cloud_span: 50_000, alt_cigar_capacity: 256 }
    }
}

/// Counters from [dedup_from_read_to_write].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub records: usize,
    pub skipped: usize,
    pub reads: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub secondaries: usize,
    pub windows: usize,
}

fn process_window<'w, W: Write>(
    dict: Dict<'static, SamRecord>,
    window: &'w [SamRecord],
    opts: &WindowOpts,
    chroms: &Chroms,
    header: &sam::Header,
    writer: &mut sam::io::Writer<W>,
    stats: &mut Stats,
) -> Result<Dict<'static, SamRecord>, E> {
    let mut dict: Dict<'w, SamRecord> = dict.recycle();
    let mut clouds = Clouds::with_capacity(window.len());
    let mut barcodes: AHashMap<(BString, Option<usize>, usize), CloudId> = AHashMap::new();

    for record in window {
        let cloud = match &record.barcode {
            Some(bx) => {
                let key = (bx.clone(), record.chrom_id, record.pos / opts.cloud_span.max(1));
                *barcodes.entry(key).or_insert_with(|| clouds.add())
            },
            None => clouds.add(),
        };
        match dict.add(&mut clouds, record, cloud, record.gamma(), false) {
            AddResult::Duplicate => stats.duplicates += 1,
            AddResult::Dropped => stats.dropped += 1,
            _ => (),
        }
    }

    let threshold = dict.params().secondary_threshold();
    let mut alt = AltAlignment::with_capacity(opts.alt_cigar_capacity);
    for id in dict.ids().into_iter().rev() {
        if dict.entry(id).is_visited() {
            continue
        }
        for id in [Some(id), dict.mate_of(id)].into_iter().flatten() {
            dict.set_visited(id, true);
            if let Some(best) = find_best_record(dict.entry(id), threshold, chroms, &mut alt)? {
                stats.secondaries += best.n_alts;
                let out = printer::annotate_primary(&best, &alt);
                writer.write_alignment_record(header, &out)?;
            }
        }
    }

    log::info!("Window {}: {} records from {} reads in {} clouds", stats.windows, window.len(), dict.len(), clouds.len());
    stats.reads += dict.len();
    stats.windows += 1;

    Ok(dict.recycle())
}

/// Picks the primary alignment of every read in SAM data from [BufRead] and
/// writes them to [Write].
///
/// Records are processed in windows of at least
/// [window_size](WindowOpts::window_size) records. All candidates of a read
/// must be in the same window, so the input should be grouped by read name
/// as output by an aligner. Unmapped records and records without a name are
/// skipped.
///
/// ## Usage
///
/// ```rust
/// use samdict::{dedup_from_read_to_write, Params, WindowOpts};
///
/// let mut input: Vec<u8> = Vec::new();
/// input.append(&mut b"@SQ\tSN:chr.fasta\tLN:5000\n".to_vec());
/// input.append(&mut b"r1\t0\tchr.fasta\t100\t3\t4M\t*\t0\t0\tACGT\t*\tBX:Z:AAAA-1\n".to_vec());
/// input.append(&mut b"r1\t256\tchr.fasta\t3000\t1\t4M\t*\t0\t0\tACGT\t*\tBX:Z:CCCC-1\n".to_vec());
///
/// let mut output: Vec<u8> = Vec::new();
/// let stats = dedup_from_read_to_write(&Params::default(), &WindowOpts::default(), &input[..], &mut output).unwrap();
///
/// assert_eq!(stats.records, 2);
/// assert_eq!(stats.reads, 1);
/// assert_eq!(stats.secondaries, 1);
///
/// let output = String::from_utf8(output).unwrap();
/// assert!(output.contains("XA:Z:chr.fasta,+3000,4M,0;"));
/// ```
///
pub fn dedup_from_read_to_write<R: BufRead, W: Write>(
    params: &Params,
    opts: &WindowOpts,
    conn_in: R,
    conn_out: W,
) -> Result<Stats, E> {
    let mut reader = sam::io::Reader::new(conn_in);
    let header = reader.read_header()?;
    let chroms = Chroms::from_header(&header);

    let mut writer = sam::io::Writer::new(conn_out);
    writer.write_header(&header)?;

    let mut stats = Stats::default();
    let mut dict: Dict<'static, SamRecord> = Dict::new(params.clone());
    let mut window: Vec<SamRecord> = Vec::with_capacity(opts.window_size);

    for result in reader.record_bufs(&header) {
        let record = result?;
        if record.flags().is_unmapped() {
            stats.skipped += 1;
            continue
        }
        let record = match SamRecord::from_record_buf(record) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping record: {}", e);
                stats.skipped += 1;
                continue
            },
        };

        if window.len() >= opts.window_size && window.last().is_some_and(|last| last.name != record.name) {
            dict = process_window(dict, &window, opts, &chroms, &header, &mut writer, &mut stats)?;
            window.clear();
        }
        stats.records += 1;
        window.push(record);
    }

    if !window.is_empty() {
        process_window(dict, &window, opts, &chroms, &header, &mut writer, &mut stats)?;
    }
    writer.get_mut().flush()?;

    log::info!("Resolved {} reads from {} records in {} windows", stats.reads, stats.records, stats.windows);
    log::info!("{} duplicate and {} excess candidates, {} secondary alignments", stats.duplicates, stats.dropped, stats.secondaries);

    Ok(stats)
}
