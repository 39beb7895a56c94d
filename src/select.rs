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

//! Picking the best supported alignment for a read.
//!
//! Splitting a cloud can leave the same record as a candidate several times
//! in a row, so [find_best_record] first collapses adjacent candidates that
//! point to the same record and sums their weights. Only adjacent runs are
//! collapsed: the same record appearing again later forms its own run.
//!
//! The run with the largest total is the primary alignment. If its total is
//! at most the secondary threshold, the largest of the remaining runs is
//! written out as an [AltAlignment].
//!
use bstr::BStr;
use noodles_sam::alignment::record::cigar::Op;

use crate::chrom::ChromLookup;
use crate::dict::Candidate;
use crate::dict::Entry;
use crate::record::AlignmentRecord;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct CigarOverflow {
    pub len: usize,
    pub capacity: usize,
}

impl std::fmt::Display for CigarOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "CIGAR with {} operations does not fit in storage for {}", self.len, self.capacity)
    }
}

impl std::error::Error for CigarOverflow {}

/// A secondary alignment reported alongside the primary one.
///
/// Created once by the caller with a fixed CIGAR capacity and reused for
/// every query; the CIGAR storage is never grown.
#[derive(Clone, Debug)]
pub struct AltAlignment<'c> {
    pub chrom: Option<&'c BStr>,
    pub pos: usize,
    pub edit_dist: u32,
    pub reverse: bool,
    cigar: Vec<Op>,
    cigar_capacity: usize,
}

impl<'c> AltAlignment<'c> {
    pub fn with_capacity(
        cigar_capacity: usize,
    ) -> Self {
        AltAlignment{
            chrom: None, pos: 0, edit_dist: 0, reverse: false,
            cigar: Vec::with_capacity(cigar_capacity), cigar_capacity,
        }
    }

    pub fn cigar(&self) -> &[Op] {
        &self.cigar
    }

    pub fn cigar_capacity(&self) -> usize {
        self.cigar_capacity
    }

    pub fn reset(&mut self) {
        self.chrom = None;
        self.pos = 0;
        self.edit_dist = 0;
        self.reverse = false;
        self.cigar.clear();
    }

    fn fill<R: AlignmentRecord, C: ChromLookup>(
        &mut self,
        record: &R,
        chroms: &'c C,
    ) -> Result<(), E> {
        let cigar = record.cigar();
        if cigar.len() > self.cigar_capacity {
            return Err(Box::new(CigarOverflow{ len: cigar.len(), capacity: self.cigar_capacity }))
        }

        self.chrom = record.chrom_id().and_then(|id| chroms.chrom_name(id));
        self.pos = record.pos();
        self.edit_dist = record.edit_dist();
        self.reverse = record.is_reverse();
        self.cigar.clear();
        self.cigar.extend_from_slice(cigar);
        Ok(())
    }
}

/// The primary alignment of a read.
#[derive(Debug)]
pub struct Best<'a, R> {
    pub record: &'a R,
    /// Summed weight of the run the record was picked from.
    pub gamma: f64,
    /// Number of alternative alignments written, 0 or 1.
    pub n_alts: usize,
}

/// A run of adjacent candidates pointing to the same record.
struct Run {
    start: usize,
    total: f64,
}

struct Runs<'s, 'a, R> {
    cands: &'s [Candidate<'a, R>],
    i: usize,
}

fn runs<'s, 'a, R>(
    cands: &'s [Candidate<'a, R>],
) -> Runs<'s, 'a, R> {
    Runs{ cands, i: 0 }
}

impl<R> Iterator for Runs<'_, '_, R> {
    type Item = Run;

    fn next(
        &mut self,
    ) -> Option<Run> {
        let cands = self.cands;
        if self.i >= cands.len() {
            return None
        }
        let start = self.i;
        let mut total = cands[start].weight;
        self.i += 1;
        while self.i < cands.len() && std::ptr::eq(cands[self.i].record, cands[start].record) {
            total += cands[self.i].weight;
            self.i += 1;
        }
        Some(Run{ start, total })
    }
}

/// Returns the run with the largest total, first one on ties.
fn max_run<I: Iterator<Item = Run>>(
    runs: I,
) -> Option<Run> {
    runs.fold(None, |best: Option<Run>, run| match best {
        Some(best) if run.total <= best.total => Some(best),
        _ => Some(run),
    })
}

/// Finds the primary alignment of `entry`.
///
/// Writes the secondary alignment to `alt` if the primary has a summed
/// weight of at most `threshold` and another run with positive weight
/// exists. Otherwise `alt` is reset.
///
/// Returns None if `entry` has no valid candidates.
///
/// ## Errors
///
/// Terminates with [CigarOverflow] if the secondary's CIGAR is longer than
/// the capacity of `alt`.
///
/// ## Usage
///
/// ```rust
/// use samdict::Params;
/// use samdict::chrom::Chroms;
/// use samdict::cloud::Clouds;
/// use samdict::dict::Dict;
/// use samdict::record::{SamRecord, Segment};
/// use samdict::select::{find_best_record, AltAlignment};
///
/// let mut chroms = Chroms::new();
/// chroms.intern(b"chr.fasta", 4000);
///
/// let mut r1 = SamRecord::new("r1", Segment::Unpaired);
/// r1.chrom_id = Some(0);
/// r1.pos = 100;
/// let mut r2 = SamRecord::new("r1", Segment::Unpaired);
/// r2.chrom_id = Some(0);
/// r2.pos = 2500;
///
/// let mut clouds = Clouds::new();
/// let bx1 = clouds.add();
/// let bx2 = clouds.add();
///
/// let mut dict = Dict::new(Params::default());
/// dict.add(&mut clouds, &r1, bx1, 0.4, false);
/// dict.add(&mut clouds, &r2, bx2, 0.35, false);
///
/// let mut alt = AltAlignment::with_capacity(16);
/// let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();
///
/// assert!(std::ptr::eq(best.record, &r1));
/// assert_eq!(best.gamma, 0.4);
/// assert_eq!(best.n_alts, 1);
/// assert_eq!(alt.pos, 2500);
/// assert_eq!(alt.chrom.unwrap(), "chr.fasta");
/// ```
pub fn find_best_record<'a, 'c, R: AlignmentRecord, C: ChromLookup>(
    entry: &Entry<'a, R>,
    threshold: f64,
    chroms: &'c C,
    alt: &mut AltAlignment<'c>,
) -> Result<Option<Best<'a, R>>, E> {
    alt.reset();

    let cands = entry.candidates();
    let Some(best) = max_run(runs(cands)) else {
        return Ok(None)
    };

    let mut n_alts = 0;
    if best.total <= threshold {
        let second = max_run(runs(cands).filter(|run| run.start != best.start));
        if let Some(second) = second.filter(|run| run.total > 0.0) {
            alt.fill(cands[second.start].record, chroms)?;
            n_alts = 1;
        }
    }

    Ok(Some(Best{ record: cands[best.start].record, gamma: best.total, n_alts }))
}

// Tests
#[cfg(test)]
mod tests {
    use crate::Params;
    use crate::chrom::Chroms;
    use crate::cloud::Clouds;
    use crate::dict::Dict;
    use crate::record::{SamRecord, Segment};
    use noodles_sam::alignment::record::cigar::{op::Kind, Op};

    fn candidate(pos: usize) -> SamRecord {
        let mut record = SamRecord::new("ERR4035126.1", Segment::First);
        record.chrom_id = Some(0);
        record.pos = pos;
        record.edit_dist = 2;
        record.reverse = true;
        record.cigar = vec![Op::new(Kind::SoftClip, 5), Op::new(Kind::Match, 146)];
        record
    }

    fn chroms() -> Chroms {
        let mut chroms = Chroms::new();
        chroms.intern(b"OZ038621.1", 5000000);
        chroms
    }

    #[test]
    fn single_record_sums_weights() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let mut clouds = Clouds::new();
        let bxs: Vec<_> = (0..3).map(|_| clouds.add()).collect();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bxs[0], 0.1, false);
        dict.add(&mut clouds, &r1, bxs[1], 0.15, false);
        dict.add(&mut clouds, &r1, bxs[2], 0.05, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r1));
        assert!((best.gamma - 0.3).abs() < 1e-12);
        assert_eq!(best.n_alts, 0);
        assert!(alt.chrom.is_none());
    }

    #[test]
    fn confident_primary_has_no_secondary() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bxs: Vec<_> = (0..3).map(|_| clouds.add()).collect();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bxs[0], 0.9, false);
        dict.add(&mut clouds, &r1, bxs[1], 0.9, false);
        dict.add(&mut clouds, &r2, bxs[2], 0.05, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r1));
        assert!((best.gamma - 1.8).abs() < 1e-12);
        assert_eq!(best.n_alts, 0);
    }

    #[test]
    fn ambiguous_primary_reports_secondary() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bx1 = clouds.add();
        let bx2 = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx1, 0.4, false);
        dict.add(&mut clouds, &r2, bx2, 0.35, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r1));
        assert_eq!(best.gamma, 0.4);
        assert_eq!(best.n_alts, 1);
        assert_eq!(alt.chrom.unwrap(), "OZ038621.1");
        assert_eq!(alt.pos, 900);
        assert_eq!(alt.edit_dist, 2);
        assert!(alt.reverse);
        assert_eq!(alt.cigar(), &r2.cigar[..]);
    }

    #[test]
    fn ties_keep_first_run() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let r3 = candidate(1500);
        let mut clouds = Clouds::new();
        let bxs: Vec<_> = (0..3).map(|_| clouds.add()).collect();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bxs[0], 0.3, false);
        dict.add(&mut clouds, &r2, bxs[1], 0.3, false);
        dict.add(&mut clouds, &r3, bxs[2], 0.3, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r1));
        assert_eq!(alt.pos, 900);
    }

    #[test]
    fn only_adjacent_duplicates_collapse() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bxs: Vec<_> = (0..3).map(|_| clouds.add()).collect();

        // r1 totals 0.5 overall but is split into two runs of 0.25
        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bxs[0], 0.25, false);
        dict.add(&mut clouds, &r2, bxs[1], 0.3, false);
        dict.add(&mut clouds, &r1, bxs[2], 0.25, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r2));
        assert_eq!(best.gamma, 0.3);
        assert_eq!(best.n_alts, 1);
        assert_eq!(alt.pos, 100);
    }

    #[test]
    fn zero_weight_secondary_is_skipped() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bx1 = clouds.add();
        let bx2 = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx1, 0.2, false);
        dict.add(&mut clouds, &r2, bx2, 0.0, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert_eq!(best.n_alts, 0);
        assert!(alt.chrom.is_none());
        assert_eq!(alt.pos, 0);
    }

    #[test]
    fn removed_candidate_is_ignored() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bx1 = clouds.add();
        let bx2 = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx1, 0.2, false);
        dict.add(&mut clouds, &r2, bx2, 0.7, false);
        dict.remove(&r1);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();

        assert!(std::ptr::eq(best.record, &r1));
        assert_eq!(best.gamma, 0.2);
        assert_eq!(best.n_alts, 0);
    }

    #[test]
    fn empty_entry_has_no_best() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let mut clouds = Clouds::new();
        let bx = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx, 0.2, false);
        dict.remove(&r1);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(8);
        assert!(find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().is_none());
    }

    #[test]
    fn cigar_overflow_fails() {
        use super::{find_best_record, AltAlignment};

        let r1 = candidate(100);
        let r2 = candidate(900);
        let mut clouds = Clouds::new();
        let bx1 = clouds.add();
        let bx2 = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx1, 0.4, false);
        dict.add(&mut clouds, &r2, bx2, 0.35, false);

        let chroms = chroms();
        let mut alt = AltAlignment::with_capacity(1);
        let got = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt);

        assert!(got.is_err());
        assert!(alt.cigar().is_empty());
        assert_eq!(alt.cigar_capacity(), 1);
    }
}
