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

//! Candidate alignment records.
//!
//! The dictionary and the selector only see records through the
//! [AlignmentRecord] trait. [SamRecord] implements it for alignments read
//! with [noodles_sam].
//!
use std::hash::Hash;
use std::hash::Hasher;

use ahash::AHasher;
use bstr::BString;
use noodles_sam::alignment::RecordBuf;
use noodles_sam::alignment::record::cigar::Op;
use noodles_sam::alignment::record::data::field::Tag;

type E = Box<dyn std::error::Error>;

/// Barcode tag used by linked-read aligners.
pub const BARCODE_TAG: Tag = Tag::new(b'B', b'X');

#[derive(Debug, Clone)]
pub struct MissingReadName;

impl std::fmt::Display for MissingReadName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "alignment record has no read name")
    }
}

impl std::error::Error for MissingReadName {}

/// An alignment record as seen by [Dict](crate::dict::Dict) and the selector.
///
/// Two independent hash/equality pairs are required: one identifying the
/// read itself and one identifying its mate. `mate_hash` of a record must
/// equal `record_hash` of its mate, and `mate_eq` must hold exactly for the
/// pairs that should be linked.
pub trait AlignmentRecord {
    fn record_hash(&self) -> u64;
    fn record_eq(&self, other: &Self) -> bool;

    fn mate_hash(&self) -> u64;
    fn mate_eq(&self, other: &Self) -> bool;

    /// Index of the reference sequence, None if unknown.
    fn chrom_id(&self) -> Option<usize>;
    fn pos(&self) -> usize;
    fn is_reverse(&self) -> bool;
    fn edit_dist(&self) -> u32;
    fn cigar(&self) -> &[Op];
}

/// Which read of a template a record belongs to.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum Segment {
    #[default]
    Unpaired,
    First,
    Last,
}

impl Segment {
    pub fn mate(&self) -> Segment {
        match self {
            Segment::Unpaired => Segment::Unpaired,
            Segment::First => Segment::Last,
            Segment::Last => Segment::First,
        }
    }
}

fn hash_identity(
    name: &[u8],
    segment: Segment,
) -> u64 {
    let mut hasher = AHasher::default();
    name.hash(&mut hasher);
    segment.hash(&mut hasher);
    hasher.finish()
}

/// A candidate alignment parsed from a SAM record.
#[derive(Clone, Debug, Default)]
pub struct SamRecord {
    pub name: BString,
    pub segment: Segment,
    pub chrom_id: Option<usize>,
    /// 1-based leftmost position, 0 if unmapped.
    pub pos: usize,
    pub reverse: bool,
    pub edit_dist: u32,
    pub cigar: Vec<Op>,
    pub mapq: Option<u8>,
    pub barcode: Option<BString>,

    /// The record this was parsed from, used when writing output.
    pub raw: RecordBuf,
}

impl SamRecord {
    pub fn new(
        name: &str,
        segment: Segment,
    ) -> Self {
        SamRecord{ name: BString::from(name), segment, ..Default::default() }
    }

    /// Reads the fields used by the dictionary from `record`.
    ///
    /// Terminates with [MissingReadName] if `record` has no name.
    pub fn from_record_buf(
        record: RecordBuf,
    ) -> Result<Self, E> {
        let name: BString = match record.name() {
            Some(name) => name.to_owned(),
            None => return Err(Box::new(MissingReadName{})),
        };

        let flags = record.flags();
        let segment = if !flags.is_segmented() {
            Segment::Unpaired
        } else if flags.is_first_segment() {
            Segment::First
        } else if flags.is_last_segment() {
            Segment::Last
        } else {
            Segment::Unpaired
        };

        let edit_dist = record.data()
            .get(&Tag::EDIT_DISTANCE)
            .and_then(|value| value.as_int())
            .map(|nm| nm.max(0) as u32)
            .unwrap_or(0);

        let barcode = record.data()
            .get(&BARCODE_TAG)
            .and_then(|value| match value {
                noodles_sam::alignment::record_buf::data::field::Value::String(bx) => Some(bx.clone()),
                _ => None,
            });

        Ok(SamRecord{
            name,
            segment,
            chrom_id: record.reference_sequence_id(),
            pos: record.alignment_start().map(|x| x.get()).unwrap_or(0),
            reverse: flags.is_reverse_complemented(),
            edit_dist,
            cigar: record.cigar().as_ref().to_vec(),
            mapq: record.mapping_quality().map(|x| x.get()),
            barcode,
            raw: record,
        })
    }

    /// Probability that the alignment is correct according to its mapping quality.
    pub fn gamma(&self) -> f64 {
        match self.mapq {
            Some(mapq) => 1.0 - 10_f64.powf(-(mapq as f64) / 10.0),
            None => 0.0,
        }
    }
}

impl AlignmentRecord for SamRecord {
    fn record_hash(&self) -> u64 {
        hash_identity(&self.name, self.segment)
    }

    fn record_eq(&self, other: &Self) -> bool {
        self.segment == other.segment && self.name == other.name
    }

    fn mate_hash(&self) -> u64 {
        hash_identity(&self.name, self.segment.mate())
    }

    fn mate_eq(&self, other: &Self) -> bool {
        self.segment != Segment::Unpaired
            && other.segment == self.segment.mate()
            && self.name == other.name
    }

    fn chrom_id(&self) -> Option<usize> {
        self.chrom_id
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn is_reverse(&self) -> bool {
        self.reverse
    }

    fn edit_dist(&self) -> u32 {
        self.edit_dist
    }

    fn cigar(&self) -> &[Op] {
        &self.cigar
    }
}
