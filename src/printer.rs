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

//! Output of the chosen alignments as SAM records.
//!
//! The primary alignment of a read is written as a copy of its input record
//! with the summed weight in `XG:f` and the alternative alignment, if any, in
//! `XA:Z` using the `chrom,(+|-)pos,CIGAR,NM;` layout of bwa.
//!
use bstr::BString;
use noodles_sam::alignment::RecordBuf;
use noodles_sam::alignment::record::Flags;
use noodles_sam::alignment::record::cigar::Op;
use noodles_sam::alignment::record::cigar::op::Kind;
use noodles_sam::alignment::record::data::field::Tag;
use noodles_sam::alignment::record_buf::data::field::Value;

use crate::record::SamRecord;
use crate::select::AltAlignment;
use crate::select::Best;

/// Tag holding the summed weight of the primary alignment.
pub const GAMMA_TAG: Tag = Tag::new(b'X', b'G');
/// Tag holding the alternative alignment.
pub const ALT_TAG: Tag = Tag::new(b'X', b'A');

fn kind_to_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Formats `ops` as a CIGAR string, `*` if empty.
pub fn format_cigar(
    ops: &[Op],
) -> String {
    if ops.is_empty() {
        return "*".to_string()
    }
    ops.iter().map(|op| format!("{}{}", op.len(), kind_to_char(op.kind()))).collect()
}

/// Formats `alt` as an entry of the `XA:Z` tag.
///
/// The entry has the form `chrom,(+|-)pos,CIGAR,NM;`. Returns None if the
/// alternative alignment is not set.
pub fn format_xa_entry(
    alt: &AltAlignment,
) -> Option<String> {
    let chrom = alt.chrom?;
    let strand = if alt.reverse { '-' } else { '+' };
    Some(format!("{},{}{},{},{};", chrom, strand, alt.pos, format_cigar(alt.cigar()), alt.edit_dist))
}

/// Copies the primary alignment and adds the `XG:f` and `XA:Z` tags.
///
/// The secondary and supplementary flags of the input record are cleared.
pub fn annotate_primary(
    best: &Best<SamRecord>,
    alt: &AltAlignment,
) -> RecordBuf {
    let mut record = best.record.raw.clone();
    record.flags_mut().remove(Flags::SECONDARY | Flags::SUPPLEMENTARY);
    record.data_mut().insert(GAMMA_TAG, Value::Float(best.gamma as f32));
    if best.n_alts > 0 {
        if let Some(xa) = format_xa_entry(alt) {
            record.data_mut().insert(ALT_TAG, Value::String(BString::from(xa)));
        }
    }
    record
}

// Tests
#[cfg(test)]
mod tests {
    use noodles_sam::alignment::record::cigar::{op::Kind, Op};
    use noodles_sam::alignment::record::data::field::Tag;

    #[test]
    fn format_cigar_ops() {
        use super::format_cigar;

        let ops = vec![Op::new(Kind::SoftClip, 5), Op::new(Kind::Match, 140), Op::new(Kind::Deletion, 2), Op::new(Kind::Match, 6)];
        assert_eq!(format_cigar(&ops), "5S140M2D6M");
        assert_eq!(format_cigar(&[]), "*");
    }

    #[test]
    fn format_xa_entry_reverse() {
        use super::format_xa_entry;
        use crate::select::AltAlignment;
        use bstr::BStr;

        let mut alt = AltAlignment::with_capacity(4);
        assert!(format_xa_entry(&alt).is_none());

        alt.chrom = Some(BStr::new("OZ038621.1"));
        alt.pos = 4541508;
        alt.edit_dist = 1;
        alt.reverse = true;
        assert_eq!(format_xa_entry(&alt).unwrap(), "OZ038621.1,-4541508,*,1;");
    }

    #[test]
    fn annotate_primary_adds_tags() {
        use super::{annotate_primary, ALT_TAG, GAMMA_TAG};
        use crate::Params;
        use crate::chrom::Chroms;
        use crate::cloud::Clouds;
        use crate::dict::Dict;
        use crate::record::{SamRecord, Segment};
        use crate::select::{find_best_record, AltAlignment};
        use noodles_sam::alignment::record::Flags;
        use noodles_sam::alignment::record_buf::data::field::Value;

        let mut chroms = Chroms::new();
        chroms.intern(b"chr.fasta", 4000);

        let r1 = SamRecord::new("r1", Segment::Unpaired);
        let mut r2 = SamRecord::new("r1", Segment::Unpaired);
        *r2.raw.flags_mut() = Flags::SECONDARY;
        r2.chrom_id = Some(0);
        r2.pos = 1200;
        r2.cigar = vec![Op::new(Kind::Match, 151)];

        let mut clouds = Clouds::new();
        let bx1 = clouds.add();
        let bx2 = clouds.add();

        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx1, 0.25, false);
        dict.add(&mut clouds, &r2, bx2, 0.125, false);

        let mut alt = AltAlignment::with_capacity(4);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();
        let got = annotate_primary(&best, &alt);

        assert_eq!(got.data().get(&GAMMA_TAG), Some(&Value::Float(0.25)));
        assert_eq!(ALT_TAG.as_ref(), b"XA");
        assert_eq!(got.data().get(&ALT_TAG), Some(&Value::String("chr.fasta,+1200,151M,0;".into())));
        assert!(got.data().get(&Tag::OTHER_ALIGNMENTS).is_none());
        assert!(!got.flags().is_secondary());
    }

    #[test]
    fn annotate_primary_clears_secondary_flag() {
        use super::annotate_primary;
        use crate::Params;
        use crate::chrom::Chroms;
        use crate::cloud::Clouds;
        use crate::dict::Dict;
        use crate::record::{SamRecord, Segment};
        use crate::select::{find_best_record, AltAlignment};
        use noodles_sam::alignment::record::Flags;

        let chroms = Chroms::new();
        let mut r1 = SamRecord::new("r1", Segment::First);
        *r1.raw.flags_mut() = Flags::SEGMENTED | Flags::FIRST_SEGMENT | Flags::SECONDARY | Flags::SUPPLEMENTARY;

        let mut clouds = Clouds::new();
        let bx = clouds.add();
        let mut dict = Dict::new(Params::default());
        dict.add(&mut clouds, &r1, bx, 0.9, false);

        let mut alt = AltAlignment::with_capacity(4);
        let best = find_best_record(dict.get(&r1).unwrap(), 0.5, &chroms, &mut alt).unwrap().unwrap();
        let got = annotate_primary(&best, &alt);

        assert_eq!(got.flags(), Flags::SEGMENTED | Flags::FIRST_SEGMENT);
    }
}
