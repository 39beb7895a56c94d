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

//! Reference sequence names of the alignments.
//!
use bstr::BStr;
use bstr::BString;
use indexmap::map::IndexMap;
use noodles_sam as sam;

/// Resolves reference sequence indexes to names.
pub trait ChromLookup {
    fn chrom_name(&self, id: usize) -> Option<&BStr>;
}

/// Reference sequence names and lengths in header order.
#[derive(Clone, Debug, Default)]
pub struct Chroms {
    refs: IndexMap<BString, usize>,
}

impl Chroms {
    pub fn new() -> Self {
        Chroms{ refs: IndexMap::new() }
    }

    pub fn from_header(
        header: &sam::Header,
    ) -> Self {
        let refs = header.reference_sequences().iter().map(|(name, map)| {
            (name.clone(), map.length().get())
        }).collect::<IndexMap<BString, usize>>();
        Chroms{ refs }
    }

    /// Returns the index of `name`, adding it if it was not present.
    pub fn intern(
        &mut self,
        name: &[u8],
        length: usize,
    ) -> usize {
        self.refs.insert_full(BString::from(name), length).0
    }

    pub fn id_of(
        &self,
        name: &[u8],
    ) -> Option<usize> {
        self.refs.get_index_of(BStr::new(name))
    }

    pub fn length(
        &self,
        id: usize,
    ) -> Option<usize> {
        self.refs.get_index(id).map(|(_, len)| *len)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl ChromLookup for Chroms {
    fn chrom_name(&self, id: usize) -> Option<&BStr> {
        self.refs.get_index(id).map(|(name, _)| BStr::new(name))
    }
}
