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

//! Linking the two reads of a pair.
//!
//! Mates are found by probing the same buckets with
//! [mate_hash](AlignmentRecord::mate_hash) instead of
//! [record_hash](AlignmentRecord::record_hash). The link is made once, when
//! the second read of the pair gets its entry, and is never overwritten.
//!
use crate::dict::Dict;
use crate::dict::EntryId;
use crate::record::AlignmentRecord;

impl<R: AlignmentRecord> Dict<'_, R> {
    /// Finds the entry whose key is the mate of `key`.
    pub fn find_mate_for_key(
        &self,
        key: &R,
    ) -> Option<EntryId> {
        self.probe(self.bucket(key.mate_hash()), |other| key.mate_eq(other))
    }

    pub(crate) fn resolve_mate(
        &mut self,
        id: EntryId,
    ) {
        let key = self.entries[id.0].key;
        let Some(mate) = self.find_mate_for_key(key) else {
            return
        };

        if mate == id || self.entries[mate.0].mate.is_some() {
            return
        }

        self.entries[id.0].mate = Some(mate);
        self.entries[mate.0].mate = Some(id);
    }
}
