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

//! Candidate alignments keyed by read identity.
//!
//! [Dict] is an open-chained hash table with a fixed, power-of-two number of
//! buckets. Each [Entry] collects up to
//! [max_candidates](crate::Params::max_candidates) candidate alignments for
//! one read, together with the [cloud](crate::cloud) each candidate came from.
//!
//! Entries live in an arena and are chained by index: a collision chain per
//! bucket and one traversal chain through all entries, newest first. The
//! traversal chain is what [iter](Dict::iter) follows.
//!
//! The dictionary only borrows the records. A dictionary is meant to live
//! for one processing window; use [clear](Dict::clear) or
//! [recycle](Dict::recycle) between windows.
//!

pub mod mate;

use crate::Params;
use crate::cloud::CloudId;
use crate::cloud::Clouds;
use crate::record::AlignmentRecord;

/// Index of an entry in a [Dict].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct EntryId(pub usize);

/// One possible alignment for a read.
#[derive(Debug)]
pub struct Candidate<'a, R> {
    pub record: &'a R,
    pub cloud: CloudId,
    pub weight: f64,
}

impl<R> Clone for Candidate<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Candidate<'_, R> {}

/// Outcome of [Dict::add].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddResult {
    /// First candidate for a new read.
    Inserted(EntryId),
    /// Candidate appended to an existing read.
    Appended(EntryId),
    /// Same cloud as the last candidate, nothing was changed.
    Duplicate,
    /// The read already has the maximum number of candidates.
    Dropped,
}

/// All candidates recorded for one read.
#[derive(Debug)]
pub struct Entry<'a, R> {
    key: &'a R,
    mate: Option<EntryId>,

    cands: Vec<Candidate<'a, R>>,
    num_cands: usize,

    clash_next: Option<EntryId>,
    link_next: Option<EntryId>,

    visited: bool,
}

impl<'a, R> Entry<'a, R> {
    fn new(
        key: &'a R,
        cloud: CloudId,
        weight: f64,
    ) -> Self {
        Entry{
            key, mate: None,
            cands: vec![Candidate{ record: key, cloud, weight }], num_cands: 1,
            clash_next: None, link_next: None,
            visited: false,
        }
    }

    /// The record that first created this entry.
    pub fn key(&self) -> &'a R {
        self.key
    }

    pub fn mate(&self) -> Option<EntryId> {
        self.mate
    }

    /// Valid candidates in insertion order.
    pub fn candidates(&self) -> &[Candidate<'a, R>] {
        &self.cands[..self.num_cands]
    }

    pub fn num_cands(&self) -> usize {
        self.num_cands
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    /// Cloud of the most recently added valid candidate.
    pub fn last_cloud(&self) -> Option<CloudId> {
        self.candidates().last().map(|cand| cand.cloud)
    }

    fn push(
        &mut self,
        cand: Candidate<'a, R>,
    ) {
        // Slots past `num_cands` hold removed candidates and are overwritten.
        if self.num_cands < self.cands.len() {
            self.cands[self.num_cands] = cand;
        } else {
            self.cands.push(cand);
        }
        self.num_cands += 1;
    }
}

/// Hash table from read identity to candidate alignments.
///
/// ## Usage
///
/// ```rust
/// use samdict::Params;
/// use samdict::cloud::Clouds;
/// use samdict::dict::{AddResult, Dict};
/// use samdict::record::{SamRecord, Segment};
///
/// let reads = vec![
///     SamRecord::new("ERR4035126.1", Segment::First),
///     SamRecord::new("ERR4035126.1", Segment::First),
///     SamRecord::new("ERR4035126.1", Segment::Last),
/// ];
///
/// let mut clouds = Clouds::new();
/// let bx1 = clouds.add();
/// let bx2 = clouds.add();
///
/// let mut dict = Dict::new(Params::default());
/// assert!(matches!(dict.add(&mut clouds, &reads[0], bx1, 0.6, false), AddResult::Inserted(_)));
/// assert!(matches!(dict.add(&mut clouds, &reads[1], bx2, 0.4, false), AddResult::Appended(_)));
/// assert!(matches!(dict.add(&mut clouds, &reads[2], bx2, 0.9, false), AddResult::Inserted(_)));
///
/// // Both reads of the pair were linked, and the two barcodes merged
/// let first = dict.find(&reads[0]).unwrap();
/// let last = dict.find(&reads[2]).unwrap();
/// assert_eq!(dict.mate_of(first), Some(last));
/// assert_eq!(dict.entry(first).num_cands(), 2);
/// assert!(clouds.same_cloud(bx1, bx2));
/// ```
#[derive(Debug)]
pub struct Dict<'a, R: AlignmentRecord> {
    params: Params,
    buckets: Vec<Option<EntryId>>,
    entries: Vec<Entry<'a, R>>,
    head: Option<EntryId>,
}

impl<'a, R: AlignmentRecord> Dict<'a, R> {
    pub fn new(
        params: Params,
    ) -> Self {
        let buckets = vec![None; params.capacity()];
        Dict{ params, buckets, entries: Vec::new(), head: None }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Number of distinct reads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn bucket(
        &self,
        hash: u64,
    ) -> usize {
        (hash & (self.params.capacity() as u64 - 1)) as usize
    }

    /// Walks the collision chain of bucket `idx` looking for an entry whose
    /// key satisfies `pred`.
    pub(crate) fn probe<F: Fn(&R) -> bool>(
        &self,
        idx: usize,
        pred: F,
    ) -> Option<EntryId> {
        let mut next = self.buckets[idx];
        while let Some(id) = next {
            let entry = &self.entries[id.0];
            if pred(entry.key) {
                return Some(id)
            }
            next = entry.clash_next;
        }
        None
    }

    /// Finds the entry whose key is equal to `key`.
    pub fn find(
        &self,
        key: &R,
    ) -> Option<EntryId> {
        self.probe(self.bucket(key.record_hash()), |other| key.record_eq(other))
    }

    pub fn get(
        &self,
        key: &R,
    ) -> Option<&Entry<'a, R>> {
        self.find(key).map(|id| &self.entries[id.0])
    }

    /// Panics if `id` is not from this dictionary.
    pub fn entry(
        &self,
        id: EntryId,
    ) -> &Entry<'a, R> {
        &self.entries[id.0]
    }

    pub fn mate_of(
        &self,
        id: EntryId,
    ) -> Option<EntryId> {
        self.entries[id.0].mate
    }

    pub fn set_visited(
        &mut self,
        id: EntryId,
        visited: bool,
    ) {
        self.entries[id.0].visited = visited;
    }

    /// Adds a candidate alignment `key` from `cloud` with weight `weight`.
    ///
    /// If `key` is new, creates an entry for it and links it to its mate if
    /// the mate is already present.
    ///
    /// If `key` already has an entry, the candidate is appended and the cloud
    /// of the previous candidate is merged with `cloud`. Adding from the same
    /// cloud as the previous candidate is a no-op unless `force` is set.
    /// Candidates beyond [max_candidates](Params::max_candidates) are dropped.
    pub fn add(
        &mut self,
        clouds: &mut Clouds,
        key: &'a R,
        cloud: CloudId,
        weight: f64,
        force: bool,
    ) -> AddResult {
        let Some(id) = self.find(key) else {
            return AddResult::Inserted(self.insert(key, cloud, weight))
        };

        let max_candidates = self.params.max_candidates();
        let entry = &mut self.entries[id.0];
        if entry.num_cands >= max_candidates {
            return AddResult::Dropped
        }

        if let Some(last) = entry.last_cloud() {
            if last == cloud && !force {
                return AddResult::Duplicate
            }
            clouds.merge(last, cloud);
        }

        entry.push(Candidate{ record: key, cloud, weight });
        AddResult::Appended(id)
    }

    fn insert(
        &mut self,
        key: &'a R,
        cloud: CloudId,
        weight: f64,
    ) -> EntryId {
        let idx = self.bucket(key.record_hash());
        let id = EntryId(self.entries.len());

        let mut entry = Entry::new(key, cloud, weight);
        entry.link_next = self.head;
        entry.clash_next = self.buckets[idx];
        self.entries.push(entry);

        self.head = Some(id);
        self.buckets[idx] = Some(id);

        self.resolve_mate(id);
        id
    }

    /// Invalidates the most recently added candidate of `key`.
    ///
    /// The candidate is not erased, only excluded from
    /// [candidates](Entry::candidates). Does nothing if `key` is not present.
    pub fn remove(
        &mut self,
        key: &R,
    ) {
        if let Some(id) = self.find(key) {
            let entry = &mut self.entries[id.0];
            entry.num_cands = entry.num_cands.saturating_sub(1);
        }
    }

    /// Forgets all entries.
    pub fn clear(&mut self) {
        self.head = None;
        self.buckets.fill(None);
        self.entries.clear();
    }

    /// Empties the dictionary so that it can hold records from another window.
    pub fn recycle<'b>(
        mut self,
    ) -> Dict<'b, R> {
        self.buckets.fill(None);
        Dict{
            params: self.params,
            buckets: self.buckets,
            entries: Vec::with_capacity(self.entries.capacity()),
            head: None,
        }
    }

    /// Iterates over the entries, most recently inserted first.
    pub fn iter(&self) -> Iter<'_, 'a, R> {
        Iter{ dict: self, next: self.head }
    }

    /// Ids of all entries, most recently inserted first.
    pub fn ids(&self) -> Vec<EntryId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

pub struct Iter<'d, 'a, R: AlignmentRecord> {
    dict: &'d Dict<'a, R>,
    next: Option<EntryId>,
}

impl<'d, 'a, R: AlignmentRecord> Iterator for Iter<'d, 'a, R> {
    type Item = (EntryId, &'d Entry<'a, R>);

    fn next(
        &mut self,
    ) -> Option<Self::Item> {
        let id = self.next?;
        let entry = &self.dict.entries[id.0];
        self.next = entry.link_next;
        Some((id, entry))
    }
}
