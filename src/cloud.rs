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

//! Equivalence groups ("clouds") of reads.
//!
//! A cloud is a cluster of candidate alignments believed to share an origin,
//! eg. reads carrying the same barcode near the same locus. Clouds that turn
//! out to be connected through a shared read are merged.
//!
//! Merged clouds form a single chain: each node has an owner link pointing
//! up towards the root and a next link pointing down towards the tail. The
//! root is the canonical representative of the whole chain. Merging appends
//! the second root below the tail of the first chain, so the chain is never
//! balanced and [root_of](Clouds::root_of) walks the full depth.
//!

/// Index of a cloud in [Clouds].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CloudId(pub usize);

#[derive(Clone, Debug, Default)]
struct Cloud {
    owner: Option<CloudId>,
    next: Option<CloudId>,
}

/// Arena holding all clouds of one processing window.
///
/// Clouds are only ever added and linked, never freed individually. Drop or
/// [clear](Clouds::clear) the arena once no dictionary refers to it.
///
/// ## Usage
///
/// ```rust
/// use samdict::cloud::Clouds;
///
/// let mut clouds = Clouds::new();
/// let a = clouds.add();
/// let b = clouds.add();
/// let c = clouds.add();
///
/// assert!(clouds.merge(a, b));
/// assert_eq!(clouds.root_of(b), a);
///
/// // The root of the first argument becomes canonical
/// assert!(clouds.merge(c, b));
/// assert_eq!(clouds.root_of(a), c);
/// assert_eq!(clouds.root_of(b), c);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Clouds {
    nodes: Vec<Cloud>,
}

impl Clouds {
    pub fn new() -> Self {
        Clouds{ nodes: Vec::new() }
    }

    pub fn with_capacity(
        capacity: usize,
    ) -> Self {
        Clouds{ nodes: Vec::with_capacity(capacity) }
    }

    /// Adds a new singleton cloud and returns its id.
    pub fn add(
        &mut self,
    ) -> CloudId {
        self.nodes.push(Cloud::default());
        CloudId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Owner of `cloud`, None for a root.
    pub fn owner(
        &self,
        cloud: CloudId,
    ) -> Option<CloudId> {
        self.nodes[cloud.0].owner
    }

    /// Follows the owner links of `cloud` until reaching a root.
    pub fn root_of(
        &self,
        cloud: CloudId,
    ) -> CloudId {
        let mut root = cloud;
        while let Some(owner) = self.nodes[root.0].owner {
            root = owner;
        }
        root
    }

    /// Follows the next links of `cloud` until reaching the end of its chain.
    pub fn tail_of(
        &self,
        cloud: CloudId,
    ) -> CloudId {
        let mut tail = cloud;
        while let Some(next) = self.nodes[tail.0].next {
            tail = next;
        }
        tail
    }

    pub fn same_cloud(
        &self,
        a: CloudId,
        b: CloudId,
    ) -> bool {
        self.root_of(a) == self.root_of(b)
    }

    /// Merges the clouds containing `a` and `b`.
    ///
    /// The root of `b` is appended to the tail of the chain containing `a`,
    /// making the root of `a` canonical for both.
    ///
    /// Returns false if they already had the same root.
    pub fn merge(
        &mut self,
        a: CloudId,
        b: CloudId,
    ) -> bool {
        let root_a = self.root_of(a);
        let root_b = self.root_of(b);
        if root_a == root_b {
            return false
        }

        let tail = self.tail_of(a);
        self.nodes[root_b.0].owner = Some(tail);
        self.nodes[tail.0].next = Some(root_b);
        true
    }
}
