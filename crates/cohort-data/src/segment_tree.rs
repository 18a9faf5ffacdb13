//! Per-cohort trees of contiguous customer-id ranges.
//!
//! A [`SegmentTreeNode`] owns one inclusive [`Segment`] and an ordered list of
//! child nodes whose ranges all lie after it, separated by at least one
//! missing identifier. Every insertion extends a segment, adds a single-id
//! leaf, or merges two ranges that the new id made contiguous, so a pre-order
//! walk of the tree yields the cohort's ids as sorted, disjoint, maximally
//! merged segments.
//!
//! Structural rules kept by every mutation:
//!
//! * `segment.high + 1 < subtree[0].segment.low`
//! * `subtree[i].subtree_range().high + 1 < subtree[i + 1].segment.low`
//! * the last child of every node is a leaf

use std::mem;

use cohort_core::models::{CustomerId, Segment};

// ── Insertion ─────────────────────────────────────────────────────────────────

/// Outcome of [`SegmentTreeNode::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The id is now covered by the tree.
    Inserted,
    /// The id was already covered; nothing changed.
    AlreadyPresent,
    /// The id lies before the node with a gap. The node is unchanged and the
    /// owning slot must call [`SegmentTreeNode::promote`].
    Promote,
}

/// What one level of the descent decided.
enum Step {
    Done(Insertion),
    Descend(usize),
}

// ── SegmentTreeNode ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTreeNode {
    pub segment: Segment,
    pub subtree: Vec<SegmentTreeNode>,
}

impl SegmentTreeNode {
    /// A leaf covering the single identifier `id`.
    pub fn new(id: CustomerId) -> Self {
        Self::leaf(Segment::single(id))
    }

    fn leaf(segment: Segment) -> Self {
        Self {
            segment,
            subtree: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.subtree.is_empty()
    }

    /// Span of identifiers covered by this node and all of its descendants.
    pub fn subtree_range(&self) -> Segment {
        match self.subtree.last() {
            Some(last) => Segment::new(self.segment.low, last.subtree_range().high),
            None => self.segment,
        }
    }

    /// Insert `id` below this node.
    ///
    /// Returns [`Insertion::Promote`] without touching the tree when `id`
    /// lies before this node's segment with a gap; a node cannot replace
    /// itself inside its owner.
    pub fn insert(&mut self, id: CustomerId) -> Insertion {
        let mut node = self;
        loop {
            match node.step(id) {
                Step::Done(result) => return result,
                Step::Descend(index) => node = &mut node.subtree[index],
            }
        }
    }

    /// Replace this node by a new node for `id` that adopts it.
    ///
    /// The old node becomes the first child, stripped of its children; those
    /// follow it as siblings so the last child stays a leaf.
    pub fn promote(&mut self, id: CustomerId) {
        debug_assert!(self.segment.is_before_with_gap(id));
        let old = mem::replace(self, SegmentTreeNode::new(id));
        self.subtree.reserve(old.subtree.len() + 1);
        self.subtree.push(SegmentTreeNode::leaf(old.segment));
        self.subtree.extend(old.subtree);
    }

    /// Append the segments of this subtree, in pre-order, to `out`.
    pub fn flatten_into(&self, out: &mut Vec<Segment>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.segment);
            stack.extend(node.subtree.iter().rev());
        }
    }

    /// Number of nodes in this subtree, the node itself included.
    pub fn node_count(&self) -> usize {
        1 + self
            .subtree
            .iter()
            .map(SegmentTreeNode::node_count)
            .sum::<usize>()
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        1 + self
            .subtree
            .iter()
            .map(SegmentTreeNode::depth)
            .max()
            .unwrap_or(0)
    }

    /// Verify the structural rules for the whole subtree, describing the
    /// first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            let segment = node.segment;
            if segment.low > segment.high {
                return Err(format!("segment {:?} is reversed", segment));
            }
            if let Some(first) = node.subtree.first() {
                if !segment.has_gap_before(&first.segment) {
                    return Err(format!(
                        "segment {:?} touches its first child {:?}",
                        segment, first.segment
                    ));
                }
            }
            if let Some(last) = node.subtree.last() {
                if !last.is_leaf() {
                    return Err(format!(
                        "last child {:?} of {:?} has children",
                        last.segment, segment
                    ));
                }
            }
            for pair in node.subtree.windows(2) {
                let range = pair[0].subtree_range();
                if !range.has_gap_before(&pair[1].segment) {
                    return Err(format!(
                        "sibling range {:?} touches or overlaps {:?}",
                        range, pair[1].segment
                    ));
                }
            }
            stack.extend(node.subtree.iter());
        }
        Ok(())
    }

    /// Apply the insertion policy at this level only.
    fn step(&mut self, id: CustomerId) -> Step {
        let segment = self.segment;
        if segment.contains(id) {
            return Step::Done(Insertion::AlreadyPresent);
        }
        if segment.is_left_adjacent(id) {
            self.segment.low = id;
            return Step::Done(Insertion::Inserted);
        }
        if segment.is_before_with_gap(id) {
            return Step::Done(Insertion::Promote);
        }
        if segment.is_right_adjacent(id) {
            self.extend_right(id);
            return Step::Done(Insertion::Inserted);
        }

        // id > segment.high + 1 from here on.
        let before_first = self
            .subtree
            .first()
            .map(|first| first.segment.is_before_with_gap(id));
        match before_first {
            None => {
                self.subtree.push(SegmentTreeNode::new(id));
                return Step::Done(Insertion::Inserted);
            }
            Some(true) => {
                self.subtree.insert(0, SegmentTreeNode::new(id));
                return Step::Done(Insertion::Inserted);
            }
            Some(false) => {}
        }

        let after = self
            .subtree
            .partition_point(|child| child.segment.low <= id);

        // An id right below a child extends it leftwards, unless it also
        // closes the gap behind the previous sibling.
        if let Some(child) = self.subtree.get(after) {
            if child.segment.is_left_adjacent(id) {
                let bridges = after > 0
                    && self.subtree[after - 1]
                        .subtree_range()
                        .is_right_adjacent(id);
                if !bridges {
                    return Step::Descend(after);
                }
            }
        }

        // The first child is never after `id` here, so `after >= 1`.
        let index = after - 1;
        let range = self.subtree[index].subtree_range();
        if id <= range.high {
            return Step::Descend(index);
        }
        if range.is_right_adjacent(id) {
            let touches_next = self
                .subtree
                .get(index + 1)
                .is_some_and(|next| next.segment.is_left_adjacent(id));
            if touches_next {
                self.merge_with_next(index, id);
                return Step::Done(Insertion::Inserted);
            }
            return Step::Descend(index);
        }
        if index + 1 == self.subtree.len() {
            self.subtree.push(SegmentTreeNode::new(id));
            return Step::Done(Insertion::Inserted);
        }
        Step::Descend(index)
    }

    /// `id == segment.high + 1`: grow rightwards and absorb the first child
    /// if the two now touch.
    fn extend_right(&mut self, id: CustomerId) {
        self.segment.high = id;
        let touches_first = self
            .subtree
            .first()
            .is_some_and(|first| first.segment.is_left_adjacent(id));
        if touches_first {
            let first = self.subtree.remove(0);
            self.segment.high = first.segment.high;
            let rest = mem::replace(&mut self.subtree, first.subtree);
            self.subtree.extend(rest);
        }
    }

    /// `id` fills the single-id gap between child `index` and the next
    /// sibling: fold the sibling into the child's rightmost segment.
    fn merge_with_next(&mut self, index: usize, id: CustomerId) {
        let next = self.subtree.remove(index + 1);
        let child = &mut self.subtree[index];
        // The rightmost segment of a subtree is its last child, always a leaf.
        match child.subtree.last_mut() {
            Some(last) => {
                debug_assert!(last.is_leaf() && last.segment.is_right_adjacent(id));
                last.segment.high = next.segment.high;
            }
            None => child.segment.high = next.segment.high,
        }
        child.subtree.extend(next.subtree);

        // A merged child that became the last one must be a leaf: hoist its
        // children to this level.
        if index + 1 == self.subtree.len() && !self.subtree[index].is_leaf() {
            let hoisted = mem::take(&mut self.subtree[index].subtree);
            self.subtree.extend(hoisted);
        }
    }
}

// ── CohortTree ────────────────────────────────────────────────────────────────

/// The id tree of one cohort plus its flattened segment list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortTree {
    /// Absent until the first id is added.
    pub root_node: Option<SegmentTreeNode>,
    /// Sorted, disjoint segments; empty until [`flatten`](Self::flatten).
    pub segments: Vec<Segment>,
}

impl CohortTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the cohort. Returns `false` when it was already present.
    pub fn add_id(&mut self, id: CustomerId) -> bool {
        let Some(root) = self.root_node.as_mut() else {
            self.root_node = Some(SegmentTreeNode::new(id));
            return true;
        };
        match root.insert(id) {
            Insertion::Inserted => true,
            Insertion::AlreadyPresent => false,
            Insertion::Promote => {
                root.promote(id);
                true
            }
        }
    }

    /// Rebuild `segments` from the tree. Calling it again yields the same list.
    pub fn flatten(&mut self) {
        self.segments.clear();
        if let Some(root) = &self.root_node {
            root.flatten_into(&mut self.segments);
        }
    }

    /// Span of the whole cohort, `None` before the first id.
    pub fn subtree_range(&self) -> Option<Segment> {
        self.root_node.as_ref().map(SegmentTreeNode::subtree_range)
    }

    /// Whether `id` is covered by the flattened segments.
    pub fn contains(&self, id: CustomerId) -> bool {
        let index = self.segments.partition_point(|segment| segment.high < id);
        self.segments
            .get(index)
            .is_some_and(|segment| segment.contains(id))
    }

    /// Number of distinct ids covered by the flattened segments.
    pub fn customer_count(&self) -> u64 {
        self.segments.iter().map(Segment::len).sum()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
