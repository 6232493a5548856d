//! # Call Tree Reconstruction
//!
//! Rebuilds per-thread nesting from a flat block list.
//!
//! The recorder emits blocks when they *end*, so a parent appears after its
//! children in the flat list. Each thread's blocks are therefore ordered by
//! `(begin asc, end desc)` first, with identical intervals in reverse
//! emission order so the enclosing block leads; after that, parents precede children and a
//! single stack pass attaches every block to the innermost open ancestor.
//!
//! ```text
//! flat (completion order):  B[2,4]  C[5,6]  A[1,8]
//! ordered:                  A[1,8]  B[2,4]  C[5,6]
//!
//! A ─┬─ B
//!    └─ C
//! ```
//!
//! A block that starts inside an open ancestor but ends after it cannot come
//! from a well-formed recording; it is reported as [`TreeError::Overlap`].

use std::collections::BTreeMap;

use crate::domain::{BlockType, Duration, ThreadId, TreeError};
use crate::loader::BlockRecord;

/// Reconstructed trees, one forest per thread
pub type ThreadTrees = BTreeMap<ThreadId, Vec<BlockNode>>;

/// One block and the blocks nested inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub block: BlockRecord,

    /// Direct children, ordered by begin time
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    #[must_use]
    pub fn leaf(block: BlockRecord) -> Self {
        Self { block, children: Vec::new() }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.block.duration()
    }

    /// Duration not covered by direct children
    #[must_use]
    pub fn self_duration(&self) -> Duration {
        let children = self.children.iter().fold(0u64, |acc, c| acc.saturating_add(c.duration().0));
        Duration(self.duration().0.saturating_sub(children))
    }

    /// Height of this subtree (a leaf has depth 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(BlockNode::depth).max().unwrap_or(0)
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(BlockNode::count).sum::<usize>()
    }

    /// Pre-order walk yielding `(depth, node)`, starting at depth 0
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![(0, self)] }
    }

    /// Whether `block` may nest inside this node
    ///
    /// Events and zero-duration blocks are always childless.
    fn can_contain(&self, block: &BlockRecord) -> bool {
        self.block.block_type == BlockType::Block
            && self.block.begin < self.block.end
            && self.block.contains(block)
    }
}

/// Pre-order iterator over a subtree
pub struct Walk<'a> {
    stack: Vec<(usize, &'a BlockNode)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a BlockNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

/// Rebuild every thread's forest from a flat block list
///
/// Blocks are grouped by thread keeping their relative order.
///
/// # Errors
/// Returns the first nesting violation found
pub fn build_trees(blocks: &[BlockRecord]) -> Result<ThreadTrees, TreeError> {
    group_by_thread(blocks)
        .into_iter()
        .map(|(thread, blocks)| build_thread_tree(thread, blocks).map(|roots| (thread, roots)))
        .collect()
}

/// Split a flat block list per thread, keeping emission order within each
#[must_use]
pub fn group_by_thread(blocks: &[BlockRecord]) -> BTreeMap<ThreadId, Vec<BlockRecord>> {
    let mut by_thread: BTreeMap<ThreadId, Vec<BlockRecord>> = BTreeMap::new();
    for block in blocks {
        by_thread.entry(block.thread_id).or_default().push(*block);
    }
    by_thread
}

/// Rebuild one thread's forest
///
/// `blocks` must be in emission order.
///
/// # Errors
/// `InvertedInterval` for a block ending before it begins, `Overlap` for a
/// block partially overlapping an open ancestor
pub fn build_thread_tree(
    thread: ThreadId,
    blocks: Vec<BlockRecord>,
) -> Result<Vec<BlockNode>, TreeError> {
    if let Some(bad) = blocks.iter().find(|b| b.end < b.begin) {
        return Err(TreeError::InvertedInterval { thread, begin: bad.begin, end: bad.end });
    }

    // Identical intervals: the later emitted block ended last and encloses
    let mut ordered: Vec<(usize, BlockRecord)> = blocks.into_iter().enumerate().collect();
    ordered.sort_unstable_by(|(ia, a), (ib, b)| {
        a.begin.cmp(&b.begin).then(b.end.cmp(&a.end)).then(ib.cmp(ia))
    });

    let mut roots = Vec::new();
    let mut open: Vec<BlockNode> = Vec::new();

    for (_, block) in ordered {
        while let Some(top) = open.last() {
            if top.can_contain(&block) {
                break;
            }
            if top.block.end > block.begin && top.block.end < block.end {
                return Err(TreeError::Overlap {
                    thread,
                    parent_begin: top.block.begin,
                    parent_end: top.block.end,
                    child_begin: block.begin,
                    child_end: block.end,
                });
            }
            if let Some(closed) = open.pop() {
                attach(&mut open, &mut roots, closed);
            }
        }
        open.push(BlockNode::leaf(block));
    }

    while let Some(closed) = open.pop() {
        attach(&mut open, &mut roots, closed);
    }
    Ok(roots)
}

fn attach(open: &mut [BlockNode], roots: &mut Vec<BlockNode>, node: BlockNode) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DescriptorId, Timestamp};

    fn rec(thread: u32, id: u32, begin: u64, end: u64) -> BlockRecord {
        BlockRecord {
            descriptor_id: DescriptorId(id),
            thread_id: ThreadId(thread),
            begin: Timestamp(begin),
            end: Timestamp(end),
            block_type: BlockType::Block,
            name: None,
        }
    }

    fn event(thread: u32, id: u32, at: u64) -> BlockRecord {
        BlockRecord { block_type: BlockType::Event, ..rec(thread, id, at, at) }
    }

    fn assert_nested(node: &BlockNode) {
        for child in &node.children {
            assert!(child.block.begin >= node.block.begin);
            assert!(child.block.end <= node.block.end);
            assert_nested(child);
        }
        for pair in node.children.windows(2) {
            assert!(pair[0].block.begin <= pair[1].block.begin);
        }
    }

    #[test]
    fn test_completion_order_is_rebuilt() {
        // Emitted as the recorder would: children first
        let blocks = vec![rec(1, 1, 2, 4), rec(1, 2, 5, 6), rec(1, 0, 1, 8)];
        let trees = build_trees(&blocks).unwrap();
        let roots = &trees[&ThreadId(1)];

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].block.descriptor_id, DescriptorId(0));
        let children: Vec<_> = roots[0].children.iter().map(|c| c.block.descriptor_id.0).collect();
        assert_eq!(children, vec![1, 2]);
        assert_nested(&roots[0]);
    }

    #[test]
    fn test_identical_intervals_nest_by_completion_order() {
        // inner ends first, so it is emitted first
        let blocks = vec![rec(1, 1, 10, 20), rec(1, 0, 10, 20), rec(1, 2, 12, 15)];
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].block.descriptor_id, DescriptorId(0));
        let inner = &roots[0].children[0];
        assert_eq!(inner.block.descriptor_id, DescriptorId(1));
        assert_eq!(inner.children[0].block.descriptor_id, DescriptorId(2));
        assert_eq!(roots[0].count(), 3);
    }

    #[test]
    fn test_threads_are_independent() {
        let blocks = vec![rec(1, 1, 2, 3), rec(2, 1, 2, 3), rec(2, 0, 1, 9), rec(1, 0, 1, 9)];
        let trees = build_trees(&blocks).unwrap();

        assert_eq!(trees.len(), 2);
        for roots in trees.values() {
            assert_eq!(roots.len(), 1);
            assert_eq!(roots[0].children.len(), 1);
            assert_nested(&roots[0]);
        }
    }

    #[test]
    fn test_sequential_siblings_become_roots() {
        let blocks = vec![rec(1, 0, 0, 5), rec(1, 1, 5, 9), rec(1, 2, 10, 12)];
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();
        assert_eq!(roots.len(), 3);
        assert!(roots.iter().all(|r| r.children.is_empty()));
    }

    #[test]
    fn test_events_attach_to_open_ancestor_and_stay_childless() {
        let blocks = vec![event(1, 3, 4), event(1, 3, 4), rec(1, 0, 0, 10)];
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 2);
        assert!(roots[0].children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn test_zero_duration_block_is_a_leaf() {
        let blocks = vec![rec(1, 1, 3, 3), rec(1, 2, 3, 3), rec(1, 0, 1, 5)];
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();
        assert_eq!(roots[0].children.len(), 2);
    }

    #[test]
    fn test_partial_overlap_is_an_error() {
        let blocks = vec![rec(1, 0, 0, 10), rec(1, 1, 5, 15)];
        let err = build_thread_tree(ThreadId(1), blocks).unwrap_err();
        assert!(matches!(err, TreeError::Overlap { .. }));
    }

    #[test]
    fn test_inverted_interval_is_an_error() {
        let err = build_thread_tree(ThreadId(1), vec![rec(1, 0, 9, 3)]).unwrap_err();
        assert!(matches!(err, TreeError::InvertedInterval { .. }));
    }

    #[test]
    fn test_self_duration_and_walk() {
        let blocks = vec![rec(1, 1, 10, 30), rec(1, 2, 40, 50), rec(1, 3, 41, 42), rec(1, 0, 0, 100)];
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();
        let root = &roots[0];

        assert_eq!(root.duration(), Duration(100));
        assert_eq!(root.self_duration(), Duration(70));
        assert_eq!(root.depth(), 3);
        assert_eq!(root.count(), 4);

        let order: Vec<_> = root.walk().map(|(d, n)| (d, n.block.descriptor_id.0)).collect();
        assert_eq!(order, vec![(0, 0), (1, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_deep_nesting() {
        // 1000 nested blocks emitted innermost first
        let blocks: Vec<_> = (0..1000u64).rev().map(|i| rec(1, 0, i, 2000 - i)).collect();
        let roots = build_thread_tree(ThreadId(1), blocks).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].depth(), 1000);
        assert_nested(&roots[0]);
    }
}
