//! Unbalanced binary search tree with on-demand order statistics.
//!
//! Equal keys go right, so repeated inserts of one key form a chain of right
//! links below the first record inserted with it. The shape only changes
//! through insert and delete until `balance` or `merge` rebuilds it.

use std::{collections::VecDeque, fmt::Debug};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    dot,
    error::Result,
    order::Order,
    package::{self, KeyTree, Package},
    record::{RecordId, Records},
};

#[derive(Debug, Clone, Default)]
pub struct OrderStatisticsTree {
    root: Option<RecordId>,
}

/// In-order walk over a tree's records, driven by an explicit stack.
pub struct InOrder<'r, V> {
    records: &'r Records<V>,
    stack: Vec<RecordId>,
    next: Option<RecordId>,
}

impl<V> Iterator for InOrder<'_, V> {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        while let Some(node) = self.next {
            self.stack.push(node);
            self.next = self.records[node].left();
        }
        let node = self.stack.pop()?;
        self.next = self.records[node].right();
        Some(node)
    }
}

/// Level-by-level walk; returns `(levels, nodes)` below `root`.
fn measure<V>(records: &Records<V>, root: Option<RecordId>) -> (usize, usize) {
    let mut queue: VecDeque<_> = root.into_iter().collect();
    let (mut levels, mut nodes) = (0, 0);
    while !queue.is_empty() {
        levels += 1;
        nodes += queue.len();
        for _ in 0..queue.len() {
            let Some(node) = queue.pop_front() else {
                break
            };
            queue.extend(records[node].left());
            queue.extend(records[node].right());
        }
    }
    (levels, nodes)
}

fn subtree_size<V>(records: &Records<V>, root: Option<RecordId>) -> usize {
    measure(records, root).1
}

/// Links `nodes`, already in key order, into a minimum-height tree.
///
/// Recursion halves the slice each time, so depth stays logarithmic.
fn build_balanced<V>(records: &mut Records<V>, nodes: &[RecordId]) -> Option<RecordId> {
    match *nodes {
        [] => None,
        [only] => {
            let record = &mut records[only];
            record.parent = None;
            record.left = None;
            record.right = None;
            Some(only)
        }
        [first, second] => {
            let record = &mut records[first];
            record.parent = Some(second);
            record.left = None;
            record.right = None;
            let record = &mut records[second];
            record.parent = None;
            record.left = Some(first);
            record.right = None;
            Some(second)
        }
        _ => {
            let mid = nodes.len() / 2;
            let center = nodes[mid];
            let left = build_balanced(records, &nodes[..mid]);
            let right = build_balanced(records, &nodes[mid + 1..]);
            let record = &mut records[center];
            record.parent = None;
            record.left = left;
            record.right = right;
            for child in [left, right].into_iter().flatten() {
                records[child].parent = Some(center);
            }
            Some(center)
        }
    }
}

impl OrderStatisticsTree {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root<V>(records: &mut Records<V>, root: RecordId) -> Result<Self> {
        let mut tree = Self::new();
        tree.insert(records, root)?;
        Ok(tree)
    }

    pub fn root(&self) -> Option<RecordId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn insert<V>(&mut self, records: &mut Records<V>, id: RecordId) -> Result<()> {
        records.attach(id)?;

        let order = records.order_of(id);
        let Some(mut node) = self.root else {
            self.root = Some(id);
            return Ok(());
        };
        loop {
            let record = &mut records[node];
            let slot = if record.order() > order {
                &mut record.left
            } else {
                &mut record.right
            };
            match *slot {
                Some(child) => node = child,
                None => {
                    *slot = Some(id);
                    break;
                }
            }
        }
        records[id].parent = Some(node);
        Ok(())
    }

    /// Removes the first record with `order` met on the way down.
    pub fn delete<V>(&mut self, records: &mut Records<V>, order: impl Into<Order>) -> Option<RecordId> {
        let order = order.into();
        let mut target = self.root?;
        loop {
            let record = &records[target];
            let next = match record.order().cmp(&order) {
                std::cmp::Ordering::Equal => break,
                std::cmp::Ordering::Greater => record.left(),
                std::cmp::Ordering::Less => record.right(),
            };
            target = next?;
        }

        let record = &records[target];
        let (parent, left, right) = (record.parent(), record.left(), record.right());
        match (left, right) {
            (None, None) => {
                trace!(%order, "deleting leaf");
                self.replace_child(records, parent, target, None);
            }
            (Some(child), None) | (None, Some(child)) => {
                trace!(%order, "deleting node with one child");
                self.replace_child(records, parent, target, Some(child));
                records[child].parent = parent;
            }
            (Some(left), Some(right)) if records[left].right().is_none() => {
                trace!(%order, "deleting node, lifting left child");
                self.replace_child(records, parent, target, Some(left));
                records[left].parent = parent;
                records[left].right = Some(right);
                records[right].parent = Some(left);
            }
            (Some(left), Some(right)) => {
                let mut predecessor = left;
                while let Some(next) = records[predecessor].right() {
                    predecessor = next;
                }
                trace!(%order, "deleting node, relocating predecessor");

                let below = records[predecessor].parent().unwrap();
                let orphan = records[predecessor].left();
                records[below].right = orphan;
                if let Some(orphan) = orphan {
                    records[orphan].parent = Some(below);
                }

                self.replace_child(records, parent, target, Some(predecessor));
                let record = &mut records[predecessor];
                record.parent = parent;
                record.left = Some(left);
                record.right = Some(right);
                records[left].parent = Some(predecessor);
                records[right].parent = Some(predecessor);
            }
        }
        records[target].detach();
        Some(target)
    }

    pub fn delete_min<V>(&mut self, records: &mut Records<V>) -> Option<RecordId> {
        let node = self.min_node(records)?;
        let (parent, right) = (records[node].parent(), records[node].right());
        match parent {
            Some(parent) => records[parent].left = right,
            None => self.root = right,
        }
        if let Some(right) = right {
            records[right].parent = parent;
        }
        records[node].detach();
        Some(node)
    }

    pub fn delete_max<V>(&mut self, records: &mut Records<V>) -> Option<RecordId> {
        let node = self.max_node(records)?;
        let (parent, left) = (records[node].parent(), records[node].left());
        match parent {
            Some(parent) => records[parent].right = left,
            None => self.root = left,
        }
        if let Some(left) = left {
            records[left].parent = parent;
        }
        records[node].detach();
        Some(node)
    }

    /// `None` when empty; a lone root has height 0.
    pub fn height<V>(&self, records: &Records<V>) -> Option<usize> {
        measure(records, self.root).0.checked_sub(1)
    }

    pub fn node_count<V>(&self, records: &Records<V>) -> usize {
        subtree_size(records, self.root)
    }

    pub fn iter<'r, V>(&self, records: &'r Records<V>) -> InOrder<'r, V> {
        InOrder {
            records,
            stack: vec![],
            next: self.root,
        }
    }

    pub fn ordered_list<V>(&self, records: &Records<V>) -> Vec<RecordId> {
        self.iter(records).collect()
    }

    pub fn ordered_keys<V>(&self, records: &Records<V>) -> Vec<Order> {
        self.iter(records).map(|id| records.order_of(id)).collect()
    }

    /// Finds a record with `order`.
    ///
    /// From the first match on the way down, this keeps stepping to the left
    /// child for as long as that child has the same key. It does not search
    /// the rest of the left subtree, so after a rebuild it can stop short of
    /// the first record with `order` in key order.
    pub fn get_by_order<V>(&self, records: &Records<V>, order: impl Into<Order>) -> Option<RecordId> {
        let order = order.into();
        let mut node = self.root?;
        loop {
            let record = &records[node];
            let next = match record.order().cmp(&order) {
                std::cmp::Ordering::Equal => break,
                std::cmp::Ordering::Greater => record.left(),
                std::cmp::Ordering::Less => record.right(),
            };
            node = next?;
        }

        while let Some(left) = records[node].left() {
            if records.order_of(left) != order {
                break;
            }
            node = left;
        }
        Some(node)
    }

    /// Zero-based position of the record `get_by_order` finds.
    ///
    /// Subtree sizes are counted afresh on every call, so this is linear in
    /// the size of the tree.
    pub fn get_rank_by_order<V>(&self, records: &Records<V>, order: impl Into<Order>) -> Option<usize> {
        let node = self.get_by_order(records, order)?;
        let mut rank = subtree_size(records, records[node].left());
        let mut current = node;
        while let Some(parent) = records[current].parent() {
            if records[parent].right() == Some(current) {
                rank += subtree_size(records, records[parent].left()) + 1;
            }
            current = parent;
        }
        Some(rank)
    }

    pub fn get_by_rank<V>(&self, records: &Records<V>, rank: usize) -> Option<RecordId> {
        self.iter(records).nth(rank)
    }

    pub fn min_node<V>(&self, records: &Records<V>) -> Option<RecordId> {
        let mut node = self.root?;
        while let Some(left) = records[node].left() {
            node = left;
        }
        Some(node)
    }

    pub fn max_node<V>(&self, records: &Records<V>) -> Option<RecordId> {
        let mut node = self.root?;
        while let Some(right) = records[node].right() {
            node = right;
        }
        Some(node)
    }

    /// Rebuilds the tree at minimum height. Trees of two or fewer records are
    /// left as they are.
    pub fn balance<V>(&mut self, records: &mut Records<V>) {
        let nodes = self.ordered_list(records);
        if nodes.len() > 2 {
            debug!(len = nodes.len(), "balancing tree");
            self.root = build_balanced(records, &nodes);
        }
    }

    /// Moves every record of `other` into this tree and rebuilds it balanced.
    ///
    /// On equal keys, records from `other` come first in the merged order.
    pub fn merge<V>(&mut self, records: &mut Records<V>, other: &mut OrderStatisticsTree) {
        let ours = self.ordered_list(records);
        let theirs = other.ordered_list(records);
        debug!(ours = ours.len(), theirs = theirs.len(), "merging trees");

        let merged = theirs
            .into_iter()
            .merge_by(ours, |&a: &RecordId, &b: &RecordId| {
                records.order_of(a) <= records.order_of(b)
            })
            .collect_vec();
        self.root = build_balanced(records, &merged);
        other.root = None;
    }

    pub fn clear<V>(&mut self, records: &mut Records<V>) {
        let mut queue: VecDeque<_> = self.root.take().into_iter().collect();
        let mut cleared = 0usize;
        while let Some(node) = queue.pop_front() {
            let record = &mut records[node];
            queue.extend(record.left());
            queue.extend(record.right());
            record.detach();
            cleared += 1;
        }
        debug!(cleared, "cleared tree");
    }

    pub fn package<'r, V>(&self, records: &'r Records<V>) -> Option<Package<'r, V>> {
        package::package(records, self.root)
    }

    pub fn package_keys<V>(&self, records: &Records<V>) -> KeyTree {
        package::package_keys(records, self.root)
    }

    pub fn output_dot<V: Debug>(&self, records: &Records<V>) -> String {
        dot::output_dot(records, self.root)
    }

    fn replace_child<V>(
        &mut self,
        records: &mut Records<V>,
        parent: Option<RecordId>,
        old: RecordId,
        new: Option<RecordId>,
    ) {
        let Some(parent) = parent else {
            self.root = new;
            return
        };
        let record = &mut records[parent];
        if record.left() == Some(old) {
            record.left = new;
        } else {
            record.right = new;
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_structure<V>(&self, records: &Records<V>) {
        if let Some(root) = self.root {
            assert_eq!(records[root].parent(), None);
        }
        let mut queue: VecDeque<_> = self.root.into_iter().collect();
        while let Some(node) = queue.pop_front() {
            let record = &records[node];
            assert!(record.is_attached());
            assert_eq!(record.index(), None);
            for child in [record.left(), record.right()].into_iter().flatten() {
                assert_eq!(records[child].parent(), Some(node));
                queue.push_back(child);
            }
        }
        let keys = self.ordered_keys(records);
        assert!(keys.iter().tuple_windows().all(|(a, b)| a <= b));
    }

    /// Every key sits between the bounds its ancestors impose. With
    /// `strict_left`, left subtrees may not repeat the key above them, which
    /// holds for trees built by insert alone and for any tree without
    /// duplicate keys.
    #[cfg(test)]
    pub(crate) fn assert_search_order<V>(&self, records: &Records<V>, strict_left: bool) {
        let mut stack: Vec<(RecordId, Option<Order>, Option<Order>)> =
            self.root.into_iter().map(|root| (root, None, None)).collect();
        while let Some((node, low, high)) = stack.pop() {
            let order = records.order_of(node);
            assert!(low.map_or(true, |low| low <= order));
            assert!(high.map_or(true, |high| order < high || (!strict_left && order == high)));
            if let Some(left) = records[node].left() {
                stack.push((left, low, Some(order)));
            }
            if let Some(right) = records[node].right() {
                stack.push((right, Some(order), high));
            }
        }
    }
}
