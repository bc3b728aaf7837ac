//! Binary heap over arena records with O(1) lookup by key.
//!
//! The heap keeps three views of the same complete binary tree in step:
//! the backing sequence (`slots`), the parent/left/right links stored on
//! each record, and a per-key FIFO table. Reordering moves records between
//! slots and relinks them; it never swaps payloads, so a caller's
//! [`RecordId`] keeps pointing at the same record wherever it lands.

use std::{
    fmt::{self, Debug},
    mem::{swap, take},
    str::FromStr,
};

use rand::{thread_rng, Rng};
use tracing::{debug, trace};

use crate::{
    dot,
    error::{Error, Result},
    index_multimap::IndexMultimap,
    order::Order,
    package::{self, KeyTree, Package},
    record::{RecordId, Records},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Discipline {
    #[default]
    Min,
    Max,
}

impl Discipline {
    pub fn flipped(self) -> Self {
        match self {
            Discipline::Min => Discipline::Max,
            Discipline::Max => Discipline::Min,
        }
    }

    /// Whether `a` belongs strictly closer to the root than `b`.
    pub fn precedes(self, a: Order, b: Order) -> bool {
        match self {
            Discipline::Min => a < b,
            Discipline::Max => a > b,
        }
    }
}

impl FromStr for Discipline {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        match token {
            "min" => Ok(Discipline::Min),
            "max" => Ok(Discipline::Max),
            other => Err(Error::InvalidDiscipline(other.to_owned())),
        }
    }
}

impl TryFrom<&str> for Discipline {
    type Error = Error;

    fn try_from(token: &str) -> Result<Self> {
        token.parse()
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Discipline::Min => "min",
            Discipline::Max => "max",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexedHeap {
    discipline: Discipline,
    slots: Vec<RecordId>,
    keys: IndexMultimap<Order, RecordId>,
}

fn parent_of(pos: usize) -> Option<usize> {
    pos.checked_sub(1).map(|p| p / 2)
}

fn left_of(pos: usize) -> usize {
    2 * pos + 1
}

fn right_of(pos: usize) -> usize {
    2 * pos + 2
}

fn position<V>(records: &Records<V>, id: RecordId) -> usize {
    records[id]
        .index()
        .unwrap_or_else(|| panic!("housed record {id:?} has no position"))
}

impl IndexedHeap {
    pub fn new(discipline: Discipline) -> Self {
        Self {
            discipline,
            slots: vec![],
            keys: IndexMultimap::new(),
        }
    }

    pub fn with_root<V>(records: &mut Records<V>, discipline: Discipline, root: RecordId) -> Result<Self> {
        let mut heap = Self::new(discipline);
        heap.insert(records, root)?;
        Ok(heap)
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn root(&self) -> Option<RecordId> {
        self.slots.first().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// `None` when empty, otherwise `floor(log2(count))`.
    pub fn height(&self) -> Option<usize> {
        let count = self.slots.len();
        let bit_length = usize::BITS - count.leading_zeros();
        bit_length.checked_sub(1).map(|h| h as usize)
    }

    /// Records in sequence (level) order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.slots.iter().copied()
    }

    pub fn insert<V>(&mut self, records: &mut Records<V>, id: RecordId) -> Result<()> {
        records.attach(id)?;

        let pos = self.slots.len();
        self.slots.push(id);
        self.keys.push_back(records.order_of(id), id);
        debug_assert_eq!(self.keys.num_values(), self.slots.len());
        self.relink_slot(records, pos);
        self.swap_up(records, id);
        Ok(())
    }

    /// Removes the oldest record with `order`, returning it detached.
    pub fn delete<V>(&mut self, records: &mut Records<V>, order: impl Into<Order>) -> Option<RecordId> {
        let order = order.into();
        let target = self.keys.pop_front(&order)?;
        let pos = position(records, target);
        let last = self.slots.len() - 1;

        if last == 0 {
            trace!(%order, "deleting sole record");
            self.slots.pop();
            records[target].detach();
            return Some(target);
        }

        if pos == last {
            trace!(%order, "deleting last slot");
            self.unlink_from_parent(records, last);
            self.slots.pop();
            records[target].detach();
            return Some(target);
        }

        let moved = self.slots[last];
        if parent_of(last) == Some(pos) {
            // the moved record was the target's child; the slot it vacates
            // disappears, the target's other child stays
            trace!(%order, pos, "deleting parent of last slot");
        } else {
            trace!(%order, pos, "deleting interior slot");
            self.unlink_from_parent(records, last);
        }
        self.slots.swap(pos, last);
        self.slots.pop();
        records[target].detach();
        self.relink_slot(records, pos);

        let violates_parent = records[moved]
            .parent()
            .is_some_and(|parent| self.discipline.precedes(records.order_of(moved), records.order_of(parent)));
        if violates_parent {
            self.swap_up(records, moved);
        } else {
            self.swap_down(records, moved);
        }
        Some(target)
    }

    pub fn delete_min<V>(&mut self, records: &mut Records<V>) -> Option<RecordId> {
        let order = records.order_of(self.min_node(records)?);
        self.delete(records, order)
    }

    pub fn delete_max<V>(&mut self, records: &mut Records<V>) -> Option<RecordId> {
        let order = records.order_of(self.max_node(records)?);
        self.delete(records, order)
    }

    pub fn get_by_order(&self, order: impl Into<Order>) -> Option<RecordId> {
        self.keys.front(&order.into()).copied()
    }

    /// Number of housed records with a strictly smaller key.
    pub fn get_rank_by_order<V>(&self, records: &Records<V>, order: impl Into<Order>) -> Option<usize> {
        let order = order.into();
        self.keys.front(&order)?;
        let rank = self
            .slots
            .iter()
            .filter(|&&id| records.order_of(id) < order)
            .count();
        Some(rank)
    }

    pub fn get_by_rank<V>(&self, records: &Records<V>, rank: usize) -> Option<RecordId> {
        self.get_by_rank_with(records, rank, &mut thread_rng())
    }

    /// Quickselect over the housed records using `rng` for pivots.
    ///
    /// Records sharing the pivot's key form one block; any of them may be
    /// returned for a rank inside the block.
    pub fn get_by_rank_with<V, R>(&self, records: &Records<V>, mut rank: usize, rng: &mut R) -> Option<RecordId>
    where
        R: Rng,
    {
        if rank >= self.slots.len() {
            return None;
        }

        let mut candidates: Vec<(Order, RecordId)> =
            self.slots.iter().map(|&id| (records.order_of(id), id)).collect();
        loop {
            let pivot = candidates[rng.gen_range(0..candidates.len())].0;
            let (mut smaller, mut equal, mut greater) = (vec![], vec![], vec![]);
            for candidate in candidates {
                match candidate.0.cmp(&pivot) {
                    std::cmp::Ordering::Less => smaller.push(candidate),
                    std::cmp::Ordering::Equal => equal.push(candidate),
                    std::cmp::Ordering::Greater => greater.push(candidate),
                }
            }

            if rank < smaller.len() {
                candidates = smaller;
            } else if rank >= smaller.len() + equal.len() {
                rank -= smaller.len() + equal.len();
                candidates = greater;
            } else {
                return Some(equal[0].1);
            }
        }
    }

    pub fn min_node<V>(&self, records: &Records<V>) -> Option<RecordId> {
        self.extreme(records, Discipline::Min)
    }

    pub fn max_node<V>(&self, records: &Records<V>) -> Option<RecordId> {
        self.extreme(records, Discipline::Max)
    }

    fn extreme<V>(&self, records: &Records<V>, wanted: Discipline) -> Option<RecordId> {
        let root = *self.slots.first()?;
        if wanted == self.discipline {
            return Some(root);
        }

        // the opposite extreme has no children, so it sits in the second half
        let leaves = &self.slots[self.slots.len() / 2..];
        leaves.iter().copied().reduce(|best, id| {
            if wanted.precedes(records.order_of(id), records.order_of(best)) {
                id
            } else {
                best
            }
        })
    }

    /// Records sorted by ascending key; the heap itself is untouched.
    pub fn ordered_list<V>(&self, records: &Records<V>) -> Vec<RecordId> {
        self.sorted(records).into_iter().map(|(_, id)| id).collect()
    }

    pub fn ordered_keys<V>(&self, records: &Records<V>) -> Vec<Order> {
        self.sorted(records).into_iter().map(|(order, _)| order).collect()
    }

    fn sorted<V>(&self, records: &Records<V>) -> Vec<(Order, RecordId)> {
        // the copy is already a heap, each pass moves its root behind the
        // shrinking prefix
        let mut copy: Vec<_> = self.slots.iter().map(|&id| (records.order_of(id), id)).collect();
        for end in (1..copy.len()).rev() {
            copy.swap(0, end);
            sift_down_slice(&mut copy[..end], self.discipline);
        }
        if self.discipline == Discipline::Min {
            copy.reverse();
        }
        copy
    }

    /// Switches between min and max order without reinserting anything.
    pub fn transform<V>(&mut self, records: &mut Records<V>) {
        self.discipline = self.discipline.flipped();
        debug!(discipline = %self.discipline, len = self.slots.len(), "transforming heap");
        self.heapify(records);
    }

    /// Absorbs the smaller of the two heaps into the larger; `other` ends empty.
    ///
    /// The result keeps this heap's discipline.
    pub fn merge<V>(&mut self, records: &mut Records<V>, other: &mut IndexedHeap) {
        if other.slots.len() > self.slots.len() {
            swap(&mut self.slots, &mut other.slots);
            swap(&mut self.keys, &mut other.keys);
        }
        debug!(
            kept = self.slots.len(),
            absorbed = other.slots.len(),
            absorbed_keys = other.keys.num_keys(),
            "merging heaps"
        );

        for id in take(&mut other.slots) {
            let pos = self.slots.len();
            self.slots.push(id);
            self.relink_slot(records, pos);
        }
        self.keys.append(&mut other.keys);
        self.heapify(records);
    }

    pub fn clear<V>(&mut self, records: &mut Records<V>) {
        debug!(len = self.slots.len(), keys = self.keys.num_keys(), "clearing heap");
        for &id in &self.slots {
            records[id].detach();
        }
        self.slots.clear();
        self.keys.clear();
    }

    pub fn package<'r, V>(&self, records: &'r Records<V>) -> Option<Package<'r, V>> {
        package::package(records, self.root())
    }

    pub fn package_keys<V>(&self, records: &Records<V>) -> KeyTree {
        package::package_keys(records, self.root())
    }

    pub fn output_dot<V: Debug>(&self, records: &Records<V>) -> String {
        dot::output_dot(records, self.root())
    }

    fn heapify<V>(&mut self, records: &mut Records<V>) {
        for pos in (0..self.slots.len() / 2).rev() {
            let id = self.slots[pos];
            self.swap_down(records, id);
        }
    }

    fn swap_up<V>(&mut self, records: &mut Records<V>, id: RecordId) {
        let order = records.order_of(id);
        while let Some(parent) = records[id].parent() {
            if !self.discipline.precedes(order, records.order_of(parent)) {
                break;
            }
            let (upper, lower) = (position(records, parent), position(records, id));
            self.exchange(records, upper, lower);
        }
    }

    fn swap_down<V>(&mut self, records: &mut Records<V>, id: RecordId) {
        while let Some(child) = self.swap_child(records, id) {
            let (upper, lower) = (position(records, id), position(records, child));
            self.exchange(records, upper, lower);
        }
    }

    /// The child `id` has to trade places with, if any.
    fn swap_child<V>(&self, records: &Records<V>, id: RecordId) -> Option<RecordId> {
        let record = &records[id];
        let candidate = match (record.left(), record.right()) {
            (None, None) => return None,
            (Some(child), None) | (None, Some(child)) => child,
            (Some(left), Some(right)) => {
                if self.discipline.precedes(records.order_of(left), records.order_of(right)) {
                    left
                } else {
                    right
                }
            }
        };
        self.discipline
            .precedes(records.order_of(candidate), record.order())
            .then_some(candidate)
    }

    /// Trades the records at a parent slot and its child slot.
    fn exchange<V>(&mut self, records: &mut Records<V>, upper: usize, lower: usize) {
        debug_assert_eq!(parent_of(lower), Some(upper));
        self.slots.swap(upper, lower);
        self.relink_slot(records, upper);
        self.relink_slot(records, lower);
    }

    /// Rewires the record at `pos`, and the back-links of its neighbours, to
    /// match the edges implied by sequence positions.
    fn relink_slot<V>(&self, records: &mut Records<V>, pos: usize) {
        let id = self.slots[pos];
        let parent = parent_of(pos).map(|p| self.slots[p]);
        let left = self.slots.get(left_of(pos)).copied();
        let right = self.slots.get(right_of(pos)).copied();

        let record = &mut records[id];
        record.index = Some(pos);
        record.parent = parent;
        record.left = left;
        record.right = right;

        if let Some(parent) = parent {
            if pos % 2 == 1 {
                records[parent].left = Some(id);
            } else {
                records[parent].right = Some(id);
            }
        }
        for child in [left, right].into_iter().flatten() {
            records[child].parent = Some(id);
        }
    }

    fn unlink_from_parent<V>(&self, records: &mut Records<V>, pos: usize) {
        let Some(parent) = records[self.slots[pos]].parent() else {
            return
        };
        if pos % 2 == 1 {
            records[parent].left = None;
        } else {
            records[parent].right = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_structure<V>(&self, records: &Records<V>) {
        assert_eq!(self.keys.num_values(), self.slots.len());
        for (pos, &id) in self.slots.iter().enumerate() {
            let record = &records[id];
            assert!(record.is_attached());
            assert_eq!(record.index(), Some(pos));
            assert_eq!(record.parent(), parent_of(pos).map(|p| self.slots[p]));
            assert_eq!(record.left(), self.slots.get(left_of(pos)).copied());
            assert_eq!(record.right(), self.slots.get(right_of(pos)).copied());
            if let Some(parent) = record.parent() {
                assert!(!self
                    .discipline
                    .precedes(record.order(), records.order_of(parent)));
            }
            assert!(self
                .keys
                .get(&record.order())
                .is_some_and(|queue| queue.contains(&id)));
        }
    }
}

fn sift_down_slice(heap: &mut [(Order, RecordId)], discipline: Discipline) {
    let mut pos = 0;
    loop {
        let left = left_of(pos);
        if left >= heap.len() {
            break;
        }
        let right = right_of(pos);
        let child = if right < heap.len() && discipline.precedes(heap[right].0, heap[left].0) {
            right
        } else {
            left
        };
        if !discipline.precedes(heap[child].0, heap[pos].0) {
            break;
        }
        heap.swap(pos, child);
        pos = child;
    }
}
