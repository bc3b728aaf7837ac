use std::ops::{Index, IndexMut};

use slotmap::{new_key_type, SlotMap};

use crate::{
    error::{Error, Result},
    order::Order,
    package::NodeSummary,
};

new_key_type! {
    /// A stable handle to a record in a [`Records`] arena.
    ///
    /// Handles stay valid across detachment and reinsertion. Removing the
    /// record from the arena retires the handle; the slot's version moves on,
    /// so the old handle never resolves to a later record.
    pub struct RecordId;
}

#[derive(Debug, Clone)]
pub struct Record<V> {
    order: Order,
    value: V,
    pub(crate) parent: Option<RecordId>,
    pub(crate) left: Option<RecordId>,
    pub(crate) right: Option<RecordId>,
    pub(crate) index: Option<usize>,
    pub(crate) attached: bool,
}

impl<V> Record<V> {
    fn new(order: Order, value: V) -> Self {
        Self {
            order,
            value,
            parent: None,
            left: None,
            right: None,
            index: None,
            attached: false,
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn left(&self) -> Option<RecordId> {
        self.left
    }

    pub fn right(&self) -> Option<RecordId> {
        self.right
    }

    /// Position in the backing sequence of the heap housing this record.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn detach(&mut self) {
        self.parent = None;
        self.left = None;
        self.right = None;
        self.index = None;
        self.attached = false;
    }
}

/// Owning arena for every record the containers link together.
///
/// Containers store only [`RecordId`]s and borrow the arena per operation.
#[derive(Debug, Clone)]
pub struct Records<V> {
    records: SlotMap<RecordId, Record<V>>,
}

impl<V> Records<V> {
    pub fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: SlotMap::with_capacity_and_key(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Creates a detached record.
    pub fn insert(&mut self, order: impl Into<Order>, value: V) -> RecordId {
        self.records.insert(Record::new(order.into(), value))
    }

    pub fn get(&self, id: RecordId) -> Option<&Record<V>> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record<V>> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Changes the key of a detached record.
    pub fn set_order(&mut self, id: RecordId, order: impl Into<Order>) -> Result<()> {
        let record = self.get_mut(id).ok_or(Error::UnknownRecord(id))?;
        if record.attached {
            return Err(Error::OrderLocked(id));
        }
        record.order = order.into();
        Ok(())
    }

    /// Drops a detached record from the arena, returning its value.
    pub fn remove(&mut self, id: RecordId) -> Result<V> {
        let record = self.get(id).ok_or(Error::UnknownRecord(id))?;
        if record.attached {
            return Err(Error::AlreadyAttached(id));
        }
        let record = self.records.remove(id).ok_or(Error::UnknownRecord(id))?;
        Ok(record.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record<V>)> {
        self.records.iter()
    }

    /// One-level view of a record and its immediate neighbours.
    pub fn summary(&self, id: RecordId) -> Option<NodeSummary<'_, V>> {
        let record = self.get(id)?;
        Some(NodeSummary::new(self, record))
    }

    /// Claims a record for a container, failing if another container holds it.
    pub(crate) fn attach(&mut self, id: RecordId) -> Result<()> {
        let record = self.get_mut(id).ok_or(Error::UnknownRecord(id))?;
        if record.attached {
            return Err(Error::AlreadyAttached(id));
        }
        record.attached = true;
        Ok(())
    }

    pub(crate) fn order_of(&self, id: RecordId) -> Order {
        self[id].order
    }
}

impl<V> Default for Records<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Index<RecordId> for Records<V> {
    type Output = Record<V>;

    fn index(&self, id: RecordId) -> &Record<V> {
        self.get(id)
            .unwrap_or_else(|| panic!("`Records::index()` - {id:?} is not in the arena"))
    }
}

impl<V> IndexMut<RecordId> for Records<V> {
    fn index_mut(&mut self, id: RecordId) -> &mut Record<V> {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("`Records::index_mut()` - {id:?} is not in the arena"))
    }
}

#[cfg(test)]
mod test {
    use super::Records;
    use crate::{error::Error, order::Order};

    #[test]
    fn new_records_are_detached() {
        let mut records = Records::new();
        let id = records.insert(5, "five");
        let record = &records[id];
        assert_eq!(record.order(), Order::from(5));
        assert_eq!(*record.value(), "five");
        assert!(!record.is_attached());
        assert_eq!(record.index(), None);
        assert_eq!((record.parent(), record.left(), record.right()), (None, None, None));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn attached_records_are_locked() {
        let mut records = Records::new();
        let id = records.insert(1, ());
        records.set_order(id, 2).unwrap();
        assert_eq!(records[id].order(), Order::from(2));

        records.attach(id).unwrap();
        assert_eq!(records.attach(id), Err(Error::AlreadyAttached(id)));
        assert_eq!(records.set_order(id, 3), Err(Error::OrderLocked(id)));
        assert_eq!(records[id].order(), Order::from(2));
        assert_eq!(records.remove(id), Err(Error::AlreadyAttached(id)));

        records[id].detach();
        assert_eq!(records.remove(id), Ok(()));
        assert!(records.is_empty());
    }

    #[test]
    fn stale_handles_do_not_alias() {
        let mut records = Records::new();
        let first = records.insert(1, 'a');
        assert_eq!(records.remove(first), Ok('a'));
        let second = records.insert(2, 'b');

        assert_ne!(first, second);
        assert!(records.get(first).is_none());
        assert!(!records.contains(first));
        assert_eq!(records.set_order(first, 9), Err(Error::UnknownRecord(first)));
        assert_eq!(records.remove(first), Err(Error::UnknownRecord(first)));
        assert_eq!(*records[second].value(), 'b');
        assert_eq!(records.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![second]);
    }

    #[test]
    fn reused_slots_keep_handles_apart() {
        let mut records = Records::with_capacity(1);
        let mut retired = vec![];
        for round in 0..1_000 {
            let id = records.insert(round, round);
            assert!(retired.iter().all(|&old| old != id && !records.contains(old)));
            assert_eq!(records.remove(id), Ok(round));
            retired.push(id);
        }
        assert!(records.is_empty());
    }

    #[test]
    fn values_are_mutable_while_attached() {
        let mut records = Records::new();
        let id = records.insert(1, String::from("x"));
        records.attach(id).unwrap();
        records[id].value_mut().push('y');
        assert_eq!(records[id].value(), "xy");
    }
}
