//! Plain-data snapshots of a container's shape.
//!
//! [`Package`] and [`KeyTree`] mirror a subtree at the moment they are taken;
//! [`NodeSummary`] looks only one hop around a single record. All three
//! serialize with serde for inspection. Building and dropping them never
//! recurses, so a degenerate tree of any depth can be packaged.

use std::mem::replace;

use serde::{ser::SerializeMap, ser::SerializeSeq, Serialize, Serializer};

use crate::{
    order::Order,
    record::{Record, RecordId, Records},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package<'a, V> {
    pub order: Order,
    pub value: &'a V,
    pub left_child: Option<Box<Package<'a, V>>>,
    pub right_child: Option<Box<Package<'a, V>>>,
}

/// Key-only shape: `[order, left, right]`, with `[null]` for an absent subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyTree {
    Absent,
    Node(Order, Box<KeyTree>, Box<KeyTree>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbour<'a, V> {
    pub order: Order,
    pub value: &'a V,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary<'a, V> {
    pub order: Order,
    pub value: &'a V,
    #[serde(serialize_with = "neighbour_or_empty")]
    pub parent: Option<Neighbour<'a, V>>,
    #[serde(serialize_with = "neighbour_or_empty")]
    pub left_child: Option<Neighbour<'a, V>>,
    #[serde(serialize_with = "neighbour_or_empty")]
    pub right_child: Option<Neighbour<'a, V>>,
}

impl KeyTree {
    pub fn node(order: impl Into<Order>, left: KeyTree, right: KeyTree) -> Self {
        KeyTree::Node(order.into(), Box::new(left), Box::new(right))
    }

    pub fn leaf(order: impl Into<Order>) -> Self {
        KeyTree::node(order, KeyTree::Absent, KeyTree::Absent)
    }

    pub fn order(&self) -> Option<Order> {
        match self {
            KeyTree::Absent => None,
            KeyTree::Node(order, ..) => Some(*order),
        }
    }

    fn take_children(&mut self, stack: &mut Vec<KeyTree>) {
        if let KeyTree::Node(_, left, right) = self {
            for child in [left, right] {
                if let KeyTree::Node(..) = **child {
                    stack.push(replace(&mut **child, KeyTree::Absent));
                }
            }
        }
    }
}

impl Drop for KeyTree {
    fn drop(&mut self) {
        let mut stack = vec![];
        self.take_children(&mut stack);
        while let Some(mut tree) = stack.pop() {
            tree.take_children(&mut stack);
        }
    }
}

impl<V> Drop for Package<'_, V> {
    fn drop(&mut self) {
        let mut stack: Vec<_> = self.left_child.take().into_iter().collect();
        stack.extend(self.right_child.take());
        while let Some(mut package) = stack.pop() {
            stack.extend(package.left_child.take());
            stack.extend(package.right_child.take());
        }
    }
}

impl Serialize for KeyTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyTree::Absent => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&None::<Order>)?;
                seq.end()
            }
            KeyTree::Node(order, left, right) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(order)?;
                seq.serialize_element(&**left)?;
                seq.serialize_element(&**right)?;
                seq.end()
            }
        }
    }
}

fn neighbour_or_empty<V, S>(neighbour: &Option<Neighbour<'_, V>>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    match neighbour {
        Some(neighbour) => neighbour.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl<'a, V> NodeSummary<'a, V> {
    pub(crate) fn new(records: &'a Records<V>, record: &'a Record<V>) -> Self {
        let neighbour = |id: Option<RecordId>| {
            id.map(|id| {
                let record = &records[id];
                Neighbour {
                    order: record.order(),
                    value: record.value(),
                }
            })
        };
        Self {
            order: record.order(),
            value: record.value(),
            parent: neighbour(record.parent()),
            left_child: neighbour(record.left()),
            right_child: neighbour(record.right()),
        }
    }
}

enum Visit {
    Enter(Option<RecordId>),
    Exit(RecordId),
}

/// Post-order fold over the left/right links below `root`, without recursion.
pub(crate) fn fold_tree<'r, V, T>(
    records: &'r Records<V>,
    root: Option<RecordId>,
    mut absent: impl FnMut() -> T,
    mut node: impl FnMut(&'r Record<V>, T, T) -> T,
) -> T {
    let mut visits = vec![Visit::Enter(root)];
    let mut built = vec![];
    while let Some(visit) = visits.pop() {
        match visit {
            Visit::Enter(None) => built.push(absent()),
            Visit::Enter(Some(id)) => {
                let record = &records[id];
                visits.push(Visit::Exit(id));
                visits.push(Visit::Enter(record.right()));
                visits.push(Visit::Enter(record.left()));
            }
            Visit::Exit(id) => {
                let right = built.pop().unwrap();
                let left = built.pop().unwrap();
                built.push(node(&records[id], left, right));
            }
        }
    }
    debug_assert_eq!(built.len(), 1);
    built.pop().unwrap()
}

pub(crate) fn package<V>(records: &Records<V>, root: Option<RecordId>) -> Option<Package<'_, V>> {
    fold_tree(
        records,
        root,
        || None,
        |record, left_child, right_child| {
            Some(Box::new(Package {
                order: record.order(),
                value: record.value(),
                left_child,
                right_child,
            }))
        },
    )
    .map(|package| *package)
}

pub(crate) fn package_keys<V>(records: &Records<V>, root: Option<RecordId>) -> KeyTree {
    fold_tree(
        records,
        root,
        || KeyTree::Absent,
        |record, left, right| KeyTree::Node(record.order(), Box::new(left), Box::new(right)),
    )
}
