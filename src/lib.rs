//! Ordered containers over mutable records with stable identity.
//!
//! Every record lives in a [`Records`] arena and is named by a [`RecordId`].
//! The containers, [`IndexedHeap`] and [`OrderStatisticsTree`], only link
//! records together; each operation borrows the arena it works on. A record
//! sits in at most one container at a time, and its key is frozen while it
//! does.

mod dot;
mod error;
mod heap;
mod index_multimap;
mod order;
mod package;
mod record;
mod tree;

pub use error::{Error, Result};
pub use heap::{Discipline, IndexedHeap};
pub use order::Order;
pub use package::{KeyTree, Neighbour, NodeSummary, Package};
pub use record::{Record, RecordId, Records};
pub use tree::{InOrder, OrderStatisticsTree};
