use std::{
    collections::VecDeque,
    hash::{BuildHasherDefault, Hash},
};

use indexmap::IndexMap;
use twox_hash::XxHash64;

type Hasher = BuildHasherDefault<XxHash64>;

/// Multimap keeping a FIFO queue of values per key.
///
/// The oldest value pushed for a key is the one `front` returns and
/// `pop_front` removes. Keys whose queue empties are dropped.
#[derive(Debug, Clone)]
pub struct IndexMultimap<K, V> {
    map: IndexMap<K, VecDeque<V>, Hasher>,
    values: usize,
}

impl<K, V> IndexMultimap<K, V> {
    pub fn new() -> Self {
        Self {
            map: IndexMap::default(),
            values: 0,
        }
    }

    pub fn num_keys(&self) -> usize {
        self.map.len()
    }

    pub fn num_values(&self) -> usize {
        self.values
    }

    pub fn push_back(&mut self, k: K, v: V)
    where
        K: Hash + Eq,
    {
        self.map.entry(k).or_default().push_back(v);
        self.values += 1;
    }

    pub fn front(&self, k: &K) -> Option<&V>
    where
        K: Hash + Eq,
    {
        self.map.get(k)?.front()
    }

    pub fn pop_front(&mut self, k: &K) -> Option<V>
    where
        K: Hash + Eq,
    {
        let queue = self.map.get_mut(k)?;
        let v = queue.pop_front()?;
        if queue.is_empty() {
            self.map.swap_remove(k);
        }
        self.values -= 1;
        Some(v)
    }

    #[cfg(test)]
    pub fn get(&self, k: &K) -> Option<&VecDeque<V>>
    where
        K: Hash + Eq,
    {
        self.map.get(k)
    }

    /// Moves every queue of `other` behind the matching queue of `self`.
    pub fn append(&mut self, other: &mut Self)
    where
        K: Hash + Eq,
    {
        for (k, mut queue) in other.map.drain(..) {
            self.values += queue.len();
            self.map.entry(k).or_default().append(&mut queue);
        }
        other.values = 0;
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.values = 0;
    }
}

impl<K, V> Default for IndexMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::IndexMultimap;

    #[test]
    fn queues_are_fifo() {
        let mut map = IndexMultimap::new();
        map.push_back(1, 'a');
        map.push_back(2, 'b');
        map.push_back(1, 'c');
        assert_eq!(map.num_keys(), 2);
        assert_eq!(map.num_values(), 3);

        assert_eq!(map.front(&1), Some(&'a'));
        assert_eq!(map.pop_front(&1), Some('a'));
        assert_eq!(map.pop_front(&1), Some('c'));
        assert_eq!(map.pop_front(&1), None);
        assert_eq!(map.get(&1), None);
        assert_eq!(map.num_keys(), 1);
        assert_eq!(map.num_values(), 1);
        assert_eq!(map.pop_front(&7), None);
    }

    #[test]
    fn append_keeps_both_orders() {
        let mut a = IndexMultimap::new();
        a.push_back(1, 10);
        a.push_back(2, 20);
        let mut b = IndexMultimap::new();
        b.push_back(1, 11);
        b.push_back(3, 31);

        a.append(&mut b);
        assert_eq!(b.num_keys(), 0);
        assert_eq!(b.num_values(), 0);
        assert_eq!(a.num_values(), 4);
        assert_eq!(a.get(&1).unwrap().iter().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(a.num_keys(), 3);
        assert_eq!(a.get(&3).map(|q| q.len()), Some(1));

        a.clear();
        assert_eq!(a.num_keys(), 0);
        assert_eq!(a.num_values(), 0);
    }
}
