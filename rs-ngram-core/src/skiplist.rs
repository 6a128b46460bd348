//! Probabilistic ordered map.
//!
//! A classic skiplist with `p = 0.5`, stored in an arena: nodes live in a
//! `Vec` and link to each other by index, which keeps the structure free of
//! `unsafe` and reference counting. Freed slots are recycled.
//!
//! The list is single-threaded; it is used as the hot count buffer of
//! [`MergeCounter`](crate::counter::MergeCounter).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Index of the head node. The head carries no entry.
const HEAD: usize = 0;

/// Null link.
const NIL: usize = usize::MAX;

struct Node<K, V> {
	/// `None` for the head and for freed slots.
	entry: Option<(K, V)>,
	/// Forward links, one per level of this node.
	next: Vec<usize>,
}

/// Ordered map from `K` to `V` backed by a skiplist.
///
/// # Invariants
/// - Following level-0 links from the head visits keys in strictly ascending order
/// - `level` is the highest level in use, always within `1..=max_level`
pub struct Skiplist<K, V> {
	nodes: Vec<Node<K, V>>,
	free: Vec<usize>,
	max_level: usize,
	level: usize,
	len: usize,
	rng: StdRng,
}

impl<K: Ord, V> Skiplist<K, V> {
	/// Creates a skiplist tuned for about `maxsize` entries.
	///
	/// The maximum level is `floor(log2(maxsize))`, at least 1. More entries
	/// than `maxsize` are fine, lookups just degrade towards linear time.
	pub fn new(maxsize: usize) -> Self {
		Self::with_rng(maxsize, StdRng::from_rng(&mut rand::rng()))
	}

	/// Creates a skiplist whose level choices are driven by a seeded generator.
	pub fn with_seed(maxsize: usize, seed: u64) -> Self {
		Self::with_rng(maxsize, StdRng::seed_from_u64(seed))
	}

	fn with_rng(maxsize: usize, rng: StdRng) -> Self {
		let max_level = (maxsize.max(2).ilog2() as usize).max(1);
		let head = Node { entry: None, next: vec![NIL; max_level] };
		Self {
			nodes: vec![head],
			free: Vec::new(),
			max_level,
			level: 1,
			len: 0,
			rng,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	fn key_at(&self, index: usize) -> Option<&K> {
		self.nodes.get(index)?.entry.as_ref().map(|(key, _)| key)
	}

	/// Draws a level by counting the trailing set bits of a random integer.
	fn random_level(&mut self) -> usize {
		let bits: u64 = self.rng.random();
		(bits.trailing_ones() as usize).clamp(1, self.max_level)
	}

	/// Finds, for every level, the last node whose key is below `key`.
	fn find_update(&self, key: &K) -> Vec<usize> {
		let mut update = vec![HEAD; self.max_level];
		let mut node = HEAD;
		for lvl in (0..self.level).rev() {
			loop {
				let next = self.nodes[node].next[lvl];
				match self.key_at(next) {
					Some(k) if k < key => node = next,
					_ => break,
				}
			}
			update[lvl] = node;
		}
		update
	}

	/// Inserts `value` under `key`, overwriting any previous value.
	pub fn insert(&mut self, key: K, value: V) {
		let mut update = self.find_update(&key);

		let candidate = self.nodes[update[0]].next[0];
		if self.key_at(candidate) == Some(&key) {
			if let Some((_, slot)) = self.nodes[candidate].entry.as_mut() {
				*slot = value;
			}
			return;
		}

		let level = self.random_level();
		if level > self.level {
			for slot in update.iter_mut().take(level).skip(self.level) {
				*slot = HEAD;
			}
			self.level = level;
		}

		let node = Node { entry: Some((key, value)), next: vec![NIL; level] };
		let index = match self.free.pop() {
			Some(index) => {
				self.nodes[index] = node;
				index
			}
			None => {
				self.nodes.push(node);
				self.nodes.len() - 1
			}
		};

		for (lvl, &prev) in update.iter().enumerate().take(level) {
			self.nodes[index].next[lvl] = self.nodes[prev].next[lvl];
			self.nodes[prev].next[lvl] = index;
		}
		self.len += 1;
	}

	pub fn get(&self, key: &K) -> Option<&V> {
		let update = self.find_update(key);
		let candidate = self.nodes[update[0]].next[0];
		match self.nodes.get(candidate)?.entry.as_ref() {
			Some((k, value)) if k == key => Some(value),
			_ => None,
		}
	}

	/// Returns the value stored under `key`, or `default`.
	pub fn get_or(&self, key: &K, default: V) -> V
	where
		V: Clone,
	{
		self.get(key).cloned().unwrap_or(default)
	}

	/// Removes `key`, returning its value if it was present.
	pub fn delete(&mut self, key: &K) -> Option<V> {
		let update = self.find_update(key);
		let candidate = self.nodes[update[0]].next[0];
		if self.key_at(candidate) != Some(key) {
			return None;
		}

		for (lvl, &prev) in update.iter().enumerate().take(self.level) {
			if self.nodes[prev].next[lvl] != candidate {
				break;
			}
			self.nodes[prev].next[lvl] = self.nodes[candidate].next[lvl];
		}

		while self.level > 1 && self.nodes[HEAD].next[self.level - 1] == NIL {
			self.level -= 1;
		}

		let node = &mut self.nodes[candidate];
		node.next.clear();
		let entry = node.entry.take();
		self.free.push(candidate);
		self.len -= 1;

		entry.map(|(_, value)| value)
	}

	/// Removes every entry, keeping the allocated arena.
	pub fn clear(&mut self) {
		self.nodes.truncate(1);
		self.nodes[HEAD].next.iter_mut().for_each(|link| *link = NIL);
		self.free.clear();
		self.level = 1;
		self.len = 0;
	}

	/// Moves every entry out in ascending key order, leaving the list empty.
	pub fn drain(&mut self) -> Vec<(K, V)> {
		let mut entries = Vec::with_capacity(self.len);
		let mut index = self.nodes[HEAD].next[0];
		while let Some(node) = self.nodes.get_mut(index) {
			index = node.next.first().copied().unwrap_or(NIL);
			entries.extend(node.entry.take());
		}
		self.clear();
		entries
	}

	/// Iterates over entries in ascending key order.
	pub fn items(&self) -> Items<'_, K, V> {
		Items { list: self, node: self.nodes[HEAD].next[0] }
	}
}

/// Ascending iterator returned by [`Skiplist::items`].
pub struct Items<'a, K, V> {
	list: &'a Skiplist<K, V>,
	node: usize,
}

impl<'a, K, V> Iterator for Items<'a, K, V> {
	type Item = (&'a K, &'a V);

	fn next(&mut self) -> Option<Self::Item> {
		let node = self.list.nodes.get(self.node)?;
		self.node = node.next.first().copied().unwrap_or(NIL);
		node.entry.as_ref().map(|(key, value)| (key, value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collect(skip: &Skiplist<String, String>) -> Vec<(String, String)> {
		skip.items().map(|(k, v)| (k.clone(), v.clone())).collect()
	}

	fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
		items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn test_insert() {
		let items = pairs(&[("foo", "bar"), ("bar", "baz"), ("quux", "quuux")]);

		let mut skip = Skiplist::with_seed(10, 1);
		for (key, value) in items.clone() {
			skip.insert(key, value);
		}

		let mut expected = items;
		expected.sort();
		assert_eq!(expected, collect(&skip));
		assert_eq!(3, skip.len());
	}

	#[test]
	fn test_overwrite() {
		let mut skip = Skiplist::with_seed(10, 2);
		skip.insert("foo", 1);
		skip.insert("foo", 2);

		assert_eq!(Some(&2), skip.get(&"foo"));
		assert_eq!(1, skip.len());
		assert_eq!(7, skip.get_or(&"missing", 7));
	}

	#[test]
	fn test_delete_one() {
		let mut skip = Skiplist::with_seed(10, 3);
		skip.insert("foo".to_owned(), "bar".to_owned());

		assert_eq!(Some("bar".to_owned()), skip.delete(&"foo".to_owned()));
		assert!(collect(&skip).is_empty());
		assert!(skip.is_empty());
	}

	#[test]
	fn test_delete_two() {
		let mut skip = Skiplist::with_seed(10, 4);
		skip.insert("foo".to_owned(), "bar".to_owned());
		skip.insert("quux".to_owned(), "quuux".to_owned());

		skip.delete(&"foo".to_owned());
		assert_eq!(pairs(&[("quux", "quuux")]), collect(&skip));

		skip.insert("foo".to_owned(), "bar".to_owned());
		skip.delete(&"quux".to_owned());
		assert_eq!(pairs(&[("foo", "bar")]), collect(&skip));
	}

	#[test]
	fn test_delete_each() {
		let items = pairs(&[("foo", "bar"), ("bar", "baz"), ("quux", "quuux")]);

		for (to_delete, _) in &items {
			let mut skip = Skiplist::with_seed(10, 5);
			for (key, value) in items.clone() {
				skip.insert(key, value);
			}

			skip.delete(to_delete);

			let mut expected: Vec<_> = items.iter().filter(|(k, _)| k != to_delete).cloned().collect();
			expected.sort();
			assert_eq!(expected, collect(&skip));
		}
	}

	#[test]
	fn test_delete_from_empty() {
		let mut skip: Skiplist<String, String> = Skiplist::with_seed(10, 6);
		assert_eq!(None, skip.delete(&"foo".to_owned()));
		assert!(collect(&skip).is_empty());
	}

	#[test]
	fn test_too_many_items() {
		let items: Vec<(String, String)> =
			(0..1000).map(|d| (format!("item{d}"), format!("value{d}"))).collect();

		// 1000 items in a skiplist sized for 10
		let mut skip = Skiplist::with_seed(10, 7);
		for (key, value) in items.clone() {
			skip.insert(key, value);
		}

		let mut expected = items;
		expected.sort();
		assert_eq!(expected, collect(&skip));
	}

	#[test]
	fn test_last_insert_wins() {
		let mut skip = Skiplist::with_seed(64, 8);
		let mut rng = StdRng::seed_from_u64(9);
		let mut reference = std::collections::BTreeMap::new();

		for i in 0..5000u32 {
			let key: u16 = rng.random_range(0..300);
			if rng.random_range(0..4) == 0 {
				assert_eq!(reference.remove(&key), skip.delete(&key));
			} else {
				skip.insert(key, i);
				reference.insert(key, i);
			}
		}

		let got: Vec<(u16, u32)> = skip.items().map(|(k, v)| (*k, *v)).collect();
		let want: Vec<(u16, u32)> = reference.into_iter().collect();
		assert_eq!(want, got);
		assert_eq!(want.len(), skip.len());
	}

	#[test]
	fn test_clear() {
		let mut skip = Skiplist::with_seed(16, 10);
		for i in 0..100 {
			skip.insert(i, i);
		}
		skip.clear();
		assert!(skip.is_empty());
		assert_eq!(None, skip.items().next());

		skip.insert(3, 3);
		assert_eq!(vec![(&3, &3)], skip.items().collect::<Vec<_>>());
	}

	#[test]
	fn test_drain() {
		let mut skip = Skiplist::with_seed(16, 11);
		for key in [5, 1, 4, 2, 3] {
			skip.insert(key, key * 10);
		}
		skip.delete(&4);

		assert_eq!(vec![(1, 10), (2, 20), (3, 30), (5, 50)], skip.drain());
		assert!(skip.is_empty());
		assert!(skip.drain().is_empty());
	}
}
