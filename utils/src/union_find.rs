use core::hash::Hash;
use std::collections::{BTreeMap, HashMap};

pub struct UnionFind<T: Hash + Eq + Copy> {
	fa: HashMap<T, T>,
}

impl<T: Hash + Eq + Copy> UnionFind<T> {
	pub fn find(&mut self, x: T) -> T {
		let mut root = x;
		while let Some(&up) = self.fa.get(&root) {
			root = up;
		}
		let mut cur = x;
		while let Some(&up) = self.fa.get(&cur) {
			if up != root {
				self.fa.insert(cur, root);
			}
			cur = up;
		}
		root
	}
	pub fn merge(&mut self, x: T, y: T) {
		let (x, y) = (self.find(x), self.find(y));
		if x != y {
			self.fa.insert(x, y);
		}
	}
	pub fn same(&mut self, x: T, y: T) -> bool {
		self.find(x) == self.find(y)
	}
	pub fn is_root(&mut self, x: T) -> bool {
		x == self.find(x)
	}
	/// Splits `items` into classes, each ordered like `items`, the classes
	/// ordered by their first element.
	pub fn classes(&mut self, items: impl IntoIterator<Item = T>) -> Vec<Vec<T>> {
		let mut order: BTreeMap<usize, Vec<T>> = BTreeMap::new();
		let mut first: HashMap<T, usize> = HashMap::new();
		for (pos, item) in items.into_iter().enumerate() {
			let root = self.find(item);
			let slot = *first.entry(root).or_insert(pos);
			order.entry(slot).or_default().push(item);
		}
		order.into_values().collect()
	}
}

impl<T: Hash + Eq + Copy> Default for UnionFind<T> {
	fn default() -> Self {
		Self { fa: HashMap::new() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_classes() {
		let mut uf = UnionFind::default();
		uf.merge(1, 4);
		uf.merge(4, 6);
		uf.merge(2, 5);
		assert!(uf.same(1, 6));
		assert!(!uf.same(1, 2));
		assert_eq!(
			uf.classes(1..=7),
			vec![vec![1, 4, 6], vec![2, 5], vec![3], vec![7]]
		);
	}
}
