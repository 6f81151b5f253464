use std::collections::HashMap;

use llvm::BlockId;

use super::{compute_dominator, DomTree};
use crate::func::LlvmFunc;

impl DomTree {
	pub fn new(func: &LlvmFunc, reverse: bool) -> Self {
		let mut dominates = HashMap::new();
		let mut dom_direct = HashMap::new();
		let mut dominator = HashMap::new();
		compute_dominator(
			func,
			reverse,
			&mut dominates,
			&mut dom_direct,
			&mut dominator,
		);
		Self {
			reverse,
			dominates,
			dominator,
			dom_direct,
		}
	}
	pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
		self.dominates.get(&a).map_or(false, |set| set.contains(&b))
	}
	pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
		a != b && self.dominates(a, b)
	}
	pub fn idom(&self, block: BlockId) -> Option<BlockId> {
		self.dominator.get(&block).copied()
	}
	pub fn children(&self, block: BlockId) -> &[BlockId] {
		self.dom_direct.get(&block).map_or(&[], |v| v.as_slice())
	}
}
