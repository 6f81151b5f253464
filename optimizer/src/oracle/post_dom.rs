use llvm::BlockId;
use rrvm::dominator::DomTree;

use super::PostDominance;

impl PostDominance for DomTree {
	fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
		self.reverse && self.dominates(a, b)
	}
}
