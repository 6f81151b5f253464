mod impls;
mod naive;

use std::collections::{BTreeSet, HashMap};

use llvm::BlockId;
pub use naive::*;

/// Dominator tree of a function, or post-dominator tree when `reverse` is
/// set. Post-dominance is computed against a virtual exit joining every
/// returning block.
pub struct DomTree {
	pub reverse: bool,
	// every block a block dominates, itself included
	pub dominates: HashMap<BlockId, BTreeSet<BlockId>>,
	// immediate dominator
	pub dominator: HashMap<BlockId, BlockId>,
	pub dom_direct: HashMap<BlockId, Vec<BlockId>>,
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::{LlvmFunc, LlvmGen};
	use llvm::*;

	// entry -> B1 | B2 -> B3
	pub(crate) fn diamond() -> LlvmFunc {
		let mut mgr = TempManager::new();
		let x = mgr.new_temp_with_name("x", VarType::I32);
		let mut func = LlvmFunc::new("diamond", VarType::I32, vec![x.clone()]);
		let mut gen = LlvmGen::new(&mut func, &mut mgr, 0);
		let left = gen.new_block();
		let right = gen.new_block();
		let join = gen.new_block();
		let c = gen.visit_comp_instr(x.clone().into(), CompOp::SGT, 0.into());
		gen.visit_jump_cond_instr(c.into(), left, right);
		gen.switch_to(left);
		let l = gen.visit_arith_instr(x.clone().into(), ArithOp::Add, 1.into());
		gen.visit_jump_instr(join);
		gen.switch_to(right);
		let r = gen.visit_arith_instr(x.into(), ArithOp::Sub, 1.into());
		gen.visit_jump_instr(join);
		gen.switch_to(join);
		let (_, y) = gen
			.visit_phi_instr(VarType::I32, vec![(l.into(), left), (r.into(), right)]);
		gen.visit_ret_instr(Some(y.into()));
		gen.visit_end();
		func
	}

	#[test]
	fn test_dominator_diamond() {
		let func = diamond();
		let dom = DomTree::new(&func, false);
		for bb in 0..4 {
			assert!(dom.dominates(0, bb));
		}
		assert!(!dom.dominates(1, 3));
		assert_eq!(dom.idom(3), Some(0));
		assert_eq!(dom.idom(0), None);
		let mut children = dom.children(0).to_vec();
		children.sort();
		assert_eq!(children, vec![1, 2, 3]);
	}

	#[test]
	fn test_post_dominator_diamond() {
		let func = diamond();
		let pdom = DomTree::new(&func, true);
		for bb in 0..4 {
			assert!(pdom.dominates(3, bb));
		}
		assert!(!pdom.dominates(1, 0));
		assert!(pdom.strictly_dominates(3, 1));
		assert_eq!(pdom.idom(0), Some(3));
		assert_eq!(pdom.idom(1), Some(3));
	}
}
