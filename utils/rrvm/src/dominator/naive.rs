// naive algorithm computing dominator tree with complexity O(n*m):
// the blocks a block dominates are exactly the blocks that become
// unreachable from the root once it is removed from the graph

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use llvm::BlockId;

use crate::func::LlvmFunc;

fn walk(
	func: &LlvmFunc,
	reverse: bool,
	roots: &[BlockId],
	removed: Option<BlockId>,
) -> HashSet<BlockId> {
	let mut reachable = HashSet::new();
	let mut worklist: VecDeque<BlockId> =
		roots.iter().copied().filter(|&r| Some(r) != removed).collect();
	while let Some(bb) = worklist.pop_front() {
		if !reachable.insert(bb) {
			continue;
		}
		let next = if reverse {
			func.predecessors(bb)
		} else {
			func.successors(bb)
		};
		for &n in next {
			if Some(n) != removed && !reachable.contains(&n) {
				worklist.push_back(n);
			}
		}
	}
	reachable
}

pub fn compute_dominator(
	func: &LlvmFunc,
	reverse: bool,
	dominates: &mut HashMap<BlockId, BTreeSet<BlockId>>,
	dominates_directly: &mut HashMap<BlockId, Vec<BlockId>>,
	dominator: &mut HashMap<BlockId, BlockId>,
) {
	let roots = if reverse {
		func.exit_blocks()
	} else {
		vec![func.entry()]
	};
	let all = walk(func, reverse, &roots, None);
	let mut blocks: Vec<_> = all.iter().copied().collect();
	blocks.sort();
	for &bb in blocks.iter() {
		let reachable = walk(func, reverse, &roots, Some(bb));
		let dominated =
			blocks.iter().copied().filter(|b| !reachable.contains(b)).collect();
		dominates.insert(bb, dominated);
	}
	// the immediate dominator is the strict dominator that all the other
	// strict dominators dominate
	for &bb in blocks.iter() {
		let strict: Vec<BlockId> = blocks
			.iter()
			.copied()
			.filter(|&d| d != bb && dominates[&d].contains(&bb))
			.collect();
		let idom = strict
			.iter()
			.copied()
			.find(|&c| strict.iter().all(|d| dominates[d].contains(&c)));
		if let Some(idom) = idom {
			dominator.insert(bb, idom);
			dominates_directly.entry(idom).or_default().push(bb);
		}
	}
}
