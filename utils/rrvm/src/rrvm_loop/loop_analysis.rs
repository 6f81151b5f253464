use std::collections::{BTreeSet, HashMap};

use llvm::BlockId;
use log::trace;

use super::Loop;
use crate::{dominator::DomTree, func::LlvmFunc};

impl LlvmFunc {
	/// Natural loops of the function, outermost first. Back edges sharing a
	/// header form one loop.
	pub fn loop_analysis(&self) -> Vec<Loop> {
		let dom = DomTree::new(self, false);
		let rpo = self.reverse_post_order();
		let rpo_index: HashMap<BlockId, usize> =
			rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

		let mut loops = Vec::new();
		for &header in rpo.iter() {
			// a predecessor dominated by the header closes a back edge
			let latches: Vec<BlockId> = self
				.predecessors(header)
				.iter()
				.copied()
				.filter(|&p| dom.dominates(header, p))
				.collect();
			if latches.is_empty() {
				continue;
			}
			let blocks = natural_loop(self, header, &latches);
			trace!("loop at {} with {} blocks", header, blocks.len());
			loops.push(Loop {
				id: 0,
				outer: None,
				header,
				level: 1,
				subloops: Vec::new(),
				blocks,
				latches,
				exiting: Vec::new(),
				exits: Vec::new(),
				preheader: None,
			});
		}

		let levels: Vec<i32> = (0..loops.len())
			.map(|i| {
				let outer = (0..loops.len()).filter(|&j| {
					j != i && loops[j].blocks.is_superset(&loops[i].blocks)
				});
				1 + outer.count() as i32
			})
			.collect();
		for (loop_, level) in loops.iter_mut().zip(levels) {
			loop_.level = level;
		}
		loops.sort_by_key(|l| (l.level, rpo_index[&l.header]));

		for i in 0..loops.len() {
			loops[i].id = i;
			let outer = (0..loops.len()).find(|&j| {
				loops[j].level == loops[i].level - 1
					&& loops[j].blocks.is_superset(&loops[i].blocks)
			});
			loops[i].outer = outer;
			if let Some(outer) = outer {
				loops[outer].subloops.push(i);
			}
			self.fill_exits(&mut loops[i]);
		}
		loops
	}

	fn fill_exits(&self, loop_: &mut Loop) {
		let mut exits = BTreeSet::new();
		for &bb in loop_.blocks.iter() {
			let outside: Vec<_> = self
				.successors(bb)
				.iter()
				.copied()
				.filter(|s| !loop_.contains(*s))
				.collect();
			if !outside.is_empty() {
				loop_.exiting.push(bb);
				exits.extend(outside);
			}
		}
		loop_.exits = exits.into_iter().collect();
		let entering: Vec<_> = self
			.predecessors(loop_.header)
			.iter()
			.copied()
			.filter(|p| !loop_.contains(*p))
			.collect();
		if let [pred] = entering.as_slice() {
			if self.successors(*pred) == [loop_.header].as_slice() {
				loop_.preheader = Some(*pred);
			}
		}
	}
}

fn natural_loop(
	func: &LlvmFunc,
	header: BlockId,
	latches: &[BlockId],
) -> BTreeSet<BlockId> {
	let mut blocks = BTreeSet::from([header]);
	let mut stack = latches.to_vec();
	while let Some(bb) = stack.pop() {
		if blocks.insert(bb) {
			stack.extend(func.predecessors(bb).iter().copied());
		}
	}
	blocks
}

#[cfg(test)]
mod tests {
	use crate::samples::*;

	#[test]
	fn test_loops_of_array_scale() {
		let program = array_scale(10);
		let func = &program.funcs[0];
		let loops = func.loop_analysis();
		assert_eq!(loops.len(), 3);
		for l in loops.iter() {
			assert_eq!(l.level, 1);
			assert!(l.preheader.is_some());
			assert_eq!(l.single_exiting(), Some(l.header));
			assert!(l.single_exit().is_some());
			assert_eq!(l.latches.len(), 1);
		}
	}

	#[test]
	fn test_loops_of_nested() {
		let program = nested(3, 4);
		let func = &program.funcs[0];
		let loops = func.loop_analysis();
		// the nest plus the checksum loop
		assert_eq!(loops.len(), 3);
		let inner = loops.iter().find(|l| l.level == 2).unwrap();
		let outer = &loops[inner.outer.unwrap()];
		assert_eq!(outer.level, 1);
		assert_eq!(outer.subloops, vec![inner.id]);
		assert!(outer.blocks.is_superset(&inner.blocks));
		assert!(inner.preheader.is_some());
		// outermost first
		assert!(loops.iter().position(|l| l.id == outer.id).unwrap() < inner.id);
	}
}
