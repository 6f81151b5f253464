use std::collections::{BTreeSet, HashMap, HashSet};

use llvm::{BlockId, Temp, Value};

use crate::func::{InstrId, LlvmFunc};

impl LlvmFunc {
	/// Recomputes `prev`/`succ` of every block from the terminators.
	pub fn rebuild_edges(&mut self) {
		let succs: Vec<(BlockId, Vec<BlockId>)> = self
			.blocks
			.keys()
			.map(|&id| {
				let mut succ = self.terminator(id).map_or(Vec::new(), |t| t.get_label());
				succ.dedup();
				(id, succ)
			})
			.collect();
		self.blocks.values_mut().for_each(|bb| bb.clear());
		for (id, succ) in succs {
			for s in succ.iter() {
				if let Some(bb) = self.blocks.get_mut(s) {
					bb.prev.push(id);
				}
			}
			self.block_mut(id).succ = succ;
		}
	}
	pub fn successors(&self, block: BlockId) -> &[BlockId] {
		&self.block(block).succ
	}
	pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
		&self.block(block).prev
	}
	/// Blocks ending in a return.
	pub fn exit_blocks(&self) -> Vec<BlockId> {
		self
			.blocks
			.keys()
			.copied()
			.filter(|&id| self.terminator(id).map_or(false, |t| t.is_ret()))
			.collect()
	}
	pub fn reachable(&self) -> HashSet<BlockId> {
		let mut visited = HashSet::new();
		let mut stack = vec![self.entry()];
		while let Some(bb) = stack.pop() {
			if visited.insert(bb) {
				stack.extend(self.successors(bb).iter().copied());
			}
		}
		visited
	}
	pub fn reverse_post_order(&self) -> Vec<BlockId> {
		fn dfs(
			func: &LlvmFunc,
			bb: BlockId,
			visited: &mut HashSet<BlockId>,
			order: &mut Vec<BlockId>,
		) {
			if !visited.insert(bb) {
				return;
			}
			for &succ in func.successors(bb) {
				dfs(func, succ, visited, order);
			}
			order.push(bb);
		}
		let mut visited = HashSet::new();
		let mut order = Vec::new();
		dfs(self, self.entry(), &mut visited, &mut order);
		order.reverse();
		order
	}
	/// Drops the blocks; their instructions stay in the arena unreferenced.
	pub fn remove_blocks(&mut self, blocks: &BTreeSet<BlockId>) {
		self.blocks.retain(|id, _| !blocks.contains(id));
		self.rebuild_edges();
	}
	/// Redirects the terminator of `block` from `from` to `to`.
	pub fn retarget(&mut self, block: BlockId, from: BlockId, to: BlockId) {
		if let Some(id) = self.block(block).jump_instr {
			self
				.instr_mut(id)
				.map_label(&mut |b| if b == from { to } else { b });
		}
	}
	/// Rewrites every use of the mapped temps inside `blocks`.
	pub fn replace_uses_in(
		&mut self,
		blocks: &[BlockId],
		map: &HashMap<Temp, Value>,
	) {
		let ids: Vec<InstrId> =
			blocks.iter().flat_map(|&bb| self.block(bb).instr_ids()).collect();
		for id in ids {
			self.instr_mut(id).map_temp(&mut |t| map.get(t).cloned());
		}
	}
}
