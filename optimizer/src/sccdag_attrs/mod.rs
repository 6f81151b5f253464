mod partition;

use std::collections::{BTreeMap, BTreeSet};

use llvm::{BlockId, LlvmInstr};
use rrvm::LlvmFunc;
use utils::CALL_INSTR_CNT;

use crate::sccdag::{SccDag, SccId};

pub use partition::{Partition, PartitionHints};

pub trait CostModel {
	fn instr_cost(&self, instr: &LlvmInstr) -> usize;
}

/// Calls weigh as much as a block of plain instructions.
#[derive(Default, Clone, Copy)]
pub struct DefaultCostModel;

impl CostModel for DefaultCostModel {
	fn instr_cost(&self, instr: &LlvmInstr) -> usize {
		match instr {
			LlvmInstr::CallInstr(_) => CALL_INSTR_CNT,
			_ => 1,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct SccInfo {
	pub cost: usize,
	pub loop_carried: bool,
	pub removable: bool,
	// blocks holding the instructions of the SCC
	pub blocks: BTreeSet<BlockId>,
}

pub struct SccAttrs {
	pub info: BTreeMap<SccId, SccInfo>,
	induction: BTreeSet<SccId>,
}

impl SccAttrs {
	pub fn new(func: &LlvmFunc, dag: &SccDag, cost_model: &dyn CostModel) -> Self {
		let block_of = func.instr_block_map();
		let mut info = BTreeMap::new();
		for id in dag.internal_sccs() {
			let scc = dag.scc(id);
			let instrs: Vec<_> = scc
				.nodes
				.iter()
				.filter_map(|&n| dag.graph.value(n).instr())
				.collect();
			let self_edge = scc
				.nodes
				.iter()
				.any(|&n| dag.graph.outgoing(n).any(|e| e.to == n));
			let loop_carried = scc.nodes.len() > 1 || self_edge;
			let removable = !loop_carried
				&& matches!(
					instrs.as_slice(),
					[single] if matches!(
						func.instr(*single),
						LlvmInstr::GEPInstr(_)
							| LlvmInstr::ConvertInstr(_)
							| LlvmInstr::CompInstr(_)
							| LlvmInstr::JumpInstr(_)
					)
				);
			info.insert(
				id,
				SccInfo {
					cost: instrs.iter().map(|&i| cost_model.instr_cost(func.instr(i))).sum(),
					loop_carried,
					removable,
					blocks: instrs.iter().filter_map(|i| block_of.get(i).copied()).collect(),
				},
			);
		}
		Self {
			info,
			induction: BTreeSet::new(),
		}
	}

	pub fn cost(&self, id: SccId) -> usize {
		self.info.get(&id).map_or(0, |i| i.cost)
	}

	pub fn is_loop_carried(&self, id: SccId) -> bool {
		self.info.get(&id).map_or(false, |i| i.loop_carried)
	}

	pub fn is_removable(&self, id: SccId) -> bool {
		self.info.get(&id).map_or(false, |i| i.removable)
	}

	pub fn blocks(&self, id: SccId) -> Option<&BTreeSet<BlockId>> {
		self.info.get(&id).map(|i| &i.blocks)
	}

	pub fn loop_carried_sccs(&self) -> Vec<SccId> {
		self
			.info
			.iter()
			.filter(|(_, i)| i.loop_carried)
			.map(|(&id, _)| id)
			.collect()
	}

	pub fn mark_induction(&mut self, id: SccId) {
		self.induction.insert(id);
	}

	pub fn is_induction_scc(&self, id: SccId) -> bool {
		self.induction.contains(&id)
	}

	pub fn subset_cost<'a>(&self, ids: impl IntoIterator<Item = &'a SccId>) -> usize {
		ids.into_iter().map(|&id| self.cost(id)).sum()
	}

	pub fn total_cost(&self) -> usize {
		self.info.values().map(|i| i.cost).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		oracle::BasicAliasAnalysis,
		pdg::{PdgBuilder, PdgValue},
	};
	use rrvm::{dominator::DomTree, samples::*};

	fn attrs_of(name: &str) -> Vec<(String, SccInfo)> {
		let program = sum_squares(8);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let post_dom = DomTree::new(func, true);
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		let dag = SccDag::new(graph.loop_subgraph(func, &loops[1].blocks));
		let attrs = SccAttrs::new(func, &dag, &DefaultCostModel);
		dag
			.internal_sccs()
			.filter(|&id| {
				dag.scc(id).nodes.iter().any(|&n| {
					let id = dag.graph.value(n).instr().unwrap();
					func.instr(id).get_write().map_or(false, |t| t.name == name)
				})
			})
			.map(|id| (name.to_string(), attrs.info[&id].clone()))
			.collect()
	}

	#[test]
	fn test_sum_squares_attributes() {
		let [(_, iv)] = attrs_of("i").try_into().unwrap();
		assert!(iv.loop_carried && !iv.removable);
		let [(_, sum)] = attrs_of("s").try_into().unwrap();
		assert!(sum.loop_carried);
		assert_eq!(sum.cost, 2);
		let [(_, gep)] = attrs_of("p").try_into().unwrap();
		assert!(gep.removable && !gep.loop_carried);
		let [(_, square)] = attrs_of("sq").try_into().unwrap();
		assert!(!square.removable && !square.loop_carried);
		assert_eq!(square.blocks.len(), 1);
	}

	#[test]
	fn test_lone_jump_is_removable() {
		let program = sum_squares(8);
		let func = &program.funcs[0];
		let oracle = BasicAliasAnalysis::new(func, false);
		let post_dom = DomTree::new(func, true);
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		let dag = SccDag::new(graph.loop_subgraph(func, &loops[1].blocks));
		let attrs = SccAttrs::new(func, &dag, &DefaultCostModel);
		let latch = func.block(loops[1].latches[0]).jump_instr.unwrap();
		let id = dag.scc_of_value(&PdgValue::Instr(latch)).unwrap();
		assert!(attrs.is_removable(id));
		// the exit branch decides the loop and stays staged
		let branch = func.block(loops[1].header).jump_instr.unwrap();
		let id = dag.scc_of_value(&PdgValue::Instr(branch)).unwrap();
		assert!(!attrs.is_removable(id));
	}

	#[test]
	fn test_call_cost() {
		let program = pipeline_io(4);
		let func = &program.funcs[0];
		let call = func
			.all_instrs()
			.into_iter()
			.find(|&id| matches!(func.instr(id), LlvmInstr::CallInstr(_)))
			.unwrap();
		assert_eq!(DefaultCostModel.instr_cost(func.instr(call)), CALL_INSTR_CNT);
	}
}
