use log::debug;
use rrvm::{rrvm_loop::Loop, LlvmFunc};

use super::EnvInfo;
use crate::{
	indvar::InductionVariables,
	oracle::ClosedFormOracle,
	pdg::DependenceGraph,
	sccdag::SccDag,
	sccdag_attrs::{CostModel, SccAttrs},
};

/// Everything a scheme needs to know about one loop.
pub struct LoopDependenceInfo {
	pub loop_: Loop,
	pub dag: SccDag,
	pub attrs: SccAttrs,
	pub ivs: InductionVariables,
	pub env: EnvInfo,
}

impl LoopDependenceInfo {
	/// `pdg` is the graph of the whole function.
	pub fn new(
		func: &LlvmFunc,
		loop_: Loop,
		pdg: &DependenceGraph,
		closed_form: &dyn ClosedFormOracle,
		cost_model: &dyn CostModel,
	) -> Self {
		let dag = SccDag::new(pdg.loop_subgraph(func, &loop_.blocks));
		let mut attrs = SccAttrs::new(func, &dag, cost_model);
		let ivs = InductionVariables::analyze(func, &loop_, &dag, closed_form);
		for iv in ivs.ivs.iter() {
			attrs.mark_induction(iv.scc);
		}
		let env = EnvInfo::new(func, &dag);
		debug!(
			"{}: loop at block {}: {} sccs, {} live-ins, {} live-outs",
			func.name,
			loop_.header,
			dag.internal_sccs().count(),
			env.live_ins.len(),
			env.live_outs.len()
		);
		Self {
			loop_,
			dag,
			attrs,
			ivs,
			env,
		}
	}

	pub fn cost(&self) -> usize {
		self.attrs.total_cost()
	}
}

#[cfg(test)]
pub(crate) fn loop_info(
	func: &LlvmFunc,
	index: usize,
	assume_noalias_params: bool,
) -> LoopDependenceInfo {
	use crate::{
		oracle::{BasicAliasAnalysis, RecurrenceSolver},
		pdg::PdgBuilder,
		sccdag_attrs::DefaultCostModel,
	};
	use rrvm::dominator::DomTree;

	let oracle = BasicAliasAnalysis::new(func, assume_noalias_params);
	let post_dom = DomTree::new(func, true);
	let pdg = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
	let loop_ = func.loop_analysis().swap_remove(index);
	LoopDependenceInfo::new(func, loop_, &pdg, &RecurrenceSolver, &DefaultCostModel)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rrvm::samples::*;

	#[test]
	fn test_induction_sccs_are_marked() {
		let program = sum_squares(10);
		let ldi = loop_info(&program.funcs[0], 1, false);
		assert_eq!(ldi.ivs.ivs.len(), 1);
		let iv_scc = ldi.ivs.ivs[0].scc;
		assert!(ldi.attrs.is_induction_scc(iv_scc));
		let carried = ldi.attrs.loop_carried_sccs();
		assert_eq!(carried.len(), 2);
		assert_eq!(
			carried.iter().filter(|&&id| ldi.attrs.is_induction_scc(id)).count(),
			1
		);
		assert!(ldi.cost() > 0);
	}
}
