use std::collections::{BTreeSet, HashMap};

use llvm::{BlockId, CompOp, LlvmInstr, Temp, Value};
use rrvm::{rrvm_loop::Loop, InstrId, LlvmFunc};
use utils::errors::Result;

use super::{
	predicate::{normalize_continue_predicate, normalize_exit_predicate},
	InductionVariable,
};
use crate::{pdg::NodeId, sccdag::SccDag};

/// Binds an induction variable to the comparison deciding when the loop
/// leaves.
#[derive(Clone, Debug)]
pub struct LoopGoverningAttribution {
	// position of the governing variable in `InductionVariables::ivs`
	pub iv: usize,
	pub compare: InstrId,
	pub branch: InstrId,
	pub op: CompOp,
	pub exit_block: BlockId,
	pub exit_on_true: bool,
	pub iv_on_left: bool,
	pub bound: Value,
	// instructions of the IV's SCC the bound is computed from
	pub derivation: BTreeSet<InstrId>,
	pub well_formed: bool,
}

impl LoopGoverningAttribution {
	/// Matches the header branch of `loop_` against `iv`. `None` means the
	/// structure does not fit at all; a matching structure whose SCC holds
	/// anything unexpected comes back with `well_formed` unset.
	pub fn attribute(
		func: &LlvmFunc,
		loop_: &Loop,
		dag: &SccDag,
		def_map: &HashMap<Temp, InstrId>,
		iv: &InductionVariable,
		index: usize,
	) -> Option<Self> {
		iv.constant_step()?;
		let branch = func.block(loop_.header).jump_instr?;
		let LlvmInstr::JumpCondInstr(jump) = func.instr(branch) else {
			return None;
		};
		let compare = *def_map.get(jump.cond.as_temp()?)?;
		let LlvmInstr::CompInstr(comp) = func.instr(compare) else {
			return None;
		};
		let (iv_on_left, bound) =
			match (comp.lhs.is_temp(&iv.target), comp.rhs.is_temp(&iv.target)) {
				(true, false) => (true, comp.rhs.clone()),
				(false, true) => (false, comp.lhs.clone()),
				_ => return None,
			};
		let (exit_block, exit_on_true) = match (
			loop_.contains(jump.target_true),
			loop_.contains(jump.target_false),
		) {
			(false, true) => (jump.target_true, true),
			(true, false) => (jump.target_false, false),
			_ => return None,
		};

		let scc = dag.scc(iv.scc);
		let mut derivation = BTreeSet::new();
		let mut stack: Vec<NodeId> = bound
			.as_temp()
			.and_then(|t| def_map.get(t))
			.and_then(|&id| dag.graph.node_of_instr(id))
			.filter(|n| scc.nodes.contains(n))
			.into_iter()
			.collect();
		while let Some(node) = stack.pop() {
			let Some(id) = dag.graph.value(node).instr() else {
				continue;
			};
			if !derivation.insert(id) {
				continue;
			}
			stack.extend(
				dag
					.graph
					.incoming(node)
					.filter(|e| e.is_data() && scc.nodes.contains(&e.from))
					.map(|e| e.from),
			);
		}

		let circular = derivation.iter().any(|&id| iv.contains(id));
		let expected = |id: InstrId| {
			iv.contains(id)
				|| derivation.contains(&id)
				|| id == compare
				|| id == branch
				|| matches!(
					func.instr(id),
					LlvmInstr::GEPInstr(_)
						| LlvmInstr::PhiInstr(_)
						| LlvmInstr::JumpInstr(_)
				)
		};
		let well_formed = !circular
			&& scc
				.nodes
				.iter()
				.filter_map(|&n| dag.graph.value(n).instr())
				.all(expected);

		Some(Self {
			iv: index,
			compare,
			branch,
			op: comp.op,
			exit_block,
			exit_on_true,
			iv_on_left,
			bound,
			derivation,
			well_formed,
		})
	}

	/// Predicate of `iv op bound` that holds once the loop has to leave.
	pub fn exit_predicate(&self, step: i32) -> Result<CompOp> {
		normalize_exit_predicate(
			self.op,
			self.exit_on_true,
			self.iv_on_left,
			step,
		)
	}

	pub fn continue_predicate(&self, step: i32) -> Result<CompOp> {
		normalize_continue_predicate(
			self.op,
			self.exit_on_true,
			self.iv_on_left,
			step,
		)
	}
}
