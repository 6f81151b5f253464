//! Induction variables of a loop: header phis with an additive closed form,
//! and the one among them governing the loop exit.

pub mod governing;
pub mod predicate;
mod step;

use std::collections::{BTreeSet, HashMap, VecDeque};

use llvm::{BlockId, LlvmInstr, Temp, TempManager, Value};
use log::{debug, trace};
use rrvm::{rrvm_loop::Loop, InstrId, LlvmFunc};

use crate::{
	oracle::{ClosedFormOracle, RecurrenceKind},
	sccdag::{SccDag, SccId},
};

pub use governing::LoopGoverningAttribution;
pub use predicate::*;
pub use step::{Expansion, StepKind};

#[derive(Clone, Debug)]
pub struct InductionVariable {
	pub phi: InstrId,
	pub target: Temp,
	pub scc: SccId,
	// phis of the recurrence, the header phi included
	pub iv_phis: BTreeSet<InstrId>,
	pub accumulators: BTreeSet<InstrId>,
	pub start: Value,
	pub step: StepKind,
}

impl InductionVariable {
	pub fn members(&self) -> impl Iterator<Item = InstrId> + '_ {
		self.iv_phis.iter().chain(self.accumulators.iter()).copied()
	}

	pub fn contains(&self, id: InstrId) -> bool {
		self.iv_phis.contains(&id) || self.accumulators.contains(&id)
	}

	pub fn constant_step(&self) -> Option<i32> {
		self.step.as_constant()
	}

	/// Instructions computing a composite step, not yet placed anywhere.
	pub fn step_expansion(
		&self,
		temp_mgr: &mut TempManager,
	) -> Option<Expansion> {
		match &self.step {
			StepKind::Composite(expr) => Some(Expansion::new(expr, temp_mgr)),
			_ => None,
		}
	}

	/// The step as a value usable at the end of `block`, composed there
	/// first when it is composite.
	pub fn emit_step(
		&self,
		func: &mut LlvmFunc,
		block: BlockId,
		temp_mgr: &mut TempManager,
	) -> Value {
		match self.step_expansion(temp_mgr) {
			Some(expansion) => expansion.materialize(func, block, &HashMap::new()),
			None => self.step.simple_value().unwrap_or(Value::Int(0)),
		}
	}
}

/// Whether `temp` keeps its value through every iteration of `loop_`.
pub fn is_loop_invariant(
	func: &LlvmFunc,
	loop_: &Loop,
	def_map: &HashMap<Temp, InstrId>,
	block_of: &HashMap<InstrId, BlockId>,
	temp: &Temp,
) -> bool {
	temp.is_global
		|| func.is_param(temp)
		|| def_map
			.get(temp)
			.and_then(|id| block_of.get(id))
			.map_or(false, |b| !loop_.contains(*b))
}

pub fn is_value_invariant(
	func: &LlvmFunc,
	loop_: &Loop,
	def_map: &HashMap<Temp, InstrId>,
	block_of: &HashMap<InstrId, BlockId>,
	value: &Value,
) -> bool {
	value
		.as_temp()
		.map_or(true, |t| is_loop_invariant(func, loop_, def_map, block_of, t))
}

#[derive(Clone, Debug, Default)]
pub struct InductionVariables {
	pub ivs: Vec<InductionVariable>,
	pub governing: Option<LoopGoverningAttribution>,
}

impl InductionVariables {
	pub fn analyze(
		func: &LlvmFunc,
		loop_: &Loop,
		dag: &SccDag,
		oracle: &dyn ClosedFormOracle,
	) -> Self {
		let def_map = func.def_map();
		let block_of = func.instr_block_map();
		let mut result = Self::default();
		for &phi in func.block(loop_.header).phi_instrs.iter() {
			let Some(recurrence) = oracle.recurrence(func, phi, loop_) else {
				continue;
			};
			if recurrence.kind != RecurrenceKind::Additive {
				continue;
			}
			let Some(scc) = dag
				.graph
				.node_of_instr(phi)
				.and_then(|node| dag.scc_of(node))
			else {
				continue;
			};
			let step = StepKind::classify(recurrence.step, |t| {
				is_loop_invariant(func, loop_, &def_map, &block_of, t)
			});
			let Some(step) = step else {
				trace!("{}: step of {} varies in the loop", func.name, phi);
				continue;
			};
			let (iv_phis, accumulators) = Self::members(func, dag, scc, phi);
			let target = match func.instr(phi) {
				LlvmInstr::PhiInstr(p) => p.target.clone(),
				_ => continue,
			};
			result.ivs.push(InductionVariable {
				phi,
				target,
				scc,
				iv_phis,
				accumulators,
				start: recurrence.start,
				step,
			});
		}

		let mut fallback = None;
		for (index, iv) in result.ivs.iter().enumerate() {
			let Some(attribution) = LoopGoverningAttribution::attribute(
				func, loop_, dag, &def_map, iv, index,
			) else {
				continue;
			};
			if attribution.well_formed {
				result.governing = Some(attribution);
				break;
			}
			fallback.get_or_insert(attribution);
		}
		if result.governing.is_none() {
			result.governing = fallback;
		}
		debug!(
			"{}: loop at block {} has {} induction variables, governing {:?}",
			func.name,
			loop_.header,
			result.ivs.len(),
			result.governing.as_ref().map(|g| g.iv)
		);
		result
	}

	/// Breadth first over the data edges reaching the phi from inside its
	/// SCC.
	fn members(
		func: &LlvmFunc,
		dag: &SccDag,
		scc: SccId,
		phi: InstrId,
	) -> (BTreeSet<InstrId>, BTreeSet<InstrId>) {
		let nodes = &dag.scc(scc).nodes;
		let mut iv_phis = BTreeSet::new();
		let mut accumulators = BTreeSet::new();
		let mut seen = BTreeSet::new();
		let mut queue: VecDeque<_> =
			dag.graph.node_of_instr(phi).into_iter().collect();
		while let Some(node) = queue.pop_front() {
			if !seen.insert(node) {
				continue;
			}
			if let Some(id) = dag.graph.value(node).instr() {
				if func.instr(id).is_phi() {
					iv_phis.insert(id);
				} else {
					accumulators.insert(id);
				}
			}
			queue.extend(
				dag
					.graph
					.incoming(node)
					.filter(|e| e.is_data() && nodes.contains(&e.from))
					.map(|e| e.from),
			);
		}
		(iv_phis, accumulators)
	}

	pub fn iv_of_phi(&self, phi: InstrId) -> Option<&InductionVariable> {
		self.ivs.iter().find(|iv| iv.phi == phi)
	}

	pub fn is_iv_scc(&self, scc: SccId) -> bool {
		self.ivs.iter().any(|iv| iv.scc == scc)
	}

	/// The governing variable, when its attribution is well formed.
	pub fn governing_iv(
		&self,
	) -> Option<(&InductionVariable, &LoopGoverningAttribution)> {
		let governing = self.governing.as_ref().filter(|g| g.well_formed)?;
		Some((&self.ivs[governing.iv], governing))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		oracle::{BasicAliasAnalysis, RecurrenceSolver},
		pdg::PdgBuilder,
	};
	use llvm::{ArithOp, CompOp, VarType};
	use rrvm::{dominator::DomTree, samples::*, LlvmGen, LlvmProgram};

	fn analyze(func: &LlvmFunc, index: usize) -> InductionVariables {
		let oracle = BasicAliasAnalysis::new(func, false);
		let post_dom = DomTree::new(func, true);
		let graph = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
		let loops = func.loop_analysis();
		let dag = SccDag::new(graph.loop_subgraph(func, &loops[index].blocks));
		InductionVariables::analyze(func, &loops[index], &dag, &RecurrenceSolver)
	}

	fn named<'a>(
		ivs: &'a InductionVariables,
		name: &str,
	) -> &'a InductionVariable {
		ivs.ivs.iter().find(|iv| iv.target.name == name).unwrap()
	}

	#[test]
	fn test_counting_loop() {
		let program = array_scale(100);
		let func = &program.funcs[0];
		let ivs = analyze(func, 1);
		assert_eq!(ivs.ivs.len(), 1);
		let (iv, governing) = ivs.governing_iv().unwrap();
		assert_eq!(iv.target.name, "i");
		assert_eq!(iv.start, Value::Int(0));
		assert_eq!(iv.step, StepKind::Constant(1));
		assert_eq!(iv.iv_phis.len(), 1);
		assert_eq!(iv.accumulators.len(), 1);
		assert_eq!(governing.bound, Value::Int(100));
		assert!(governing.iv_on_left && !governing.exit_on_true);
		assert!(governing.derivation.is_empty());
		assert_eq!(governing.exit_predicate(1).unwrap(), CompOp::SGE);
		assert_eq!(governing.continue_predicate(1).unwrap(), CompOp::SLT);
	}

	#[test]
	fn test_countdown() {
		let program = countdown(10);
		let ivs = analyze(&program.funcs[0], 0);
		let (iv, governing) = ivs.governing_iv().unwrap();
		assert_eq!(iv.start, Value::Int(9));
		assert_eq!(iv.constant_step(), Some(-1));
		assert_eq!(governing.exit_predicate(-1).unwrap(), CompOp::SLT);
	}

	#[test]
	fn test_equality_exit_widens() {
		let program = eq_exit(10);
		let ivs = analyze(&program.funcs[0], 0);
		let (_, governing) = ivs.governing_iv().unwrap();
		assert!(governing.exit_on_true);
		assert_eq!(governing.exit_predicate(1).unwrap(), CompOp::SGE);
	}

	#[test]
	fn test_composite_step() {
		let program = dual_iv(10, 3, 4);
		let func = program.get_func("dual").unwrap();
		let ivs = analyze(func, 0);
		assert_eq!(ivs.ivs.len(), 2);
		let j = named(&ivs, "j");
		assert!(matches!(j.step, StepKind::Composite(_)));
		assert_eq!(j.accumulators.len(), 2);
		let (governing, _) = ivs.governing_iv().unwrap();
		assert_eq!(governing.target.name, "i");

		let mut mgr = TempManager::new();
		let expansion = j.step_expansion(&mut mgr).unwrap();
		assert_eq!(expansion.instrs.len(), 1);
		assert!(named(&ivs, "i").step_expansion(&mut mgr).is_none());
	}

	#[test]
	fn test_reduction_is_not_an_iv() {
		let program = sum_squares(10);
		let func = &program.funcs[0];
		let ivs = analyze(func, 1);
		assert_eq!(ivs.ivs.len(), 1);
		assert_eq!(ivs.ivs[0].target.name, "i");
		assert!(ivs.governing_iv().is_some());
	}

	#[test]
	fn test_circular_bound_is_not_well_formed() {
		// for (i = 1; i < i * 2 - 7; i++)
		let mut temp_mgr = TempManager::new();
		let mut func = LlvmFunc::new("f", VarType::Void, vec![]);
		let mut gen = LlvmGen::new(&mut func, &mut temp_mgr, 0);
		let header = gen.new_block();
		let body = gen.new_block();
		let exit = gen.new_block();
		gen.visit_jump_instr(header);
		gen.switch_to(header);
		let (phi, i) =
			gen.named("i").visit_phi_instr(VarType::I32, vec![(1.into(), 0)]);
		let twice = gen.visit_arith_instr(i.clone().into(), ArithOp::Mul, 2.into());
		let bound = gen.visit_arith_instr(twice.into(), ArithOp::Sub, 7.into());
		let cond =
			gen.visit_comp_instr(i.clone().into(), CompOp::SLT, bound.into());
		gen.visit_jump_cond_instr(cond.into(), body, exit);
		gen.switch_to(body);
		let next = gen.visit_arith_instr(i.into(), ArithOp::Add, 1.into());
		gen.visit_jump_instr(header);
		gen.add_incoming(phi, next.into(), body);
		gen.switch_to(exit);
		gen.visit_ret_instr(None);
		gen.visit_end();
		let mut program = LlvmProgram::new(temp_mgr);
		program.funcs.push(func);

		let ivs = analyze(&program.funcs[0], 0);
		assert_eq!(ivs.ivs.len(), 1);
		let governing = ivs.governing.as_ref().unwrap();
		assert!(!governing.well_formed);
		assert!(governing.derivation.contains(&phi));
		assert!(ivs.governing_iv().is_none());
	}
}
