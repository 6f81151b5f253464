use std::collections::BTreeSet;

use llvm::TempManager;
use log::{debug, info, warn};
use rrvm::{dominator::DomTree, program::LlvmProgram, LlvmFunc};
use utils::errors::Result;

use crate::{
	config::ParallelizerConfig,
	oracle::{BasicAliasAnalysis, RecurrenceSolver},
	parallel::{LoopDependenceInfo, ParallelPlan, ParallelizationScheme},
	pdg::PdgBuilder,
	sccdag_attrs::DefaultCostModel,
	RrvmOptimizer,
};

pub struct Parallelizer {
	config: ParallelizerConfig,
}

impl Parallelizer {
	pub fn with_config(config: ParallelizerConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &ParallelizerConfig {
		&self.config
	}

	/// Builds the dependence information of every loop of `func` in turn,
	/// outermost first, and hands each to the first scheme accepting it.
	/// Returns the generated functions.
	fn parallelize_func(
		&self,
		func: &mut LlvmFunc,
		temp_mgr: &mut TempManager,
		schemes: &[Box<dyn ParallelizationScheme>],
	) -> Vec<LlvmFunc> {
		let mut tried = BTreeSet::new();
		let mut generated = Vec::new();
		// loop ids change once a loop is removed, headers do not
		while let Some(loop_) =
			func.loop_analysis().into_iter().find(|l| !tried.contains(&l.header))
		{
			tried.insert(loop_.header);
			let header = loop_.header;
			let oracle =
				BasicAliasAnalysis::new(func, self.config.assume_noalias_params);
			let post_dom = DomTree::new(func, true);
			let pdg = PdgBuilder::new(func, &oracle, &oracle, &post_dom).build();
			let ldi = LoopDependenceInfo::new(
				func,
				loop_,
				&pdg,
				&RecurrenceSolver,
				&DefaultCostModel,
			);
			if ldi.cost() < self.config.min_loop_cost {
				debug!(
					"{}: loop at block {} costs {}, skipped",
					func.name,
					header,
					ldi.cost()
				);
				continue;
			}
			if let Some(plan) = Self::plan(func, &ldi, temp_mgr, schemes) {
				generated.extend(plan.commit(func, temp_mgr));
			}
		}
		generated
	}

	fn plan(
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		temp_mgr: &mut TempManager,
		schemes: &[Box<dyn ParallelizationScheme>],
	) -> Option<ParallelPlan> {
		let header = ldi.loop_.header;
		for scheme in schemes.iter() {
			if let Err(err) = scheme.can_apply(func, ldi) {
				warn!(
					"{}: loop at block {} rejected by {}: {}",
					func.name,
					header,
					scheme.name(),
					err
				);
				continue;
			}
			match scheme.generate(func, ldi, temp_mgr) {
				Ok(plan) => {
					info!("{}: loop at block {} takes {}", func.name, header, scheme.name());
					return Some(plan);
				}
				Err(err) => warn!(
					"{}: {} failed on loop at block {}: {}",
					func.name,
					scheme.name(),
					header,
					err
				),
			}
		}
		None
	}
}

impl RrvmOptimizer for Parallelizer {
	fn new() -> Self {
		Self::with_config(ParallelizerConfig::default())
	}

	fn apply(self, program: &mut LlvmProgram) -> Result<bool> {
		let schemes = self.config.build_schemes();
		let mut generated = Vec::new();
		// generated functions are appended afterwards and never revisited
		for func in program.funcs.iter_mut() {
			generated.extend(self.parallelize_func(
				func,
				&mut program.temp_mgr,
				&schemes,
			));
		}
		let changed = !generated.is_empty();
		program.funcs.extend(generated);
		Ok(changed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::SchemeKind;
	use rrvm::samples::*;

	fn names(program: &LlvmProgram) -> Vec<String> {
		program.funcs.iter().map(|f| f.name.clone()).collect()
	}

	#[test]
	fn test_array_scale() {
		let mut program = array_scale(16);
		let loops = program.funcs[0].loop_analysis().len();
		assert!(Parallelizer::new().apply(&mut program).unwrap());
		let names = names(&program);
		assert_eq!(names.iter().filter(|n| n.contains(".doall.")).count(), 2);
		// the reduction goes to a pipeline
		assert!(names.iter().any(|n| n.contains(".stage0.")));
		assert!(program.funcs[0].loop_analysis().len() < loops);
	}

	#[test]
	fn test_single_scheme() {
		let mut program = sum_squares(10);
		let config = ParallelizerConfig::default().only(SchemeKind::Doall);
		assert!(Parallelizer::with_config(config).apply(&mut program).unwrap());
		// only the fill loop goes, the reduction stays sequential
		assert_eq!(program.funcs.len(), 2);
		assert!(program.funcs[1].name.contains(".doall."));
		assert_eq!(program.funcs[0].loop_analysis().len(), 1);
	}

	#[test]
	fn test_min_loop_cost() {
		let mut program = countdown(10);
		let config = ParallelizerConfig {
			min_loop_cost: usize::MAX,
			..Default::default()
		};
		assert!(!Parallelizer::with_config(config).apply(&mut program).unwrap());
	}
}
