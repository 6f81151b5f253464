//! Decoupled software pipelining: every stage of a partition becomes a
//! function running the whole iteration space, and values crossing stages
//! travel through queues.

mod queue;
mod stage;

use std::collections::{BTreeSet, HashMap};

use llvm::TempManager;
use log::debug;
use rrvm::{dominator::DomTree, InstrId, LlvmFunc};
use utils::{errors::Result, RrvmError};

use super::{
	not_applicable, Dispatch, LoopDependenceInfo, ParallelPlan,
	ParallelizationScheme,
};
use crate::sccdag_attrs::{Partition, PartitionHints};

pub use queue::QueueInfo;
pub use stage::{StageBuilder, StageInfo};

#[derive(Clone, Debug, Default)]
pub struct Dswp {
	pub hints: PartitionHints,
}

impl Dswp {
	pub fn new(hints: PartitionHints) -> Self {
		Self { hints }
	}

	pub fn partition(&self, ldi: &LoopDependenceInfo) -> Result<Partition> {
		Partition::new(&ldi.dag, &ldi.attrs, &self.hints)
	}

	/// Splits the loop along `partition` and lists the queues the stages
	/// talk through, ordered by producing stage.
	pub fn stages(
		&self,
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		partition: &Partition,
	) -> Result<(Vec<StageInfo>, Vec<QueueInfo>)> {
		let graph = &ldi.dag.graph;
		let mut owner: HashMap<InstrId, usize> = HashMap::new();
		let mut owned = vec![BTreeSet::new(); partition.len()];
		for (index, sccs) in partition.stages.iter().enumerate() {
			for &scc in sccs.iter() {
				for id in ldi.dag.scc(scc).nodes.iter().filter_map(|&n| graph.value(n).instr()) {
					owner.insert(id, index);
					owned[index].insert(id);
				}
			}
		}
		// removable values leaving the loop are kept by the last stage
		let def_map = func.def_map();
		if let Some(last) = owned.last_mut() {
			for temp in ldi.env.live_outs.iter() {
				match def_map.get(temp) {
					Some(id) if !owner.contains_key(id) => {
						last.insert(*id);
					}
					_ => {}
				}
			}
		}

		let stages: Vec<StageInfo> = owned
			.into_iter()
			.enumerate()
			.map(|(index, owned)| {
				let mut stage = StageInfo::collect(func, ldi, index, owned, &owner);
				stage.name = format!("{}.stage{}.{}", func.name, index, ldi.loop_.header);
				stage
			})
			.collect();

		let mut queues = Vec::new();
		for stage in stages.iter() {
			for &producer in stage.pops.iter().chain(stage.tokens.iter()) {
				let Some(&from) = owner.get(&producer) else {
					continue;
				};
				if from >= stage.index {
					return Err(RrvmError::PartitionError(format!(
						"stage {} waits for `{}` of stage {}",
						stage.index,
						func.instr(producer),
						from
					)));
				}
				let value = match stage.pops.contains(&producer) {
					true => func.instr(producer).get_write(),
					false => None,
				};
				queues.push(QueueInfo {
					producer,
					from_stage: from,
					to_stage: stage.index,
					value,
				});
			}
		}
		queues.sort_by_key(|q| (q.from_stage, q.producer, q.to_stage));
		Ok((stages, queues))
	}
}

impl ParallelizationScheme for Dswp {
	fn name(&self) -> &'static str {
		"dswp"
	}

	fn can_apply(&self, func: &LlvmFunc, ldi: &LoopDependenceInfo) -> Result<()> {
		let loop_ = &ldi.loop_;
		if loop_.preheader.is_none() {
			return Err(not_applicable("loop has no preheader"));
		}
		if loop_.single_exit().is_none() || loop_.single_exiting().is_none() {
			return Err(not_applicable("loop has several exits"));
		}
		if !loop_.no_inner() {
			return Err(not_applicable("loop has inner loops"));
		}
		let partition = self.partition(ldi)?;
		if partition.len() < 2 {
			return Err(not_applicable(format!(
				"{} stage(s) in the partition",
				partition.len()
			)));
		}
		self.stages(func, ldi, &partition)?;
		debug!(
			"{}: loop at block {} pipelines in {} stages",
			func.name,
			loop_.header,
			partition.len()
		);
		Ok(())
	}

	fn generate(
		&self,
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		temp_mgr: &mut TempManager,
	) -> Result<ParallelPlan> {
		let loop_ = &ldi.loop_;
		let preheader = loop_
			.preheader
			.ok_or_else(|| not_applicable("loop has no preheader"))?;
		let exit = loop_
			.single_exit()
			.ok_or_else(|| not_applicable("loop has several exits"))?;
		let partition = self.partition(ldi)?;
		let (stages, queues) = self.stages(func, ldi, &partition)?;
		let post_dom = DomTree::new(func, true);
		let builder = StageBuilder {
			func,
			ldi,
			post_dom: &post_dom,
			queues: &queues,
		};
		let funcs: Vec<LlvmFunc> =
			stages.iter().map(|stage| builder.build(stage, temp_mgr)).collect();
		for stage in stages.iter() {
			debug!(
				"{}: {} instructions, {} pops, {} tokens",
				stage.name,
				stage.needed.len(),
				stage.pops.len(),
				stage.tokens.len()
			);
		}
		Ok(ParallelPlan {
			preheader,
			header: loop_.header,
			exit,
			loop_blocks: loop_.blocks.clone(),
			env: ldi.env.clone(),
			dispatch: Dispatch::Pipeline {
				stages: stages.iter().map(|s| s.name.clone()).collect(),
				queue_widths: queues.iter().map(QueueInfo::width).collect(),
			},
			funcs,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parallel::loop_dependence::loop_info;
	use llvm::{LlvmInstr, StoreInstr};
	use rrvm::samples::*;

	fn calls_to<'a>(func: &'a LlvmFunc, callee: &'a str) -> impl Iterator<Item = InstrId> + 'a {
		func.all_instrs().into_iter().filter(move |&id| {
			matches!(func.instr(id), LlvmInstr::CallInstr(call) if call.func.name == callee)
		})
	}

	#[test]
	fn test_sum_squares_pipeline() {
		let program = sum_squares(10);
		let func = &program.funcs[0];
		let ldi = loop_info(func, 1, false);
		let dswp = Dswp::default();
		dswp.can_apply(func, &ldi).unwrap();
		let partition = dswp.partition(&ldi).unwrap();
		let (stages, queues) = dswp.stages(func, &ldi, &partition).unwrap();
		assert_eq!(stages.len(), partition.len());
		assert!(queues.iter().all(|q| q.from_stage < q.to_stage));
		assert!(queues.iter().all(|q| q.width() == 32));
		// the exit branch is in every stage
		let branch = func.block(ldi.loop_.header).jump_instr.unwrap();
		assert!(stages.iter().all(|s| s.needed.contains(&branch)));
		let owners: Vec<_> = stages.iter().filter(|s| !s.live_outs.is_empty()).collect();
		assert_eq!(owners.len(), 1);
		assert_eq!(owners[0].live_outs[0].name, "s");

		let mut temp_mgr = program.temp_mgr.clone();
		let plan = dswp.generate(func, &ldi, &mut temp_mgr).unwrap();
		assert_eq!(plan.funcs.len(), stages.len());
		for stage in plan.funcs.iter() {
			assert_eq!(stage.params.len(), 2);
			assert_eq!(stage.blocks.len(), ldi.loop_.blocks.len() + 2);
		}
		let storing = plan
			.funcs
			.iter()
			.filter(|f| {
				f.all_instrs()
					.into_iter()
					.any(|id| matches!(f.instr(id), LlvmInstr::StoreInstr(StoreInstr { .. })))
			})
			.count();
		assert_eq!(storing, 1);
		let Dispatch::Pipeline { queue_widths, .. } = plan.dispatch else {
			panic!("pipeline dispatch expected");
		};
		assert_eq!(queue_widths.len(), queues.len());
	}

	#[test]
	fn test_output_stays_in_one_stage() {
		let program = pipeline_io(5);
		let func = &program.funcs[0];
		let ldi = loop_info(func, 1, false);
		let mut temp_mgr = program.temp_mgr.clone();
		let plan = Dswp::default().generate(func, &ldi, &mut temp_mgr).unwrap();
		let printing = plan.funcs.iter().filter(|f| calls_to(f, "putint").count() > 0).count();
		assert_eq!(printing, 1);
		let pushes: usize = plan.funcs.iter().map(|f| calls_to(f, "queue_push32").count()).sum();
		let pops: usize = plan.funcs.iter().map(|f| calls_to(f, "queue_pop32").count()).sum();
		assert_eq!(pushes, pops);
	}

	#[test]
	fn test_rejections() {
		let program = sum_squares(10);
		let func = &program.funcs[0];
		let ldi = loop_info(func, 1, false);
		let hints: PartitionHints = func.all_instrs().into_iter().map(|id| (id, 0)).collect();
		let err = Dswp::new(hints).can_apply(func, &ldi).unwrap_err();
		assert!(matches!(err, RrvmError::NotApplicable(_)));

		let program = nested(4, 3);
		let ldi = loop_info(&program.funcs[0], 0, false);
		let err = Dswp::default().can_apply(&program.funcs[0], &ldi).unwrap_err();
		assert!(err.to_string().contains("inner"));
	}
}
