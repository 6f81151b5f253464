//! Loop parallelization. A scheme checks a loop against its own legality
//! rules, then builds a complete `ParallelPlan` without touching the host
//! function; only `ParallelPlan::commit` rewrites the host.

mod doall;
mod dswp;
mod environment;
mod loop_dependence;

use std::{
	collections::{BTreeSet, HashMap},
	fmt::Display,
};

use llvm::{BlockId, Temp, TempManager, Value, VarType};
use log::info;
use rrvm::{LlvmFunc, LlvmGen};
use utils::{errors::Result, RrvmError, DOALL_DISPATCHER, STAGE_DISPATCHER};

pub use doall::{ChunkerInfo, Doall, FinalValueBlocks};
pub use dswp::{Dswp, QueueInfo, StageInfo};
pub use environment::EnvInfo;
pub use loop_dependence::LoopDependenceInfo;

pub trait ParallelizationScheme {
	fn name(&self) -> &'static str;

	/// `Err` explains why the loop cannot take this scheme.
	fn can_apply(&self, func: &LlvmFunc, ldi: &LoopDependenceInfo) -> Result<()>;

	/// Builds the generated functions and the host rewrite for a loop that
	/// passed `can_apply`. `func` is left untouched.
	fn generate(
		&self,
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		temp_mgr: &mut TempManager,
	) -> Result<ParallelPlan>;
}

pub(crate) fn not_applicable(reason: impl Display) -> RrvmError {
	RrvmError::NotApplicable(reason.to_string())
}

/// How the host hands the loop over to the runtime.
#[derive(Clone, Debug)]
pub enum Dispatch {
	Chunked {
		worker: String,
		workers: i32,
		chunk: i32,
	},
	Pipeline {
		stages: Vec<String>,
		queue_widths: Vec<u32>,
	},
}

pub struct ParallelPlan {
	pub preheader: BlockId,
	pub header: BlockId,
	pub exit: BlockId,
	pub loop_blocks: BTreeSet<BlockId>,
	pub env: EnvInfo,
	pub dispatch: Dispatch,
	pub funcs: Vec<LlvmFunc>,
}

/// Allocates an array holding `items` in order.
fn emit_array(gen: &mut LlvmGen, var_type: VarType, items: Vec<Value>) -> Temp {
	let len = Value::Int(items.len().max(1) as i32);
	let base = gen.visit_alloc_instr(var_type, len);
	for (index, item) in items.into_iter().enumerate() {
		let addr = gen.visit_gep_instr(base.clone().into(), (index as i32).into());
		gen.visit_store_instr(item, addr.into());
	}
	base
}

impl ParallelPlan {
	/// Replaces the loop in `func` by a call to the runtime dispatcher and
	/// returns the generated functions, to be added to the program.
	pub fn commit(
		self,
		func: &mut LlvmFunc,
		temp_mgr: &mut TempManager,
	) -> Vec<LlvmFunc> {
		let weight = func.block(self.header).weight;
		let dispatch = func.new_basicblock(weight);
		let mut outputs = HashMap::new();

		let mut gen = LlvmGen::new(func, temp_mgr, dispatch);
		let mut slots: Vec<Value> =
			self.env.live_ins.iter().map(Value::from).collect();
		slots.extend(self.env.live_outs.iter().map(|_| Value::Int(0)));
		let env = emit_array(&mut gen, VarType::Ptr, slots);
		match &self.dispatch {
			Dispatch::Chunked {
				worker,
				workers,
				chunk,
			} => {
				gen.visit_call_instr(
					VarType::Void,
					DOALL_DISPATCHER,
					vec![
						env.clone().into(),
						Temp::function(worker).into(),
						(*workers).into(),
						(*chunk).into(),
					],
				);
			}
			Dispatch::Pipeline {
				stages,
				queue_widths,
			} => {
				let widths = queue_widths.iter().map(|&w| Value::Int(w as i32));
				let widths = emit_array(&mut gen, VarType::I32Ptr, widths.collect());
				let stage_ptrs = stages
					.iter()
					.map(|s| Value::from(Temp::function(s)))
					.collect();
				let stage_ptrs = emit_array(&mut gen, VarType::Ptr, stage_ptrs);
				gen.visit_call_instr(
					VarType::Void,
					STAGE_DISPATCHER,
					vec![
						env.clone().into(),
						widths.into(),
						stage_ptrs.into(),
						(stages.len() as i32).into(),
						(queue_widths.len() as i32).into(),
					],
				);
			}
		}
		for (slot, temp) in self.env.live_out_slots() {
			let addr = gen.visit_gep_instr(env.clone().into(), (slot as i32).into());
			let value = gen.visit_load_typed(temp.var_type, addr.into());
			outputs.insert(temp.clone(), Value::from(value));
		}
		gen.visit_jump_instr(self.exit);

		func.retarget(self.preheader, self.header, dispatch);
		let exit_phis = func.block(self.exit).phi_instrs.clone();
		for phi in exit_phis {
			func.instr_mut(phi).map_label(&mut |b| {
				if self.loop_blocks.contains(&b) {
					dispatch
				} else {
					b
				}
			});
		}
		func.remove_blocks(&self.loop_blocks);
		let remaining: Vec<BlockId> = func.blocks.keys().copied().collect();
		func.replace_uses_in(&remaining, &outputs);

		info!(
			"{}: loop at block {} handed to {}",
			func.name,
			self.header,
			match &self.dispatch {
				Dispatch::Chunked { worker, .. } => worker.clone(),
				Dispatch::Pipeline { stages, .. } => stages.join(", "),
			}
		);
		self.funcs
	}
}
