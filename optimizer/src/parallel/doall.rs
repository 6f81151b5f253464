use std::collections::{BTreeMap, HashMap};

use llvm::{
	ArithInstr, ArithOp, BlockId, CompOp, LlvmInstr, Temp, TempManager, Value,
	VarType,
};
use log::{debug, trace};
use rrvm::{InstrId, LlvmFunc, LlvmGen};
use utils::{errors::Result, RrvmError, DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};

use super::{
	not_applicable, Dispatch, LoopDependenceInfo, ParallelPlan,
	ParallelizationScheme,
};
use crate::indvar::is_value_invariant;

/// Runs independent iterations in chunks: worker `w` takes the chunks
/// `w, w + workers, w + 2 * workers, ...` of `chunk_size` iterations each.
#[derive(Clone, Copy, Debug)]
pub struct Doall {
	pub workers: i32,
	pub chunk_size: i32,
}

impl Default for Doall {
	fn default() -> Self {
		Self {
			workers: DEFAULT_WORKERS as i32,
			chunk_size: DEFAULT_CHUNK_SIZE as i32,
		}
	}
}

/// Layout of a generated chunk worker.
#[derive(Clone, Debug)]
pub struct ChunkerInfo {
	pub name: String,
	pub env: Temp,
	pub worker: Temp,
	pub workers: Temp,
	pub chunk: Temp,
	// loop block -> its clone in the inner loop
	pub block_map: BTreeMap<BlockId, BlockId>,
	pub outer_header: BlockId,
	pub chunk_check: BlockId,
	pub outer_latch: BlockId,
	pub exit: BlockId,
	// set when induction variables leave the loop
	pub final_value: Option<FinalValueBlocks>,
}

/// Blocks storing the final values of live-out induction variables. Only
/// the worker reaching the first index the loop exits on goes through
/// `store`: from the inner header when that index falls inside a chunk, or
/// from `first_chunk` and `prev_check` when it starts one.
#[derive(Clone, Copy, Debug)]
pub struct FinalValueBlocks {
	pub first_chunk: BlockId,
	pub prev_check: BlockId,
	pub store: BlockId,
}

type DefMap = HashMap<Temp, InstrId>;
type BlockMap = HashMap<InstrId, BlockId>;

/// Whether `value` takes a different value in every iteration: an induction
/// variable with a nonzero constant step, shifted by an invariant or scaled
/// by a nonzero constant.
fn is_injective_index(
	func: &LlvmFunc,
	ldi: &LoopDependenceInfo,
	def_map: &DefMap,
	block_of: &BlockMap,
	value: &Value,
) -> bool {
	let Some(temp) = value.as_temp() else {
		return false;
	};
	let counts = ldi
		.ivs
		.ivs
		.iter()
		.any(|iv| iv.target == *temp && iv.constant_step().map_or(false, |s| s != 0));
	if counts {
		return true;
	}
	let Some(&def) = def_map.get(temp) else {
		return false;
	};
	if !block_of.get(&def).map_or(false, |b| ldi.loop_.contains(*b)) {
		return false;
	}
	let LlvmInstr::ArithInstr(arith) = func.instr(def) else {
		return false;
	};
	let injective = |v: &Value| is_injective_index(func, ldi, def_map, block_of, v);
	let invariant = |v: &Value| is_value_invariant(func, &ldi.loop_, def_map, block_of, v);
	let nonzero = |v: &Value| v.as_int().map_or(false, |c| c != 0);
	match arith.op {
		ArithOp::Add | ArithOp::Sub => {
			(injective(&arith.lhs) && invariant(&arith.rhs))
				|| (invariant(&arith.lhs) && injective(&arith.rhs))
		}
		ArithOp::Mul => {
			(injective(&arith.lhs) && nonzero(&arith.rhs))
				|| (nonzero(&arith.lhs) && injective(&arith.rhs))
		}
		_ => false,
	}
}

/// `target = start + (lhs + rhs) * step`
fn emit_affine(
	gen: &mut LlvmGen,
	target: Temp,
	start: &Value,
	lhs: Value,
	rhs: Value,
	step: &Value,
) {
	if *start == Value::Int(0) && *step == Value::Int(1) {
		emit_add(gen, target, lhs, rhs);
		return;
	}
	let index = gen.visit_arith_instr(lhs, ArithOp::Add, rhs);
	let scaled = if *step == Value::Int(1) {
		index
	} else {
		gen.visit_arith_instr(index.into(), ArithOp::Mul, step.clone())
	};
	emit_add(gen, target, start.clone(), scaled.into());
}

fn emit_add(gen: &mut LlvmGen, target: Temp, lhs: Value, rhs: Value) {
	gen.emit(ArithInstr {
		target,
		op: ArithOp::Add,
		var_type: VarType::I32,
		lhs,
		rhs,
	});
}

impl Doall {
	pub fn new(workers: i32, chunk_size: i32) -> Self {
		Self {
			workers,
			chunk_size,
		}
	}

	/// Stores must go to `base[index]` with an invariant base and an index
	/// no two iterations share.
	fn check_stores(&self, func: &LlvmFunc, ldi: &LoopDependenceInfo) -> Result<()> {
		let def_map = func.def_map();
		let block_of = func.instr_block_map();
		for &bb in ldi.loop_.blocks.iter() {
			for id in func.block(bb).instr_ids() {
				let LlvmInstr::StoreInstr(store) = func.instr(id) else {
					continue;
				};
				let gep = store
					.addr
					.as_temp()
					.and_then(|t| def_map.get(t))
					.map(|&def| func.instr(def));
				let distinct = match gep {
					Some(LlvmInstr::GEPInstr(gep)) => {
						is_value_invariant(func, &ldi.loop_, &def_map, &block_of, &gep.addr)
							&& is_injective_index(func, ldi, &def_map, &block_of, &gep.offset)
					}
					_ => false,
				};
				if !distinct {
					return Err(not_applicable(format!(
						"`{}` may write one location in several iterations",
						store
					)));
				}
			}
		}
		Ok(())
	}

	/// Builds the worker function without touching `func`.
	pub fn chunker(
		&self,
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		temp_mgr: &mut TempManager,
	) -> Result<(LlvmFunc, ChunkerInfo)> {
		let loop_ = &ldi.loop_;
		let (governing, attribution) = ldi.ivs.governing_iv().ok_or_else(|| {
			not_applicable("no well formed governing induction variable")
		})?;
		let step = governing
			.constant_step()
			.ok_or_else(|| not_applicable("governing step is not constant"))?;
		let exit_pred = attribution.exit_predicate(step)?;
		let in_loop = match func.instr(attribution.branch) {
			LlvmInstr::JumpCondInstr(jump) if jump.target_true == attribution.exit_block => {
				jump.target_false
			}
			LlvmInstr::JumpCondInstr(jump) => jump.target_true,
			other => {
				return Err(RrvmError::IllFormedLoop(format!(
					"header of {} ends with `{}`",
					func.name, other
				)))
			}
		};
		let live_outs = ldi
			.env
			.live_outs
			.iter()
			.map(|temp| {
				ldi.ivs.ivs.iter().position(|iv| iv.target == *temp).ok_or_else(|| {
					not_applicable(format!("live-out {} is not an induction variable", temp))
				})
			})
			.collect::<Result<Vec<usize>>>()?;

		let name = format!("{}.doall.{}", func.name, loop_.header);
		let env = temp_mgr.new_temp(VarType::Ptr, false);
		let worker = temp_mgr.new_temp(VarType::I32, false);
		let workers = temp_mgr.new_temp(VarType::I32, false);
		let chunk = temp_mgr.new_temp(VarType::I32, false);
		let k_next = temp_mgr.new_temp(VarType::I32, false);
		let c_next = temp_mgr.new_temp(VarType::I32, false);
		let mut chunker = LlvmFunc::new(
			&name,
			VarType::Void,
			vec![env.clone(), worker.clone(), workers.clone(), chunk.clone()],
		);
		let entry = chunker.entry();
		let outer_header = chunker.new_basicblock(1.0);
		let block_map: BTreeMap<BlockId, BlockId> = loop_
			.blocks
			.iter()
			.map(|&bb| (bb, chunker.new_basicblock(func.block(bb).weight)))
			.collect();
		let chunk_check = chunker.new_basicblock(1.0);
		let outer_latch = chunker.new_basicblock(1.0);
		let exit = chunker.new_basicblock(1.0);
		let final_value = (!live_outs.is_empty()).then(|| FinalValueBlocks {
			first_chunk: chunker.new_basicblock(1.0),
			prev_check: chunker.new_basicblock(1.0),
			store: chunker.new_basicblock(1.0),
		});
		let leave_to = final_value.map_or(exit, |b| b.store);
		let done_to = final_value.map_or(exit, |b| b.first_chunk);
		let header = block_map.get(&loop_.header).copied().unwrap_or(exit);
		let clone_label = |bb: BlockId| block_map.get(&bb).copied().unwrap_or(exit);
		let jump_label = |bb: BlockId| {
			if bb == loop_.header {
				chunk_check
			} else {
				clone_label(bb)
			}
		};

		let mut gen = LlvmGen::new(&mut chunker, temp_mgr, entry);
		for temp in ldi.env.live_ins.iter() {
			ldi.env.load_live_in(&mut gen, &env, temp);
		}
		let steps: Vec<Value> = ldi
			.ivs
			.ivs
			.iter()
			.map(|iv| iv.emit_step(gen.func, entry, gen.temp_mgr))
			.collect();
		let k0 = gen.visit_arith_instr(worker.clone().into(), ArithOp::Mul, chunk.clone().into());
		let kstep =
			gen.visit_arith_instr(workers.clone().into(), ArithOp::Mul, chunk.clone().into());
		gen.visit_jump_instr(outer_header);

		// outer loop over chunk indices
		gen.switch_to(outer_header);
		let (_, k) = gen.visit_phi_instr(
			VarType::I32,
			vec![(k0.into(), entry), (k_next.clone().into(), outer_latch)],
		);
		let first = gen.temp_mgr.new_temp(VarType::I32, false);
		emit_affine(
			&mut gen,
			first.clone(),
			&governing.start,
			k.clone().into(),
			Value::Int(0),
			&steps[attribution.iv],
		);
		let mut at_k = Vec::new();
		for &index in live_outs.iter() {
			let iv = &ldi.ivs.ivs[index];
			let value = gen.temp_mgr.new_temp(VarType::I32, false);
			emit_affine(
				&mut gen,
				value.clone(),
				&iv.start,
				k.clone().into(),
				Value::Int(0),
				&steps[index],
			);
			at_k.push(value);
		}
		let done = gen.visit_comp_instr(first.into(), exit_pred, attribution.bound.clone());
		gen.visit_jump_cond_instr(done.into(), done_to, header);

		// inner loop: the original body with induction variables rebased
		gen.switch_to(header);
		let (_, c) = gen.visit_phi_instr(
			VarType::I32,
			vec![(Value::Int(0), outer_header), (c_next.clone().into(), chunk_check)],
		);
		for (iv, step) in ldi.ivs.ivs.iter().zip(steps.iter()) {
			emit_affine(
				&mut gen,
				iv.target.clone(),
				&iv.start,
				c.clone().into(),
				k.clone().into(),
				step,
			);
		}
		for &id in func.block(loop_.header).instrs.iter() {
			gen.emit(func.instr(id).clone());
		}
		let leave = gen.visit_comp_instr(
			governing.target.clone().into(),
			exit_pred,
			attribution.bound.clone(),
		);
		gen.visit_jump_cond_instr(leave.into(), leave_to, jump_label(in_loop));

		for &bb in loop_.blocks.iter().filter(|&&bb| bb != loop_.header) {
			gen.switch_to(clone_label(bb));
			let block = func.block(bb);
			for &id in block.phi_instrs.iter() {
				let mut phi = func.instr(id).clone();
				phi.map_label(&mut |b| clone_label(b));
				gen.emit(phi);
			}
			for &id in block.instrs.iter() {
				gen.emit(func.instr(id).clone());
			}
			if let Some(id) = block.jump_instr {
				let mut jump = func.instr(id).clone();
				jump.map_label(&mut |b| jump_label(b));
				gen.emit(jump);
			}
		}

		gen.switch_to(chunk_check);
		emit_add(&mut gen, c_next.clone(), c.into(), Value::Int(1));
		let more = gen.visit_comp_instr(c_next.into(), CompOp::SLT, chunk.clone().into());
		gen.visit_jump_cond_instr(more.into(), header, outer_latch);

		if let Some(blocks) = final_value {
			gen.switch_to(blocks.first_chunk);
			let is_first =
				gen.visit_comp_instr(k.clone().into(), CompOp::EQ, Value::Int(0));
			gen.visit_jump_cond_instr(is_first.into(), blocks.store, blocks.prev_check);

			// the chunk starts on the exit index unless the index before exits too
			gen.switch_to(blocks.prev_check);
			let prev = gen.temp_mgr.new_temp(VarType::I32, false);
			emit_affine(
				&mut gen,
				prev.clone(),
				&governing.start,
				k.clone().into(),
				Value::Int(-1),
				&steps[attribution.iv],
			);
			let prev_done =
				gen.visit_comp_instr(prev.into(), exit_pred, attribution.bound.clone());
			gen.visit_jump_cond_instr(prev_done.into(), exit, blocks.store);

			gen.switch_to(blocks.store);
			for (&index, value) in live_outs.iter().zip(at_k) {
				let target = &ldi.ivs.ivs[index].target;
				let (_, last) = gen.visit_phi_instr(
					VarType::I32,
					vec![
						(target.into(), header),
						(value.clone().into(), blocks.first_chunk),
						(value.into(), blocks.prev_check),
					],
				);
				ldi.env.store_value(&mut gen, &env, target, last.into());
			}
			gen.visit_jump_instr(exit);
		}

		gen.switch_to(outer_latch);
		emit_add(&mut gen, k_next, k.into(), kstep.into());
		gen.visit_jump_instr(outer_header);

		gen.switch_to(exit);
		gen.visit_ret_instr(None);
		gen.visit_end();
		trace!("{}: {} blocks", name, chunker.blocks.len());

		let info = ChunkerInfo {
			name,
			env,
			worker,
			workers,
			chunk,
			block_map,
			outer_header,
			chunk_check,
			outer_latch,
			exit,
			final_value,
		};
		Ok((chunker, info))
	}
}

impl ParallelizationScheme for Doall {
	fn name(&self) -> &'static str {
		"doall"
	}

	fn can_apply(&self, func: &LlvmFunc, ldi: &LoopDependenceInfo) -> Result<()> {
		let loop_ = &ldi.loop_;
		if loop_.preheader.is_none() {
			return Err(not_applicable("loop has no preheader"));
		}
		if loop_.single_exit().is_none() || loop_.exiting != [loop_.header] {
			return Err(not_applicable("loop does not leave from its header only"));
		}
		let (governing, attribution) = ldi.ivs.governing_iv().ok_or_else(|| {
			not_applicable("no well formed governing induction variable")
		})?;
		let step = governing
			.constant_step()
			.ok_or_else(|| not_applicable("governing step is not constant"))?;
		if attribution.exit_predicate(step)? == CompOp::NE {
			// a later value may satisfy the continue test again
			return Err(not_applicable("loop exits on `!=`"));
		}
		let def_map = func.def_map();
		let block_of = func.instr_block_map();
		if !is_value_invariant(func, loop_, &def_map, &block_of, &attribution.bound) {
			return Err(not_applicable(format!(
				"exit bound {} varies in the loop",
				attribution.bound
			)));
		}
		for &phi in func.block(loop_.header).phi_instrs.iter() {
			if ldi.ivs.iv_of_phi(phi).is_none() {
				return Err(not_applicable(format!(
					"`{}` is not an induction variable",
					func.instr(phi)
				)));
			}
		}
		for id in ldi.attrs.loop_carried_sccs() {
			if !ldi.attrs.is_induction_scc(id) {
				return Err(not_applicable(format!(
					"scc {} carries a dependence across iterations",
					id
				)));
			}
		}
		for (index, iv) in ldi.ivs.ivs.iter().enumerate() {
			if index == attribution.iv {
				continue;
			}
			let stray = ldi
				.dag
				.scc(iv.scc)
				.nodes
				.iter()
				.any(|&n| ldi.dag.graph.value(n).instr().map_or(true, |id| !iv.contains(id)));
			if stray {
				return Err(not_applicable(format!(
					"induction variable {} shares its scc",
					iv.target
				)));
			}
		}
		let is_iv = |temp: &Temp| ldi.ivs.ivs.iter().any(|iv| iv.target == *temp);
		if let Some(temp) = ldi.env.live_outs.iter().find(|t| !is_iv(t)) {
			return Err(not_applicable(format!(
				"live-out {} is not an induction variable",
				temp
			)));
		}
		self.check_stores(func, ldi)?;
		debug!("{}: loop at block {} is doall", func.name, loop_.header);
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
		let (chunker, info) = self.chunker(func, ldi, temp_mgr)?;
		Ok(ParallelPlan {
			preheader,
			header: loop_.header,
			exit,
			loop_blocks: loop_.blocks.clone(),
			env: ldi.env.clone(),
			dispatch: Dispatch::Chunked {
				worker: info.name,
				workers: self.workers,
				chunk: self.chunk_size,
			},
			funcs: vec![chunker],
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parallel::loop_dependence::loop_info;
	use rrvm::samples::*;

	fn rejection(func: &LlvmFunc, index: usize) -> String {
		let ldi = loop_info(func, index, false);
		match Doall::default().can_apply(func, &ldi) {
			Err(RrvmError::NotApplicable(reason)) => reason,
			other => panic!("expected a rejection, got {:?}", other),
		}
	}

	#[test]
	fn test_independent_loops() {
		let program = array_scale(100);
		let func = &program.funcs[0];
		for index in 0..3 {
			let ldi = loop_info(func, index, false);
			let verdict = Doall::default().can_apply(func, &ldi);
			// the sum loop carries its accumulator
			assert_eq!(verdict.is_ok(), index < 2, "loop {}", index);
		}
		let program = countdown(10);
		let ldi = loop_info(&program.funcs[0], 0, false);
		assert!(Doall::default().can_apply(&program.funcs[0], &ldi).is_ok());
	}

	#[test]
	fn test_composite_step_is_accepted() {
		let program = dual_iv(10, 3, 4);
		let func = program.get_func("dual").unwrap();
		let ldi = loop_info(func, 0, false);
		assert!(Doall::default().can_apply(func, &ldi).is_ok());
	}

	#[test]
	fn test_rejections() {
		let program = sum_squares(10);
		assert!(rejection(&program.funcs[0], 1).contains("phi"));
		let program = pipeline_io(10);
		rejection(&program.funcs[0], 1);
		// the pointer parameters may overlap
		let program = param_scale(10);
		let scale = program.get_func("scale").unwrap();
		assert!(rejection(scale, 0).contains("carries"));
		let ldi = loop_info(scale, 0, true);
		assert!(Doall::default().can_apply(scale, &ldi).is_ok());
	}

	#[test]
	fn test_nest_takes_the_inner_loop() {
		let program = nested(4, 3);
		let func = &program.funcs[0];
		rejection(func, 0);
		let ldi = loop_info(func, 1, false);
		assert_eq!(ldi.loop_.level, 2);
		assert!(Doall::default().can_apply(func, &ldi).is_ok());
	}

	#[test]
	fn test_chunker_layout() {
		let program = array_scale(100);
		let func = &program.funcs[0];
		let ldi = loop_info(func, 1, false);
		let mut temp_mgr = program.temp_mgr.clone();
		let doall = Doall::new(4, 2);
		let plan = doall.generate(func, &ldi, &mut temp_mgr).unwrap();
		let [chunker] = plan.funcs.as_slice() else {
			panic!("one worker expected");
		};
		assert_eq!(chunker.name, format!("main.doall.{}", ldi.loop_.header));
		assert_eq!(chunker.params.len(), 4);
		assert_eq!(chunker.blocks.len(), ldi.loop_.blocks.len() + 5);
		assert!(matches!(
			plan.dispatch,
			Dispatch::Chunked { workers: 4, chunk: 2, .. }
		));

		let (_, info) = doall.chunker(func, &ldi, &mut temp_mgr).unwrap();
		let header = info.block_map[&ldi.loop_.header];
		assert_eq!(chunker.blocks.len(), info.block_map.len() + 5);
		let succ = &chunker.block(info.outer_header).succ;
		assert!(succ.contains(&info.exit) && succ.contains(&header));
		assert_eq!(chunker.block(info.chunk_check).succ.len(), 2);
		// the body now jumps to the chunk check instead of the header
		let body = ldi.loop_.latches[0];
		assert_eq!(chunker.block(info.block_map[&body]).succ, vec![info.chunk_check]);
	}

	#[test]
	fn test_live_out_counter() {
		let program = last_index(31);
		let func = &program.funcs[0];
		let ldi = loop_info(func, 0, false);
		assert_eq!(ldi.env.live_outs.len(), 1);
		assert!(Doall::default().can_apply(func, &ldi).is_ok());

		let mut temp_mgr = program.temp_mgr.clone();
		let (chunker, info) = Doall::new(3, 2).chunker(func, &ldi, &mut temp_mgr).unwrap();
		let blocks = info.final_value.unwrap();
		assert_eq!(chunker.blocks.len(), info.block_map.len() + 8);
		let header = info.block_map[&ldi.loop_.header];
		assert!(chunker.block(header).succ.contains(&blocks.store));
		assert!(chunker.block(info.outer_header).succ.contains(&blocks.first_chunk));
		assert_eq!(chunker.block(blocks.store).succ, vec![info.exit]);
		assert_eq!(chunker.block(blocks.store).phi_instrs.len(), 1);
	}

	#[test]
	fn test_exit_on_not_equal_is_rejected() {
		// for (i = 0; i == 0; i++) ;
		let mut mgr = TempManager::new();
		let mut func = LlvmFunc::new("once", VarType::Void, vec![]);
		let mut gen = LlvmGen::new(&mut func, &mut mgr, 0);
		counted_loop(&mut gen, "i", 0.into(), CompOp::EQ, 0.into(), 1, vec![], |_, _, _| {
			vec![]
		});
		gen.visit_ret_instr(None);
		gen.visit_end();
		assert!(rejection(&func, 0).contains("`!=`"));
	}
}
