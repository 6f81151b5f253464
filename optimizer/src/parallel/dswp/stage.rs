use std::collections::{BTreeMap, BTreeSet, HashMap};

use llvm::{BlockId, LlvmInstr, Temp, TempManager, VarType};
use rrvm::{dominator::DomTree, InstrId, LlvmFunc, LlvmGen};

use super::QueueInfo;
use crate::{
	parallel::LoopDependenceInfo,
	pdg::{DepKind, PdgValue},
};

/// What one pipeline stage computes and what it receives from earlier
/// stages.
#[derive(Clone, Debug, Default)]
pub struct StageInfo {
	pub index: usize,
	pub name: String,
	// instructions of the SCCs assigned to the stage
	pub owned: BTreeSet<InstrId>,
	// everything cloned into the stage: owned instructions, removable
	// instructions they consume and the branches they sit under
	pub needed: BTreeSet<InstrId>,
	// producers in earlier stages whose value is popped here
	pub pops: BTreeSet<InstrId>,
	// producers in earlier stages only ordering a memory access here
	pub tokens: BTreeSet<InstrId>,
	pub live_ins: Vec<Temp>,
	pub live_outs: Vec<Temp>,
}

impl StageInfo {
	/// Closes `owned` over what the stage needs to run on its own.
	/// `owner` maps every non-removable loop instruction to its stage.
	pub fn collect(
		func: &LlvmFunc,
		ldi: &LoopDependenceInfo,
		index: usize,
		owned: BTreeSet<InstrId>,
		owner: &HashMap<InstrId, usize>,
	) -> Self {
		let graph = &ldi.dag.graph;
		let mut stage = Self {
			index,
			needed: owned.clone(),
			owned,
			..Default::default()
		};
		let mut worklist: Vec<InstrId> = stage.needed.iter().copied().collect();
		fn need(id: InstrId, stage: &mut StageInfo, worklist: &mut Vec<InstrId>) {
			if stage.needed.insert(id) {
				worklist.push(id);
			}
		}

		while let Some(id) = worklist.pop() {
			let Some(node) = graph.node_of_instr(id) else {
				continue;
			};
			let mut producers = Vec::new();
			for edge in graph.incoming(node) {
				if !graph.is_internal(edge.from) {
					continue;
				}
				let PdgValue::Instr(src) = graph.value(edge.from) else {
					continue;
				};
				let src = *src;
				let local = owner.get(&src).map_or(true, |&s| s == index);
				match edge.kind {
					DepKind::Control => need(src, &mut stage, &mut worklist),
					DepKind::Register if local => need(src, &mut stage, &mut worklist),
					DepKind::Register => {
						stage.pops.insert(src);
						producers.push(src);
					}
					DepKind::Memory if local => {}
					DepKind::Memory => {
						stage.tokens.insert(src);
						producers.push(src);
					}
				}
			}
			// a pop runs under the same branches as its producer
			for src in producers {
				if let Some(node) = graph.node_of_instr(src) {
					for edge in graph.incoming(node).filter(|e| e.kind == DepKind::Control) {
						if let Some(branch) = graph.value(edge.from).instr() {
							need(branch, &mut stage, &mut worklist);
						}
					}
				}
			}
			// a merge needs the edges it merges
			if let LlvmInstr::PhiInstr(phi) = func.instr(id) {
				for (_, bb) in phi.source.iter() {
					if !ldi.loop_.contains(*bb) {
						continue;
					}
					if let Some(jump) = func.block(*bb).jump_instr {
						need(jump, &mut stage, &mut worklist);
					}
				}
			}
		}
		stage.tokens.retain(|id| !stage.pops.contains(id));

		let reads: BTreeSet<Temp> = stage
			.needed
			.iter()
			.flat_map(|&id| func.instr(id).get_read())
			.collect();
		stage.live_ins =
			ldi.env.live_ins.iter().filter(|t| reads.contains(*t)).cloned().collect();
		stage.live_outs = ldi
			.env
			.live_outs
			.iter()
			.filter(|t| {
				stage
					.owned
					.iter()
					.any(|&id| func.instr(id).get_write().as_ref() == Some(*t))
			})
			.cloned()
			.collect();
		stage
	}
}

/// Emits the function of one stage: a clone of the loop skeleton holding
/// only the needed instructions, with queue traffic at the producers'
/// positions.
pub struct StageBuilder<'a> {
	pub func: &'a LlvmFunc,
	pub ldi: &'a LoopDependenceInfo,
	pub post_dom: &'a DomTree,
	pub queues: &'a [QueueInfo],
}

impl<'a> StageBuilder<'a> {
	pub fn build(&self, stage: &StageInfo, temp_mgr: &mut TempManager) -> LlvmFunc {
		let loop_ = &self.ldi.loop_;
		let env = temp_mgr.new_temp(VarType::Ptr, false);
		let queue_array = temp_mgr.new_temp(VarType::Ptr, false);
		let mut target = LlvmFunc::new(
			&stage.name,
			VarType::Void,
			vec![env.clone(), queue_array.clone()],
		);
		let entry = target.entry();
		let block_map: BTreeMap<BlockId, BlockId> = loop_
			.blocks
			.iter()
			.map(|&bb| (bb, target.new_basicblock(self.func.block(bb).weight)))
			.collect();
		let exit = target.new_basicblock(1.0);
		let header = block_map.get(&loop_.header).copied().unwrap_or(exit);
		let in_loop = |bb: BlockId| block_map.get(&bb).copied();
		let phi_label = |bb: BlockId| in_loop(bb).unwrap_or(entry);
		let jump_label = |bb: BlockId| in_loop(bb).unwrap_or(exit);

		let mut gen = LlvmGen::new(&mut target, temp_mgr, entry);
		let mut handles = HashMap::new();
		for (index, queue) in self.queues.iter().enumerate() {
			if queue.from_stage != stage.index && queue.to_stage != stage.index {
				continue;
			}
			let addr = gen.visit_gep_instr(queue_array.clone().into(), (index as i32).into());
			let handle = gen.visit_load_typed(VarType::Ptr, addr.into());
			handles.insert(index, handle);
		}
		for temp in stage.live_ins.iter() {
			self.ldi.env.load_live_in(&mut gen, &env, temp);
		}
		gen.visit_jump_instr(header);

		let traffic = |gen: &mut LlvmGen, id: InstrId, push: bool| {
			for (index, queue) in self.queues.iter().enumerate() {
				if queue.producer != id {
					continue;
				}
				let Some(handle) = handles.get(&index) else {
					continue;
				};
				if push && queue.from_stage == stage.index {
					queue.emit_push(gen, handle);
				}
				if !push && queue.to_stage == stage.index {
					queue.emit_pop(gen, handle);
				}
			}
		};

		for &bb in loop_.blocks.iter() {
			gen.switch_to(jump_label(bb));
			let block = self.func.block(bb);
			for &id in block.phi_instrs.iter().filter(|id| stage.needed.contains(id)) {
				let mut phi = self.func.instr(id).clone();
				phi.map_label(&mut |b| phi_label(b));
				gen.emit(phi);
			}
			for &id in block.phi_instrs.iter() {
				traffic(&mut gen, id, false);
				if stage.owned.contains(&id) {
					traffic(&mut gen, id, true);
				}
			}
			for &id in block.instrs.iter() {
				if stage.needed.contains(&id) {
					gen.emit(self.func.instr(id).clone());
				} else {
					traffic(&mut gen, id, false);
				}
				if stage.owned.contains(&id) {
					traffic(&mut gen, id, true);
				}
			}
			let Some(id) = block.jump_instr else {
				continue;
			};
			let instr = self.func.instr(id);
			if stage.needed.contains(&id) || matches!(instr, LlvmInstr::JumpInstr(_)) {
				let mut jump = instr.clone();
				jump.map_label(&mut |b| jump_label(b));
				gen.emit(jump);
			} else {
				let next = self.post_dom.idom(bb).map_or(exit, |b| jump_label(b));
				gen.visit_jump_instr(next);
			}
		}

		gen.switch_to(exit);
		for temp in stage.live_outs.iter() {
			self.ldi.env.store_live_out(&mut gen, &env, temp);
		}
		gen.visit_ret_instr(None);
		gen.visit_end();
		target
	}
}
