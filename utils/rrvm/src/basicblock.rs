use llvm::BlockId;
use utils::{to_label, Label};

use crate::func::InstrId;

pub struct BasicBlock {
	pub id: BlockId,
	pub prev: Vec<BlockId>,
	pub succ: Vec<BlockId>,
	pub phi_instrs: Vec<InstrId>,
	pub instrs: Vec<InstrId>,
	pub jump_instr: Option<InstrId>,
	pub weight: f64,
}

impl BasicBlock {
	pub fn new(id: BlockId, weight: f64) -> BasicBlock {
		BasicBlock {
			id,
			prev: Vec::new(),
			succ: Vec::new(),
			phi_instrs: Vec::new(),
			instrs: Vec::new(),
			jump_instr: None,
			weight,
		}
	}
	pub fn label(&self) -> Label {
		to_label(self.id)
	}
	pub fn clear(&mut self) {
		self.prev.clear();
		self.succ.clear();
	}
	/// Phis, then the body, then the terminator.
	pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> + '_ {
		self
			.phi_instrs
			.iter()
			.chain(self.instrs.iter())
			.chain(self.jump_instr.iter())
			.copied()
	}
	pub fn len(&self) -> usize {
		self.phi_instrs.len() + self.instrs.len() + self.jump_instr.iter().count()
	}
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
