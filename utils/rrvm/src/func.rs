use std::{
	collections::{BTreeMap, HashMap},
	fmt::Display,
};

use llvm::{BlockId, LlvmInstr, Temp, VarType};

use crate::basicblock::BasicBlock;

/// Stable index of an instruction in its function's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub usize);

impl Display for InstrId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// A function whose instructions live in one arena. Blocks only hold ids,
/// so removing an instruction from a block never invalidates other ids.
pub struct LlvmFunc {
	// next fresh block id; blocks may have been removed in between
	pub total: BlockId,
	pub name: String,
	pub ret_type: VarType,
	pub params: Vec<Temp>,
	pub blocks: BTreeMap<BlockId, BasicBlock>,
	pub instrs: Vec<LlvmInstr>,
}

impl LlvmFunc {
	pub fn new(name: impl Display, ret_type: VarType, params: Vec<Temp>) -> Self {
		let mut blocks = BTreeMap::new();
		blocks.insert(0, BasicBlock::new(0, 1.0));
		Self {
			total: 1,
			name: name.to_string(),
			ret_type,
			params,
			blocks,
			instrs: Vec::new(),
		}
	}
	pub fn entry(&self) -> BlockId {
		0
	}
	pub fn new_basicblock(&mut self, weight: f64) -> BlockId {
		let id = self.total;
		self.total += 1;
		self.blocks.insert(id, BasicBlock::new(id, weight));
		id
	}
	pub fn block(&self, id: BlockId) -> &BasicBlock {
		&self.blocks[&id]
	}
	pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
		match self.blocks.get_mut(&id) {
			Some(block) => block,
			None => panic!("{} has no block {}", self.name, id),
		}
	}
	pub fn instr(&self, id: InstrId) -> &LlvmInstr {
		&self.instrs[id.0]
	}
	pub fn instr_mut(&mut self, id: InstrId) -> &mut LlvmInstr {
		&mut self.instrs[id.0]
	}
	fn alloc_instr(&mut self, instr: LlvmInstr) -> InstrId {
		self.instrs.push(instr);
		InstrId(self.instrs.len() - 1)
	}
	/// Appends `instr` to `block`: phis join the phi list, terminators replace
	/// the current terminator, everything else goes to the end of the body.
	pub fn push(&mut self, block: BlockId, instr: impl Into<LlvmInstr>) -> InstrId {
		let instr = instr.into();
		let is_phi = instr.is_phi();
		let is_terminator = instr.is_terminator();
		let id = self.alloc_instr(instr);
		let bb = self.block_mut(block);
		if is_phi {
			bb.phi_instrs.push(id);
		} else if is_terminator {
			bb.jump_instr = Some(id);
		} else {
			bb.instrs.push(id);
		}
		id
	}
	pub fn push_all(
		&mut self,
		block: BlockId,
		instrs: impl IntoIterator<Item = LlvmInstr>,
	) -> Vec<InstrId> {
		instrs.into_iter().map(|instr| self.push(block, instr)).collect()
	}
	/// Inserts a non-phi, non-terminator instruction at `pos` in the body.
	pub fn insert(
		&mut self,
		block: BlockId,
		pos: usize,
		instr: impl Into<LlvmInstr>,
	) -> InstrId {
		let id = self.alloc_instr(instr.into());
		self.block_mut(block).instrs.insert(pos, id);
		id
	}
	pub fn terminator(&self, block: BlockId) -> Option<&LlvmInstr> {
		self.block(block).jump_instr.map(|id| self.instr(id))
	}
	/// All instructions placed in a block, in block order.
	pub fn all_instrs(&self) -> Vec<InstrId> {
		self.blocks.values().flat_map(|bb| bb.instr_ids()).collect()
	}
	pub fn instr_block_map(&self) -> HashMap<InstrId, BlockId> {
		self
			.blocks
			.values()
			.flat_map(|bb| bb.instr_ids().map(move |id| (id, bb.id)))
			.collect()
	}
	pub fn def_map(&self) -> HashMap<Temp, InstrId> {
		self
			.all_instrs()
			.into_iter()
			.filter_map(|id| self.instr(id).get_write().map(|t| (t, id)))
			.collect()
	}
	/// For every temp, its users; a user appears once per use.
	pub fn users(&self) -> HashMap<Temp, Vec<InstrId>> {
		let mut users: HashMap<Temp, Vec<InstrId>> = HashMap::new();
		for id in self.all_instrs() {
			for temp in self.instr(id).get_read() {
				users.entry(temp).or_default().push(id);
			}
		}
		users
	}
	pub fn is_param(&self, temp: &Temp) -> bool {
		self.params.contains(temp)
	}
}

#[cfg(test)]
mod tests {
	use crate::dominator::tests::diamond;

	#[test]
	fn test_users_per_use() {
		let func = diamond();
		let users = func.users();
		let x = &func.params[0];
		// the comparison and both arms
		assert_eq!(users[x].len(), 3);
		assert_eq!(func.def_map().len(), 4);
	}

	#[test]
	fn test_display_function() {
		let text = diamond().to_string();
		assert!(text.starts_with("define i32 @diamond(i32 %x) {"));
		assert!(text.contains("entry:"));
		assert!(text.contains("phi i32"));
	}
}
