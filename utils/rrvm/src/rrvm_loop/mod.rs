use std::{collections::BTreeSet, fmt::Display};

use llvm::BlockId;

pub mod loop_analysis;

pub type LoopId = usize;

// Instances of this class are used to represent loops that are detected in
// the flow graph. Loops of a function are stored in one vector and refer to
// each other by index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
	pub id: LoopId,
	pub outer: Option<LoopId>,
	pub header: BlockId,
	// outermost loops have level 1
	pub level: i32,
	pub subloops: Vec<LoopId>,
	pub blocks: BTreeSet<BlockId>,
	pub latches: Vec<BlockId>,
	// loop blocks with a successor outside the loop
	pub exiting: Vec<BlockId>,
	// blocks outside the loop reached from an exiting block
	pub exits: Vec<BlockId>,
	pub preheader: Option<BlockId>,
}

impl Loop {
	pub fn contains(&self, block: BlockId) -> bool {
		self.blocks.contains(&block)
	}
	pub fn no_inner(&self) -> bool {
		self.subloops.is_empty()
	}
	pub fn single_exit(&self) -> Option<BlockId> {
		match self.exits.as_slice() {
			[exit] => Some(*exit),
			_ => None,
		}
	}
	pub fn single_exiting(&self) -> Option<BlockId> {
		match self.exiting.as_slice() {
			[exiting] => Some(*exiting),
			_ => None,
		}
	}
}

impl Display for Loop {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let outer = match self.outer {
			Some(outer) => format!("{}", outer),
			None => "None".to_string(),
		};
		write!(
			f,
			"loop {}: outer: {}, header: {}, level: {}, blocks: {:?}",
			self.id, outer, self.header, self.level, self.blocks
		)
	}
}
