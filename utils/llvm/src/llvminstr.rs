use std::fmt::Display;

use utils::Label;

use crate::{llvmop::*, llvmvar::VarType, temp::Temp, BlockId};

pub trait LlvmInstrTrait: Display {
	// one entry per use, in operand order
	fn get_read(&self) -> Vec<Temp> {
		Vec::new()
	}
	fn get_write(&self) -> Option<Temp> {
		None
	}
	fn map_temp(&mut self, _map: &mut dyn FnMut(&Temp) -> Option<Value>) {}
	fn set_write(&mut self, _temp: Temp) {}
	// successors for terminators, incoming blocks for phis
	fn get_label(&self) -> Vec<BlockId> {
		Vec::new()
	}
	fn map_label(&mut self, _map: &mut dyn FnMut(BlockId) -> BlockId) {}
	fn type_valid(&self) -> bool {
		true
	}
}

#[derive(Clone, Debug)]
pub struct ArithInstr {
	pub target: Temp,
	pub op: ArithOp,
	pub var_type: VarType,
	pub lhs: Value,
	pub rhs: Value,
}

#[derive(Clone, Debug)]
pub struct CompInstr {
	pub kind: CompKind,
	pub target: Temp,
	pub op: CompOp,
	pub var_type: VarType,
	pub lhs: Value,
	pub rhs: Value,
}

#[derive(Clone, Debug)]
pub struct ConvertInstr {
	pub target: Temp,
	pub op: ConvertOp,
	pub from_type: VarType,
	pub lhs: Value,
	pub to_type: VarType,
}

#[derive(Clone, Debug)]
pub struct JumpInstr {
	pub target: BlockId,
}

#[derive(Clone, Debug)]
pub struct JumpCondInstr {
	pub var_type: VarType,
	pub cond: Value,
	pub target_true: BlockId,
	pub target_false: BlockId,
}

#[derive(Clone, Debug)]
pub struct PhiInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub source: Vec<(Value, BlockId)>,
}

#[derive(Clone, Debug)]
pub struct RetInstr {
	pub value: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct AllocInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub length: Value,
}

#[derive(Clone, Debug)]
pub struct StoreInstr {
	pub value: Value,
	pub addr: Value,
}

#[derive(Clone, Debug)]
pub struct LoadInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub addr: Value,
}

#[derive(Clone, Debug)]
pub struct GEPInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub addr: Value,
	pub offset: Value,
}

#[derive(Clone, Debug)]
pub struct CallInstr {
	pub target: Option<Temp>,
	pub var_type: VarType,
	pub func: Label,
	pub params: Vec<(VarType, Value)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryAccess {
	Load,
	Store,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrCategory {
	Phi,
	Memory(MemoryAccess),
	Call,
	Terminator,
	Other,
}

#[derive(Clone, Debug)]
pub enum LlvmInstr {
	ArithInstr(ArithInstr),
	CompInstr(CompInstr),
	ConvertInstr(ConvertInstr),
	JumpInstr(JumpInstr),
	JumpCondInstr(JumpCondInstr),
	PhiInstr(PhiInstr),
	RetInstr(RetInstr),
	AllocInstr(AllocInstr),
	StoreInstr(StoreInstr),
	LoadInstr(LoadInstr),
	GEPInstr(GEPInstr),
	CallInstr(CallInstr),
}

macro_rules! impl_from_instr {
	($($variant:ident),*) => {
		$(
			impl From<$variant> for LlvmInstr {
				fn from(value: $variant) -> Self {
					LlvmInstr::$variant(value)
				}
			}
		)*
	};
}

impl_from_instr!(
	ArithInstr,
	CompInstr,
	ConvertInstr,
	JumpInstr,
	JumpCondInstr,
	PhiInstr,
	RetInstr,
	AllocInstr,
	StoreInstr,
	LoadInstr,
	GEPInstr,
	CallInstr
);

impl LlvmInstr {
	pub fn as_trait(&self) -> &dyn LlvmInstrTrait {
		match self {
			Self::ArithInstr(v) => v,
			Self::CompInstr(v) => v,
			Self::ConvertInstr(v) => v,
			Self::JumpInstr(v) => v,
			Self::JumpCondInstr(v) => v,
			Self::PhiInstr(v) => v,
			Self::RetInstr(v) => v,
			Self::AllocInstr(v) => v,
			Self::StoreInstr(v) => v,
			Self::LoadInstr(v) => v,
			Self::GEPInstr(v) => v,
			Self::CallInstr(v) => v,
		}
	}
	pub fn as_trait_mut(&mut self) -> &mut dyn LlvmInstrTrait {
		match self {
			Self::ArithInstr(v) => v,
			Self::CompInstr(v) => v,
			Self::ConvertInstr(v) => v,
			Self::JumpInstr(v) => v,
			Self::JumpCondInstr(v) => v,
			Self::PhiInstr(v) => v,
			Self::RetInstr(v) => v,
			Self::AllocInstr(v) => v,
			Self::StoreInstr(v) => v,
			Self::LoadInstr(v) => v,
			Self::GEPInstr(v) => v,
			Self::CallInstr(v) => v,
		}
	}
	pub fn category(&self) -> InstrCategory {
		match self {
			Self::PhiInstr(_) => InstrCategory::Phi,
			Self::LoadInstr(_) => InstrCategory::Memory(MemoryAccess::Load),
			Self::StoreInstr(_) => InstrCategory::Memory(MemoryAccess::Store),
			Self::CallInstr(_) => InstrCategory::Call,
			Self::JumpInstr(_) | Self::JumpCondInstr(_) | Self::RetInstr(_) => {
				InstrCategory::Terminator
			}
			Self::ArithInstr(_)
			| Self::CompInstr(_)
			| Self::ConvertInstr(_)
			| Self::AllocInstr(_)
			| Self::GEPInstr(_) => InstrCategory::Other,
		}
	}
	pub fn get_read(&self) -> Vec<Temp> {
		self.as_trait().get_read()
	}
	pub fn get_write(&self) -> Option<Temp> {
		self.as_trait().get_write()
	}
	pub fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		self.as_trait_mut().map_temp(map)
	}
	pub fn set_write(&mut self, temp: Temp) {
		self.as_trait_mut().set_write(temp)
	}
	pub fn get_label(&self) -> Vec<BlockId> {
		self.as_trait().get_label()
	}
	pub fn map_label(&mut self, map: &mut dyn FnMut(BlockId) -> BlockId) {
		self.as_trait_mut().map_label(map)
	}
	pub fn type_valid(&self) -> bool {
		self.as_trait().type_valid()
	}
	pub fn is_phi(&self) -> bool {
		matches!(self, Self::PhiInstr(_))
	}
	pub fn is_terminator(&self) -> bool {
		self.category() == InstrCategory::Terminator
	}
	pub fn is_ret(&self) -> bool {
		matches!(self, Self::RetInstr(_))
	}
	pub fn is_memory_access(&self) -> bool {
		matches!(self.category(), InstrCategory::Memory(_))
	}
}

impl Display for LlvmInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.as_trait())
	}
}
