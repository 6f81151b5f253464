use llvm::*;
use utils::Label;

use crate::func::{InstrId, LlvmFunc};

/// Appends instructions to one block at a time, naming every result with a
/// fresh temp from the manager.
pub struct LlvmGen<'a> {
	pub func: &'a mut LlvmFunc,
	pub temp_mgr: &'a mut TempManager,
	pub block: BlockId,
	pending_name: Option<String>,
}

impl<'a> LlvmGen<'a> {
	pub fn new(
		func: &'a mut LlvmFunc,
		temp_mgr: &'a mut TempManager,
		block: BlockId,
	) -> Self {
		Self {
			func,
			temp_mgr,
			block,
			pending_name: None,
		}
	}
	pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
		self.block = block;
		self
	}
	pub fn new_block(&mut self) -> BlockId {
		self.func.new_basicblock(1.0)
	}
	/// Names the result of the next instruction.
	pub fn named(&mut self, name: &str) -> &mut Self {
		self.pending_name = Some(name.to_string());
		self
	}
	fn new_temp(&mut self, var_type: VarType) -> Temp {
		match self.pending_name.take() {
			Some(name) => self.temp_mgr.new_temp_with_name(name, var_type),
			None => self.temp_mgr.new_temp(var_type, false),
		}
	}
	pub fn emit(&mut self, instr: impl Into<LlvmInstr>) -> InstrId {
		self.func.push(self.block, instr)
	}
	pub fn visit_arith_instr(&mut self, lhs: Value, op: ArithOp, rhs: Value) -> Temp {
		let target = self.new_temp(op.oprand_type());
		self.emit(ArithInstr {
			target: target.clone(),
			var_type: op.oprand_type(),
			lhs,
			op,
			rhs,
		});
		target
	}
	pub fn visit_comp_instr(&mut self, lhs: Value, op: CompOp, rhs: Value) -> Temp {
		let target = self.new_temp(VarType::I32);
		let kind = if op.is_float() {
			CompKind::Fcmp
		} else {
			CompKind::Icmp
		};
		self.emit(CompInstr {
			kind,
			target: target.clone(),
			op,
			var_type: op.oprand_type(),
			lhs,
			rhs,
		});
		target
	}
	pub fn visit_alloc_instr(&mut self, var_type: VarType, length: Value) -> Temp {
		let target = self.new_temp(var_type);
		self.emit(AllocInstr {
			target: target.clone(),
			var_type,
			length,
		});
		target
	}
	pub fn visit_gep_instr(&mut self, addr: Value, offset: Value) -> Temp {
		let var_type = addr.get_type();
		let target = self.new_temp(var_type);
		self.emit(GEPInstr {
			target: target.clone(),
			var_type,
			addr,
			offset,
		});
		target
	}
	pub fn visit_load_instr(&mut self, addr: Value) -> Temp {
		let var_type = addr.get_type().deref_type();
		self.visit_load_typed(var_type, addr)
	}
	pub fn visit_load_typed(&mut self, var_type: VarType, addr: Value) -> Temp {
		let target = self.new_temp(var_type);
		self.emit(LoadInstr {
			target: target.clone(),
			var_type,
			addr,
		});
		target
	}
	pub fn visit_store_instr(&mut self, value: Value, addr: Value) -> InstrId {
		self.emit(StoreInstr { value, addr })
	}
	pub fn visit_call_instr(
		&mut self,
		var_type: VarType,
		func: &str,
		params: Vec<Value>,
	) -> Option<Temp> {
		let target = (var_type != VarType::Void).then(|| self.new_temp(var_type));
		self.emit(CallInstr {
			target: target.clone(),
			var_type,
			func: Label::new(func),
			params: params.into_iter().map(|v| (v.get_type(), v)).collect(),
		});
		target
	}
	pub fn visit_phi_instr(
		&mut self,
		var_type: VarType,
		source: Vec<(Value, BlockId)>,
	) -> (InstrId, Temp) {
		let target = self.new_temp(var_type);
		let id = self.emit(PhiInstr {
			target: target.clone(),
			var_type,
			source,
		});
		(id, target)
	}
	pub fn add_incoming(&mut self, phi: InstrId, value: Value, block: BlockId) {
		if let LlvmInstr::PhiInstr(phi) = self.func.instr_mut(phi) {
			phi.source.push((value, block));
		}
	}
	pub fn visit_jump_instr(&mut self, target: BlockId) {
		self.emit(JumpInstr { target });
	}
	pub fn visit_jump_cond_instr(
		&mut self,
		cond: Value,
		target_true: BlockId,
		target_false: BlockId,
	) {
		self.emit(JumpCondInstr {
			var_type: VarType::I32,
			cond,
			target_true,
			target_false,
		});
	}
	pub fn visit_ret_instr(&mut self, value: Option<Value>) {
		self.emit(RetInstr { value });
	}
	/// Finishes construction: recomputes the block edges.
	pub fn visit_end(self) {
		self.func.rebuild_edges();
	}
}
