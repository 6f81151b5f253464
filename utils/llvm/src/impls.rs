use std::fmt::Display;

use utils::to_label;

use crate::{
	llvminstr::*,
	llvmop::{LlvmOp, Value},
	llvmvar::VarType,
	temp::Temp,
	utils_llvm::*,
	BlockId,
};

impl Display for ArithInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {}, {}",
			self.target, self.op, self.var_type, self.lhs, self.rhs
		)
	}
}

impl LlvmInstrTrait for ArithInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.lhs, &self.rhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.lhs, map);
		map_value(&mut self.rhs, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		all_equal(&[
			self.var_type,
			self.op.oprand_type(),
			self.lhs.get_type(),
			self.rhs.get_type(),
		])
	}
}

impl Display for CompInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {} {}, {}",
			self.target, self.kind, self.op, self.var_type, self.lhs, self.rhs
		)
	}
}

impl LlvmInstrTrait for CompInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.lhs, &self.rhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.lhs, map);
		map_value(&mut self.rhs, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		all_equal(&[
			self.var_type,
			self.kind.oprand_type(),
			self.op.oprand_type(),
			self.lhs.get_type(),
			self.rhs.get_type(),
		])
	}
}

impl Display for ConvertInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {} to {}",
			self.target, self.op, self.from_type, self.lhs, self.to_type
		)
	}
}

impl LlvmInstrTrait for ConvertInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.lhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.lhs, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		self.op.type_to() == self.to_type
			&& all_equal(&[self.from_type, self.op.type_from(), self.lhs.get_type()])
	}
}

impl Display for JumpInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "br label %{}", to_label(self.target))
	}
}

impl LlvmInstrTrait for JumpInstr {
	fn get_label(&self) -> Vec<BlockId> {
		vec![self.target]
	}
	fn map_label(&mut self, map: &mut dyn FnMut(BlockId) -> BlockId) {
		self.target = map(self.target);
	}
}

impl Display for JumpCondInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"br i1 {}, label %{}, label %{}",
			self.cond,
			to_label(self.target_true),
			to_label(self.target_false)
		)
	}
}

impl LlvmInstrTrait for JumpCondInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.cond])
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.cond, map);
	}
	fn get_label(&self) -> Vec<BlockId> {
		vec![self.target_true, self.target_false]
	}
	fn map_label(&mut self, map: &mut dyn FnMut(BlockId) -> BlockId) {
		self.target_true = map(self.target_true);
		self.target_false = map(self.target_false);
	}
}

impl Display for PhiInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let source = self
			.source
			.iter()
			.map(|(value, label)| format!("[{}, %{}]", value, to_label(*label)))
			.collect::<Vec<_>>()
			.join(", ");
		write!(f, "{} = phi {} {}", self.target, self.var_type, source)
	}
}

impl LlvmInstrTrait for PhiInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values(self.source.iter().map(|(v, _)| v))
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		for (value, _) in self.source.iter_mut() {
			map_value(value, map);
		}
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn get_label(&self) -> Vec<BlockId> {
		self.source.iter().map(|(_, label)| *label).collect()
	}
	fn map_label(&mut self, map: &mut dyn FnMut(BlockId) -> BlockId) {
		for (_, label) in self.source.iter_mut() {
			*label = map(*label);
		}
	}
	fn type_valid(&self) -> bool {
		self.source.iter().all(|(v, _)| v.get_type() == self.var_type)
	}
}

impl PhiInstr {
	pub fn get_incoming(&self, block: BlockId) -> Option<&Value> {
		self.source.iter().find(|(_, b)| *b == block).map(|(v, _)| v)
	}
}

impl Display for RetInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match &self.value {
			Some(value) => write!(f, "ret {} {}", value.get_type(), value),
			None => write!(f, "ret void"),
		}
	}
}

impl LlvmInstrTrait for RetInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values(self.value.iter())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		if let Some(value) = self.value.as_mut() {
			map_value(value, map);
		}
	}
}

impl Display for AllocInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = alloca {}, i32 {}",
			self.target,
			self.var_type.deref_type(),
			self.length
		)
	}
}

impl LlvmInstrTrait for AllocInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.length])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.length, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		self.var_type.is_ptr() && self.length.get_type() == VarType::I32
	}
}

impl Display for StoreInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"store {} {}, {} {}",
			self.value.get_type(),
			self.value,
			self.addr.get_type(),
			self.addr
		)
	}
}

impl LlvmInstrTrait for StoreInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.value, &self.addr])
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.value, map);
		map_value(&mut self.addr, map);
	}
	fn type_valid(&self) -> bool {
		self.addr.get_type().is_ptr()
	}
}

impl Display for LoadInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = load {}, {} {}",
			self.target,
			self.var_type,
			self.addr.get_type(),
			self.addr
		)
	}
}

impl LlvmInstrTrait for LoadInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.addr])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.addr, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		self.addr.get_type().is_ptr()
	}
}

impl Display for GEPInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = getelementptr {}, {} {}, i32 {}",
			self.target,
			self.var_type.deref_type(),
			self.addr.get_type(),
			self.addr,
			self.offset
		)
	}
}

impl LlvmInstrTrait for GEPInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values([&self.addr, &self.offset])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		map_value(&mut self.addr, map);
		map_value(&mut self.offset, map);
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = temp;
	}
	fn type_valid(&self) -> bool {
		self.addr.get_type().is_ptr() && self.offset.get_type() == VarType::I32
	}
}

impl Display for CallInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let params = self
			.params
			.iter()
			.map(|(ty, value)| format!("{} {}", ty, value))
			.collect::<Vec<_>>()
			.join(", ");
		if let Some(target) = &self.target {
			write!(f, "{} = ", target)?;
		}
		write!(f, "call {} @{}({})", self.var_type, self.func, params)
	}
}

impl LlvmInstrTrait for CallInstr {
	fn get_read(&self) -> Vec<Temp> {
		read_values(self.params.iter().map(|(_, v)| v))
	}
	fn get_write(&self) -> Option<Temp> {
		self.target.clone()
	}
	fn map_temp(&mut self, map: &mut dyn FnMut(&Temp) -> Option<Value>) {
		for (_, value) in self.params.iter_mut() {
			map_value(value, map);
		}
	}
	fn set_write(&mut self, temp: Temp) {
		self.target = Some(temp);
	}
	fn type_valid(&self) -> bool {
		self.params.iter().all(|(ty, v)| *ty == v.get_type())
			&& self.target.as_ref().map_or(true, |t| t.var_type == self.var_type)
	}
}
