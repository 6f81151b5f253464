use llvm::{CallInstr, Temp, Value, VarType};
use rrvm::{InstrId, LlvmGen};
use utils::{Label, QUEUE_POP_32, QUEUE_POP_64, QUEUE_PUSH_32, QUEUE_PUSH_64};

/// One FIFO between two stages. `value` is `None` for a token queue, which
/// only orders memory accesses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueInfo {
	pub producer: InstrId,
	pub from_stage: usize,
	pub to_stage: usize,
	pub value: Option<Temp>,
}

impl QueueInfo {
	pub fn width(&self) -> u32 {
		match &self.value {
			Some(t) if t.var_type.bit_width() == 64 => 64,
			_ => 32,
		}
	}

	fn element_type(&self) -> VarType {
		match &self.value {
			Some(t) => t.var_type,
			None => VarType::I32,
		}
	}

	/// Pushes the produced value, or a dummy for a token queue.
	pub fn emit_push(&self, gen: &mut LlvmGen, handle: &Temp) {
		let func = match self.width() {
			64 => QUEUE_PUSH_64,
			_ => QUEUE_PUSH_32,
		};
		let value = match &self.value {
			Some(t) => Value::from(t),
			None => Value::Int(0),
		};
		gen.emit(CallInstr {
			target: None,
			var_type: VarType::Void,
			func: Label::new(func),
			params: vec![(VarType::Ptr, handle.into()), (value.get_type(), value)],
		});
	}

	/// Pops into the producer's own temp, so the consuming stage reads it
	/// under the same name.
	pub fn emit_pop(&self, gen: &mut LlvmGen, handle: &Temp) {
		let func = match self.width() {
			64 => QUEUE_POP_64,
			_ => QUEUE_POP_32,
		};
		let target = match &self.value {
			Some(t) => t.clone(),
			None => gen.temp_mgr.new_temp(VarType::I32, false),
		};
		gen.emit(CallInstr {
			target: Some(target),
			var_type: self.element_type(),
			func: Label::new(func),
			params: vec![(VarType::Ptr, handle.into())],
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use llvm::TempManager;
	use rrvm::LlvmFunc;

	#[test]
	fn test_queue_calls() {
		let mut temp_mgr = TempManager::new();
		let mut func = LlvmFunc::new("stage", VarType::Void, vec![]);
		let handle = Temp::new("q", VarType::Ptr, false);
		let queues = [
			QueueInfo {
				producer: InstrId(3),
				from_stage: 0,
				to_stage: 1,
				value: Some(Temp::new("v", VarType::I32, false)),
			},
			QueueInfo {
				producer: InstrId(4),
				from_stage: 0,
				to_stage: 2,
				value: Some(Temp::new("p", VarType::I32Ptr, false)),
			},
			QueueInfo {
				producer: InstrId(5),
				from_stage: 1,
				to_stage: 2,
				value: None,
			},
		];
		assert_eq!(
			queues.iter().map(QueueInfo::width).collect::<Vec<_>>(),
			vec![32, 64, 32]
		);
		let mut gen = LlvmGen::new(&mut func, &mut temp_mgr, 0);
		for queue in queues.iter() {
			queue.emit_push(&mut gen, &handle);
			queue.emit_pop(&mut gen, &handle);
		}
		let text: Vec<String> = func
			.block(0)
			.instrs
			.iter()
			.map(|&id| func.instr(id).to_string())
			.filter(|s| s.contains("pop"))
			.collect();
		assert!(text[0].starts_with("%v = call i32 @queue_pop32"));
		assert!(text[1].contains("@queue_pop64"));
		assert!(text[2].starts_with("%1 = call i32 @queue_pop32"));
	}
}
