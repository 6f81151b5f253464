pub mod llvminstr;
pub mod llvmop;
pub mod llvmvar;
pub mod temp;

mod impls;
mod utils_llvm;

pub use llvminstr::*;
pub use llvmop::*;
pub use llvmvar::*;
pub use temp::*;
pub use utils_llvm::*;

/// Stable id of a basic block inside its function; 0 is the entry block.
pub type BlockId = usize;

#[cfg(test)]
mod tests {
	use super::*;
	use utils::Label;

	#[test]
	fn test_read_per_use() {
		let i = Temp::new("i", VarType::I32, false);
		let instr: LlvmInstr = ArithInstr {
			target: Temp::new("sq", VarType::I32, false),
			op: ArithOp::Mul,
			var_type: VarType::I32,
			lhs: i.clone().into(),
			rhs: i.clone().into(),
		}
		.into();
		assert_eq!(instr.get_read(), vec![i.clone(), i]);
		assert_eq!(instr.category(), InstrCategory::Other);
		assert!(instr.type_valid());
	}

	#[test]
	fn test_map_temp_and_label() {
		let n = Temp::new("n", VarType::I32, false);
		let mut phi: LlvmInstr = PhiInstr {
			target: Temp::new("i", VarType::I32, false),
			var_type: VarType::I32,
			source: vec![(Value::Int(0), 0), (n.clone().into(), 2)],
		}
		.into();
		phi.map_temp(&mut |t| (t == &n).then_some(Value::Int(7)));
		phi.map_label(&mut |b| b + 10);
		assert_eq!(phi.to_string(), "%i = phi i32 [0, %B10], [7, %B12]");
		assert!(phi.get_read().is_empty());
	}

	#[test]
	fn test_display_call() {
		let call: LlvmInstr = CallInstr {
			target: None,
			var_type: VarType::Void,
			func: Label::new("putint"),
			params: vec![(VarType::I32, Value::Int(3))],
		}
		.into();
		assert_eq!(call.to_string(), "call void @putint(i32 3)");
		assert_eq!(call.category(), InstrCategory::Call);
		assert!(call.get_write().is_none());
	}
}
