use llvm::TempManager;

use crate::func::LlvmFunc;

pub struct LlvmProgram {
	pub funcs: Vec<LlvmFunc>,
	pub temp_mgr: TempManager,
}

impl LlvmProgram {
	pub fn new(temp_mgr: TempManager) -> Self {
		Self {
			funcs: Vec::new(),
			temp_mgr,
		}
	}
	pub fn get_func(&self, name: &str) -> Option<&LlvmFunc> {
		self.funcs.iter().find(|f| f.name == name)
	}
}
