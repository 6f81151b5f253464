use std::fmt::Display;

use crate::{func::LlvmFunc, program::LlvmProgram};

impl Display for LlvmFunc {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let params = self
			.params
			.iter()
			.map(|v| format!("{} {}", v.var_type, v))
			.collect::<Vec<_>>()
			.join(", ");
		writeln!(f, "define {} @{}({}) {{", self.ret_type, self.name, params)?;
		for bb in self.blocks.values() {
			writeln!(f, "{}:", bb.label())?;
			for id in bb.instr_ids() {
				writeln!(f, "  {}", self.instr(id))?;
			}
		}
		write!(f, "}}")
	}
}

impl Display for LlvmProgram {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let funcs =
			self.funcs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n\n");
		writeln!(f, "{}", funcs)
	}
}
