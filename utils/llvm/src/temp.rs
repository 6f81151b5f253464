use std::fmt::Display;

use crate::llvmvar::VarType;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temp {
	pub name: String,
	pub is_global: bool,
	pub var_type: VarType,
}

impl Display for Temp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		if self.is_global {
			write!(f, "@{}", self.name)
		} else {
			write!(f, "%{}", self.name)
		}
	}
}

impl Temp {
	pub fn new(name: impl Display, var_type: VarType, is_global: bool) -> Self {
		Self {
			name: name.to_string(),
			var_type,
			is_global,
		}
	}
	// address of a function, usable as a call argument
	pub fn function(name: impl Display) -> Self {
		Self::new(name, VarType::Ptr, true)
	}
}

#[derive(Default, Clone)]
pub struct TempManager {
	pub total: u32,
}

impl TempManager {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn new_temp(&mut self, var_type: VarType, is_global: bool) -> Temp {
		self.total += 1;
		Temp::new(self.total, var_type, is_global)
	}
	pub fn new_temp_with_name(
		&mut self,
		name: impl Display,
		var_type: VarType,
	) -> Temp {
		self.total += 1;
		Temp::new(name, var_type, false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fresh_names() {
		let mut mgr = TempManager::new();
		let a = mgr.new_temp(VarType::I32, false);
		let b = mgr.new_temp_with_name("b", VarType::Ptr);
		let c = mgr.new_temp(VarType::I32, false);
		assert_eq!(a.to_string(), "%1");
		assert_eq!(b.to_string(), "%b");
		assert_eq!(c.name, "3");
		let f = Temp::function("main.doall.1");
		assert_eq!(f.to_string(), "@main.doall.1");
		assert_eq!(f.var_type, VarType::Ptr);
	}
}
