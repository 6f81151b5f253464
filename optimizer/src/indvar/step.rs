use std::collections::HashMap;

use llvm::{
	ArithInstr, ArithOp, BlockId, LlvmInstr, Temp, TempManager, Value, VarType,
};
use rrvm::LlvmFunc;

use crate::oracle::StepExpr;

#[derive(Clone, Debug, PartialEq)]
pub enum StepKind {
	Constant(i32),
	// a single value defined outside the loop
	Invariant(Value),
	// commutative add/mul tree over loop invariant leaves
	Composite(StepExpr),
}

impl StepKind {
	/// Classifies a recurrence step; `None` when some leaf varies inside the
	/// loop.
	pub fn classify(
		expr: StepExpr,
		is_invariant: impl Fn(&Temp) -> bool,
	) -> Option<Self> {
		match expr {
			StepExpr::Constant(c) => Some(Self::Constant(c)),
			StepExpr::Unknown(t) => {
				is_invariant(&t).then(|| Self::Invariant(t.into()))
			}
			composite => {
				let invariant = composite.leaves().into_iter().all(is_invariant);
				invariant.then_some(Self::Composite(composite))
			}
		}
	}

	pub fn as_constant(&self) -> Option<i32> {
		match self {
			Self::Constant(c) => Some(*c),
			_ => None,
		}
	}

	/// The step as a single value, unless it needs to be composed first.
	pub fn simple_value(&self) -> Option<Value> {
		match self {
			Self::Constant(c) => Some(Value::Int(*c)),
			Self::Invariant(v) => Some(v.clone()),
			Self::Composite(_) => None,
		}
	}
}

/// Detached instructions computing a composite step. Nothing is placed in
/// a function until `materialize`, so an unused expansion is just dropped.
#[derive(Clone, Debug)]
pub struct Expansion {
	pub instrs: Vec<LlvmInstr>,
	pub result: Value,
}

impl Expansion {
	/// One left-to-right chain per add/mul node, constants folded first.
	pub fn new(expr: &StepExpr, temp_mgr: &mut TempManager) -> Self {
		let mut instrs = Vec::new();
		let result = Self::emit(&expr.clone().fold(), temp_mgr, &mut instrs);
		Self { instrs, result }
	}

	fn emit(
		expr: &StepExpr,
		temp_mgr: &mut TempManager,
		out: &mut Vec<LlvmInstr>,
	) -> Value {
		let (op, items) = match expr {
			StepExpr::Constant(c) => return Value::Int(*c),
			StepExpr::Unknown(t) => return Value::Temp(t.clone()),
			StepExpr::Add(items) => (ArithOp::Add, items),
			StepExpr::Mul(items) => (ArithOp::Mul, items),
		};
		let mut values: Vec<Value> =
			items.iter().map(|e| Self::emit(e, temp_mgr, out)).collect();
		let mut acc = values.remove(0);
		for value in values {
			let target = temp_mgr.new_temp(VarType::I32, false);
			out.push(
				ArithInstr {
					target: target.clone(),
					op,
					var_type: VarType::I32,
					lhs: acc,
					rhs: value,
				}
				.into(),
			);
			acc = target.into();
		}
		acc
	}

	/// Places the chain at the end of `block`, with the leaves rewritten
	/// through `remap`, and returns the value of the step.
	pub fn materialize(
		self,
		func: &mut LlvmFunc,
		block: BlockId,
		remap: &HashMap<Temp, Value>,
	) -> Value {
		for mut instr in self.instrs {
			instr.map_temp(&mut |t| remap.get(t).cloned());
			func.push(block, instr);
		}
		match &self.result {
			Value::Temp(t) => remap.get(t).cloned().unwrap_or(self.result),
			_ => self.result,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn unknown(name: &str) -> StepExpr {
		StepExpr::Unknown(Temp::new(name, VarType::I32, false))
	}

	#[test]
	fn test_classify() {
		let invariant = |t: &Temp| t.name != "x";
		assert_eq!(
			StepKind::classify(StepExpr::Constant(4), invariant),
			Some(StepKind::Constant(4))
		);
		assert!(matches!(
			StepKind::classify(unknown("k"), invariant),
			Some(StepKind::Invariant(_))
		));
		assert_eq!(StepKind::classify(unknown("x"), invariant), None);
		let composite = StepExpr::Add(vec![unknown("k"), unknown("x")]);
		assert_eq!(StepKind::classify(composite, invariant), None);
	}

	#[test]
	fn test_expansion_chain() {
		// (k + m + 2) * 3
		let expr = StepExpr::Mul(vec![
			StepExpr::Add(vec![unknown("k"), unknown("m"), StepExpr::Constant(2)]),
			StepExpr::Constant(3),
		]);
		let mut mgr = TempManager::new();
		let expansion = Expansion::new(&expr, &mut mgr);
		let text: Vec<String> = expansion.instrs.iter().map(|i| i.to_string()).collect();
		assert_eq!(
			text,
			vec![
				"%1 = add i32 %k, %m",
				"%2 = add i32 %1, 2",
				"%3 = mul i32 3, %2",
			]
		);
		assert_eq!(expansion.result.to_string(), "%3");

		let mut func = LlvmFunc::new("f", VarType::Void, vec![]);
		let k = Temp::new("k.env", VarType::I32, false);
		let remap = HashMap::from([(Temp::new("k", VarType::I32, false), Value::Temp(k))]);
		let result = expansion.materialize(&mut func, 0, &remap);
		assert_eq!(result.to_string(), "%3");
		assert_eq!(func.instr(func.block(0).instrs[0]).to_string(), "%1 = add i32 %k.env, %m");
	}
}
