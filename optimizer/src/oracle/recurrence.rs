use std::{collections::HashMap, fmt::Display};

use llvm::{ArithOp, BlockId, LlvmInstr, Temp, Value};
use rrvm::{rrvm_loop::Loop, InstrId, LlvmFunc};
use rrvm_derive::SnakeDisplay;

use super::ClosedFormOracle;

/// Step term of a recurrence: a commutative sum or product tree over
/// constants and unknown values.
#[derive(Clone, Debug, PartialEq)]
pub enum StepExpr {
	Constant(i32),
	Unknown(Temp),
	Add(Vec<StepExpr>),
	Mul(Vec<StepExpr>),
}

impl StepExpr {
	pub fn as_constant(&self) -> Option<i32> {
		match self {
			Self::Constant(v) => Some(*v),
			_ => None,
		}
	}

	pub fn leaves(&self) -> Vec<&Temp> {
		match self {
			Self::Constant(_) => Vec::new(),
			Self::Unknown(t) => vec![t],
			Self::Add(v) | Self::Mul(v) => v.iter().flat_map(|e| e.leaves()).collect(),
		}
	}

	pub fn negate(self) -> StepExpr {
		Self::Mul(vec![Self::Constant(-1), self]).fold()
	}

	/// Flattens nested nodes of the same kind and folds constants: zero
	/// terms vanish from sums, unit factors vanish from products.
	pub fn fold(self) -> StepExpr {
		match self {
			Self::Add(terms) => {
				let mut constant = 0i32;
				let mut rest = Vec::new();
				for term in terms.into_iter().map(|t| t.fold()) {
					match term {
						Self::Constant(c) => constant = constant.wrapping_add(c),
						Self::Add(inner) => rest.extend(inner),
						other => rest.push(other),
					}
				}
				if constant != 0 {
					rest.push(Self::Constant(constant));
				}
				match rest.len() {
					0 => Self::Constant(0),
					1 => rest.remove(0),
					_ => Self::Add(rest),
				}
			}
			Self::Mul(factors) => {
				let mut constant = 1i32;
				let mut rest = Vec::new();
				for factor in factors.into_iter().map(|t| t.fold()) {
					match factor {
						Self::Constant(c) => constant = constant.wrapping_mul(c),
						Self::Mul(inner) => rest.extend(inner),
						other => rest.push(other),
					}
				}
				if constant == 0 {
					return Self::Constant(0);
				}
				if constant != 1 || rest.is_empty() {
					rest.insert(0, Self::Constant(constant));
				}
				match rest.len() {
					1 => rest.remove(0),
					_ => Self::Mul(rest),
				}
			}
			other => other,
		}
	}
}

impl Display for StepExpr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let join = |items: &[StepExpr], sep: &str| {
			items.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(sep)
		};
		match self {
			Self::Constant(v) => write!(f, "{}", v),
			Self::Unknown(t) => write!(f, "{}", t),
			Self::Add(v) => write!(f, "({})", join(v, " + ")),
			Self::Mul(v) => write!(f, "({})", join(v, " * ")),
		}
	}
}

#[derive(SnakeDisplay, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecurrenceKind {
	Additive,
	Geometric,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recurrence {
	pub kind: RecurrenceKind,
	pub start: Value,
	pub step: StepExpr,
}

/// Closed forms of header phis whose back edge value is reached from the
/// phi through additions and subtractions (additive), or through one
/// multiplication by a constant (geometric).
#[derive(Default, Clone, Copy)]
pub struct RecurrenceSolver;

struct Walker<'a> {
	func: &'a LlvmFunc,
	loop_: &'a Loop,
	def_map: HashMap<Temp, InstrId>,
	block_of: HashMap<InstrId, BlockId>,
	phi: &'a Temp,
}

impl<'a> Walker<'a> {
	/// Definition of `value` when it is computed inside the loop.
	fn def(&self, value: &Value) -> Option<&'a LlvmInstr> {
		let id = self.def_map.get(value.as_temp()?)?;
		let block = self.block_of.get(id)?;
		self.loop_.contains(*block).then(|| self.func.instr(*id))
	}

	fn reaches_phi(&self, value: &Value) -> bool {
		if value.is_temp(self.phi) {
			return true;
		}
		match self.def(value) {
			Some(LlvmInstr::ArithInstr(arith))
				if matches!(arith.op, ArithOp::Add | ArithOp::Sub) =>
			{
				self.reaches_phi(&arith.lhs) || self.reaches_phi(&arith.rhs)
			}
			_ => false,
		}
	}

	/// Terms added to the phi along the chain ending in `value`.
	fn additive(&self, value: &Value) -> Option<Vec<StepExpr>> {
		if value.is_temp(self.phi) {
			return Some(Vec::new());
		}
		let Some(LlvmInstr::ArithInstr(arith)) = self.def(value) else {
			return None;
		};
		match arith.op {
			ArithOp::Add => {
				let (chain, term) = if self.reaches_phi(&arith.lhs) {
					(&arith.lhs, &arith.rhs)
				} else {
					(&arith.rhs, &arith.lhs)
				};
				if self.reaches_phi(term) {
					return None;
				}
				let mut terms = self.additive(chain)?;
				terms.push(self.term(term)?);
				Some(terms)
			}
			ArithOp::Sub if !self.reaches_phi(&arith.rhs) => {
				let mut terms = self.additive(&arith.lhs)?;
				terms.push(self.term(&arith.rhs)?.negate());
				Some(terms)
			}
			_ => None,
		}
	}

	/// Expression of a value not depending on the phi. Values computed
	/// outside the loop stay opaque; float operands give up.
	fn term(&self, value: &Value) -> Option<StepExpr> {
		let expr = match value {
			Value::Int(v) => StepExpr::Constant(*v),
			Value::Float(_) => return None,
			Value::Temp(t) => match self.def(value) {
				Some(LlvmInstr::ArithInstr(arith)) => match arith.op {
					ArithOp::Add => StepExpr::Add(vec![
						self.term(&arith.lhs)?,
						self.term(&arith.rhs)?,
					]),
					ArithOp::Mul => StepExpr::Mul(vec![
						self.term(&arith.lhs)?,
						self.term(&arith.rhs)?,
					]),
					ArithOp::Sub => StepExpr::Add(vec![
						self.term(&arith.lhs)?,
						self.term(&arith.rhs)?.negate(),
					]),
					_ => StepExpr::Unknown(t.clone()),
				},
				_ => StepExpr::Unknown(t.clone()),
			},
		};
		Some(expr)
	}
}

impl ClosedFormOracle for RecurrenceSolver {
	fn recurrence(
		&self,
		func: &LlvmFunc,
		phi: InstrId,
		loop_: &Loop,
	) -> Option<Recurrence> {
		let LlvmInstr::PhiInstr(phi_instr) = func.instr(phi) else {
			return None;
		};
		if phi_instr.var_type != llvm::VarType::I32 {
			return None;
		}
		let (outside, inside): (Vec<&(Value, BlockId)>, Vec<_>) =
			phi_instr.source.iter().partition(|(_, b)| !loop_.contains(*b));
		let [(start, _)] = outside.as_slice() else {
			return None;
		};
		let (back, _) = inside.first()?;
		if inside.iter().any(|(v, _)| v != back) {
			return None;
		}
		let walker = Walker {
			func,
			loop_,
			def_map: func.def_map(),
			block_of: func.instr_block_map(),
			phi: &phi_instr.target,
		};
		if let Some(LlvmInstr::ArithInstr(arith)) = walker.def(back) {
			if arith.op == ArithOp::Mul {
				let factor = if arith.lhs.is_temp(&phi_instr.target) {
					&arith.rhs
				} else if arith.rhs.is_temp(&phi_instr.target) {
					&arith.lhs
				} else {
					return None;
				};
				return Some(Recurrence {
					kind: RecurrenceKind::Geometric,
					start: start.clone(),
					step: walker.term(factor)?.fold(),
				});
			}
		}
		let step = StepExpr::Add(walker.additive(back)?).fold();
		if step == StepExpr::Constant(0) {
			return None;
		}
		Some(Recurrence {
			kind: RecurrenceKind::Additive,
			start: start.clone(),
			step,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use llvm::VarType;

	fn unknown(name: &str) -> StepExpr {
		StepExpr::Unknown(Temp::new(name, VarType::I32, false))
	}

	#[test]
	fn test_fold_constants() {
		let e = StepExpr::Add(vec![
			StepExpr::Constant(2),
			StepExpr::Add(vec![StepExpr::Constant(3), StepExpr::Constant(-5)]),
		]);
		assert_eq!(e.fold(), StepExpr::Constant(0));
		let e = StepExpr::Mul(vec![StepExpr::Constant(1), unknown("k")]);
		assert_eq!(e.fold(), unknown("k"));
		let e = StepExpr::Mul(vec![StepExpr::Constant(0), unknown("k")]);
		assert_eq!(e.fold(), StepExpr::Constant(0));
	}

	#[test]
	fn test_fold_flattens() {
		let e = StepExpr::Add(vec![
			unknown("k"),
			StepExpr::Add(vec![unknown("m"), StepExpr::Constant(1)]),
		]);
		assert_eq!(
			e.fold(),
			StepExpr::Add(vec![unknown("k"), unknown("m"), StepExpr::Constant(1)])
		);
		assert_eq!(unknown("k").negate().to_string(), "(-1 * %k)");
	}

	fn header_recurrences(program: &rrvm::LlvmProgram, func: &str) -> Vec<(String, Recurrence)> {
		let func = program.get_func(func).unwrap();
		let loops = func.loop_analysis();
		let header = func.block(loops[0].header);
		header
			.phi_instrs
			.iter()
			.filter_map(|&phi| {
				let name = func.instr(phi).get_write().unwrap().name;
				RecurrenceSolver.recurrence(func, phi, &loops[0]).map(|r| (name, r))
			})
			.collect()
	}

	#[test]
	fn test_counting_and_composite_steps() {
		let program = rrvm::samples::dual_iv(10, 3, 4);
		let recs = header_recurrences(&program, "dual");
		assert_eq!(recs.len(), 2);
		let (_, i) = recs.iter().find(|(n, _)| n == "i").unwrap();
		assert_eq!(i.kind, RecurrenceKind::Additive);
		assert_eq!(i.step, StepExpr::Constant(1));
		assert_eq!(i.start, Value::Int(0));
		let (_, j) = recs.iter().find(|(n, _)| n == "j").unwrap();
		assert_eq!(j.step, StepExpr::Add(vec![unknown("k"), unknown("m")]));
	}

	#[test]
	fn test_decrementing_step() {
		let program = rrvm::samples::countdown(10);
		let recs = header_recurrences(&program, "main");
		assert_eq!(recs[0].1.step, StepExpr::Constant(-1));
		assert_eq!(recs[0].1.start, Value::Int(9));
	}

	#[test]
	fn test_reduction_is_not_a_recurrence() {
		// s += a[i] * a[i] + 18 adds a value loaded in the loop
		let program = rrvm::samples::sum_squares(10);
		let func = &program.funcs[0];
		let loops = func.loop_analysis();
		let s = func
			.block(loops[1].header)
			.phi_instrs
			.iter()
			.copied()
			.find(|&phi| func.instr(phi).get_write().unwrap().name == "s")
			.unwrap();
		let rec = RecurrenceSolver.recurrence(func, s, &loops[1]).unwrap();
		assert!(rec.step.leaves().iter().any(|t| t.name == "v"));
	}

	#[test]
	fn test_float_terms_give_up() {
		let program = rrvm::samples::countdown(10);
		let func = &program.funcs[0];
		let loops = func.loop_analysis();
		let LlvmInstr::PhiInstr(phi) = func.instr(func.block(loops[0].header).phi_instrs[0])
		else {
			panic!("header starts with a phi");
		};
		let walker = Walker {
			func,
			loop_: &loops[0],
			def_map: func.def_map(),
			block_of: func.instr_block_map(),
			phi: &phi.target,
		};
		assert_eq!(walker.term(&Value::Int(3)), Some(StepExpr::Constant(3)));
		assert_eq!(walker.term(&Value::Float(1.5)), None);
	}
}
