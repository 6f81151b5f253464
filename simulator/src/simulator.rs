use std::collections::{HashMap, VecDeque};

use llvm::{
	ArithInstr, ArithOp, CompInstr, CompOp, ConvertInstr, ConvertOp, LlvmInstr,
	Temp, Value,
};
use log::trace;
use rrvm::{program::LlvmProgram, LlvmFunc};
use utils::{errors::Result, RrvmError};

use crate::inout::InputStream;

/// Upper bound on executed instructions, so a broken pipeline fails instead
/// of spinning.
pub const DEFAULT_STEP_LIMIT: usize = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackValue {
	Int(i32),
	Float(f32),
	/// Index of a memory slot.
	Ptr(usize),
	/// Index of a function of the program.
	Func(usize),
	/// Handle of a runtime queue.
	Queue(usize),
}

impl Default for StackValue {
	fn default() -> Self {
		StackValue::Int(0)
	}
}

impl From<i32> for StackValue {
	fn from(value: i32) -> Self {
		StackValue::Int(value)
	}
}

impl From<f32> for StackValue {
	fn from(value: f32) -> Self {
		StackValue::Float(value)
	}
}

impl StackValue {
	pub fn as_i32(&self) -> Result<i32> {
		match self {
			StackValue::Int(v) => Ok(*v),
			_ => Err(type_error("i32", self)),
		}
	}

	pub fn as_f32(&self) -> Result<f32> {
		match self {
			StackValue::Float(v) => Ok(*v),
			_ => Err(type_error("f32", self)),
		}
	}

	pub fn as_ptr(&self) -> Result<usize> {
		match self {
			StackValue::Ptr(v) => Ok(*v),
			_ => Err(type_error("pointer", self)),
		}
	}
}

fn type_error(expected: &str, found: &StackValue) -> RrvmError {
	RrvmError::SimulationError(format!("expected {}, found {:?}", expected, found))
}

pub(crate) fn fault(msg: impl Into<String>) -> RrvmError {
	RrvmError::SimulationError(msg.into())
}

/// One executed store: the function it ran in, the slot and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
	pub func: String,
	pub addr: usize,
	pub value: StackValue,
}

struct FuncStackFrame {
	fp: usize,
	temp: HashMap<String, StackValue>,
}

/// Interpreter over an `LlvmProgram`. Memory is a flat array of slots, one
/// value each, so pointer arithmetic counts slots rather than bytes.
pub struct Simulator<'a> {
	program: &'a LlvmProgram,
	func_index: HashMap<String, usize>,
	pub memory: Vec<StackValue>,
	pub stores: Vec<StoreRecord>,
	pub output: Vec<String>,
	pub(crate) input: InputStream,
	pub(crate) queues: Vec<VecDeque<StackValue>>,
	pub step_count: usize,
	pub step_limit: usize,
}

impl<'a> Simulator<'a> {
	pub fn new(program: &'a LlvmProgram) -> Self {
		let func_index = program
			.funcs
			.iter()
			.enumerate()
			.map(|(index, func)| (func.name.clone(), index))
			.collect();
		Simulator {
			program,
			func_index,
			memory: Vec::new(),
			stores: Vec::new(),
			output: Vec::new(),
			input: InputStream::default(),
			queues: Vec::new(),
			step_count: 0,
			step_limit: DEFAULT_STEP_LIMIT,
		}
	}

	pub fn with_input(mut self, input: impl Into<String>) -> Self {
		self.input = InputStream::new(input.into());
		self
	}

	/// Runs `main` and returns its exit value.
	pub fn run_main(&mut self) -> Result<i32> {
		match self.call("main", Vec::new())? {
			Some(value) => value.as_i32(),
			None => Ok(0),
		}
	}

	pub fn call(
		&mut self,
		name: &str,
		args: Vec<StackValue>,
	) -> Result<Option<StackValue>> {
		let index = self
			.func_index
			.get(name)
			.copied()
			.ok_or_else(|| fault(format!("no function named `{}`", name)))?;
		self.call_index(index, args)
	}

	pub fn alloc(&mut self, len: usize) -> usize {
		let base = self.memory.len();
		self.memory.resize(base + len, StackValue::default());
		base
	}

	pub fn load(&self, addr: usize) -> Result<StackValue> {
		self.memory.get(addr).copied().ok_or_else(|| {
			fault(format!("load from slot {} out of {}", addr, self.memory.len()))
		})
	}

	pub(crate) fn call_index(
		&mut self,
		index: usize,
		args: Vec<StackValue>,
	) -> Result<Option<StackValue>> {
		let program = self.program;
		let func = &program.funcs[index];
		if func.params.len() != args.len() {
			return Err(fault(format!(
				"`{}` takes {} arguments, {} given",
				func.name,
				func.params.len(),
				args.len()
			)));
		}
		let mut frame = FuncStackFrame {
			fp: self.memory.len(),
			temp: func
				.params
				.iter()
				.map(|p| p.name.clone())
				.zip(args)
				.collect(),
		};
		let result = self.run_func(func, &mut frame);
		self.memory.truncate(frame.fp);
		result
	}

	fn run_func(
		&mut self,
		func: &LlvmFunc,
		frame: &mut FuncStackFrame,
	) -> Result<Option<StackValue>> {
		let mut last = None;
		let mut current = func.entry();
		loop {
			let block = func.blocks.get(&current).ok_or_else(|| {
				fault(format!("{}: jump to missing block {}", func.name, current))
			})?;
			trace!("{}: block {}", func.name, current);

			// phis read their sources before any of them is written
			let mut incoming = Vec::new();
			for &id in block.phi_instrs.iter() {
				let LlvmInstr::PhiInstr(phi) = func.instr(id) else {
					unreachable!()
				};
				let source = last.and_then(|bb| phi.get_incoming(bb)).ok_or_else(|| {
					fault(format!(
						"{}: `{}` has no value for the edge from {:?}",
						func.name, phi, last
					))
				})?;
				incoming.push((phi.target.name.clone(), self.get_stack(source, frame)?));
			}
			frame.temp.extend(incoming);

			for &id in block.instrs.iter() {
				self.tick()?;
				self.do_instr(func, func.instr(id), frame)?;
			}

			let jump = block.jump_instr.ok_or_else(|| {
				fault(format!("{}: block {} has no terminator", func.name, current))
			})?;
			self.tick()?;
			last = Some(current);
			current = match func.instr(jump) {
				LlvmInstr::JumpInstr(instr) => instr.target,
				LlvmInstr::JumpCondInstr(instr) => {
					match self.get_stack(&instr.cond, frame)?.as_i32()? {
						0 => instr.target_false,
						_ => instr.target_true,
					}
				}
				LlvmInstr::RetInstr(instr) => {
					return match &instr.value {
						Some(value) => Ok(Some(self.get_stack(value, frame)?)),
						None => Ok(None),
					};
				}
				other => {
					return Err(fault(format!(
						"{}: `{}` ends block {}",
						func.name, other, current
					)))
				}
			};
		}
	}

	fn tick(&mut self) -> Result<()> {
		self.step_count += 1;
		if self.step_count > self.step_limit {
			return Err(fault(format!("step limit {} exceeded", self.step_limit)));
		}
		Ok(())
	}

	fn do_instr(
		&mut self,
		func: &LlvmFunc,
		instr: &LlvmInstr,
		frame: &mut FuncStackFrame,
	) -> Result<()> {
		match instr {
			LlvmInstr::ArithInstr(instr) => {
				let value = self.do_arith_instr(instr, frame)?;
				frame.temp.insert(instr.target.name.clone(), value);
			}
			LlvmInstr::CompInstr(instr) => {
				let value = self.do_comp_instr(instr, frame)?;
				frame.temp.insert(instr.target.name.clone(), value);
			}
			LlvmInstr::ConvertInstr(instr) => {
				let value = self.do_convert_instr(instr, frame)?;
				frame.temp.insert(instr.target.name.clone(), value);
			}
			LlvmInstr::AllocInstr(instr) => {
				let len = self.get_stack(&instr.length, frame)?.as_i32()?;
				let len = usize::try_from(len)
					.map_err(|_| fault(format!("alloc of {} slots", len)))?;
				let base = self.alloc(len);
				frame.temp.insert(instr.target.name.clone(), StackValue::Ptr(base));
			}
			LlvmInstr::StoreInstr(instr) => {
				let addr = self.get_stack(&instr.addr, frame)?.as_ptr()?;
				let value = self.get_stack(&instr.value, frame)?;
				let slot = self.memory.get_mut(addr).ok_or_else(|| {
					fault(format!("{}: store to slot {}", func.name, addr))
				})?;
				*slot = value;
				self.stores.push(StoreRecord {
					func: func.name.clone(),
					addr,
					value,
				});
			}
			LlvmInstr::LoadInstr(instr) => {
				let addr = self.get_stack(&instr.addr, frame)?.as_ptr()?;
				let value = self.load(addr)?;
				frame.temp.insert(instr.target.name.clone(), value);
			}
			LlvmInstr::GEPInstr(instr) => {
				let base = self.get_stack(&instr.addr, frame)?.as_ptr()?;
				let offset = self.get_stack(&instr.offset, frame)?.as_i32()?;
				let addr = base
					.checked_add_signed(offset as isize)
					.ok_or_else(|| fault(format!("{}: negative address", func.name)))?;
				frame.temp.insert(instr.target.name.clone(), StackValue::Ptr(addr));
			}
			LlvmInstr::CallInstr(instr) => {
				let args = instr
					.params
					.iter()
					.map(|(_, value)| self.get_stack(value, frame))
					.collect::<Result<Vec<_>>>()?;
				let name = &instr.func.name;
				let result = match self.func_index.get(name) {
					Some(&index) => self.call_index(index, args)?,
					None => self.call_external(name, &args)?,
				};
				if let Some(target) = &instr.target {
					let value = result.ok_or_else(|| {
						fault(format!("{}: `{}` returned nothing", func.name, name))
					})?;
					frame.temp.insert(target.name.clone(), value);
				}
			}
			LlvmInstr::PhiInstr(_)
			| LlvmInstr::JumpInstr(_)
			| LlvmInstr::JumpCondInstr(_)
			| LlvmInstr::RetInstr(_) => {
				return Err(fault(format!(
					"{}: `{}` in a block body",
					func.name, instr
				)))
			}
		}
		Ok(())
	}

	fn get_stack(&self, value: &Value, frame: &FuncStackFrame) -> Result<StackValue> {
		match value {
			Value::Int(v) => Ok(StackValue::Int(*v)),
			Value::Float(v) => Ok(StackValue::Float(*v)),
			Value::Temp(t) if t.is_global => self.get_global(t),
			Value::Temp(t) => frame
				.temp
				.get(&t.name)
				.copied()
				.ok_or_else(|| fault(format!("use of undefined {}", t))),
		}
	}

	fn get_global(&self, temp: &Temp) -> Result<StackValue> {
		self
			.func_index
			.get(&temp.name)
			.map(|&index| StackValue::Func(index))
			.ok_or_else(|| fault(format!("unknown global {}", temp)))
	}

	fn do_arith_instr(
		&self,
		instr: &ArithInstr,
		frame: &FuncStackFrame,
	) -> Result<StackValue> {
		let lhs = self.get_stack(&instr.lhs, frame)?;
		let rhs = self.get_stack(&instr.rhs, frame)?;
		if matches!(
			instr.op,
			ArithOp::Fadd | ArithOp::Fsub | ArithOp::Fmul | ArithOp::Fdiv
		) {
			let (lhs, rhs) = (lhs.as_f32()?, rhs.as_f32()?);
			let value = match instr.op {
				ArithOp::Fadd => lhs + rhs,
				ArithOp::Fsub => lhs - rhs,
				ArithOp::Fmul => lhs * rhs,
				ArithOp::Fdiv => lhs / rhs,
				_ => unreachable!(),
			};
			return Ok(value.into());
		}
		let (lhs, rhs) = (lhs.as_i32()?, rhs.as_i32()?);
		let value = match instr.op {
			ArithOp::Add => lhs.wrapping_add(rhs),
			ArithOp::Sub => lhs.wrapping_sub(rhs),
			ArithOp::Mul => lhs.wrapping_mul(rhs),
			ArithOp::Div | ArithOp::Rem if rhs == 0 => {
				return Err(fault(format!("division by zero in `{}`", instr)))
			}
			ArithOp::Div => lhs.wrapping_div(rhs),
			ArithOp::Rem => lhs.wrapping_rem(rhs),
			ArithOp::Shl => lhs.wrapping_shl(rhs as u32),
			ArithOp::Ashr => lhs.wrapping_shr(rhs as u32),
			ArithOp::And => lhs & rhs,
			ArithOp::Or => lhs | rhs,
			ArithOp::Xor => lhs ^ rhs,
			ArithOp::Fadd | ArithOp::Fsub | ArithOp::Fmul | ArithOp::Fdiv => {
				unreachable!()
			}
		};
		Ok(value.into())
	}

	fn do_comp_instr(
		&self,
		instr: &CompInstr,
		frame: &FuncStackFrame,
	) -> Result<StackValue> {
		let lhs = self.get_stack(&instr.lhs, frame)?;
		let rhs = self.get_stack(&instr.rhs, frame)?;
		let value = match (lhs, rhs) {
			(StackValue::Float(l), StackValue::Float(r)) => compare(instr.op, l, r),
			(StackValue::Int(l), StackValue::Int(r)) => compare(instr.op, l, r),
			(StackValue::Ptr(l), StackValue::Ptr(r)) => compare(instr.op, l, r),
			_ => {
				return Err(fault(format!(
					"`{}` compares {:?} with {:?}",
					instr, lhs, rhs
				)))
			}
		};
		Ok((value as i32).into())
	}

	fn do_convert_instr(
		&self,
		instr: &ConvertInstr,
		frame: &FuncStackFrame,
	) -> Result<StackValue> {
		let value = self.get_stack(&instr.lhs, frame)?;
		Ok(match instr.op {
			ConvertOp::Int2Float => (value.as_i32()? as f32).into(),
			ConvertOp::Float2Int => (value.as_f32()? as i32).into(),
		})
	}
}

fn compare<T: PartialOrd>(op: CompOp, lhs: T, rhs: T) -> bool {
	match op {
		CompOp::EQ | CompOp::OEQ => lhs == rhs,
		CompOp::NE | CompOp::ONE => lhs != rhs,
		CompOp::SGT | CompOp::OGT => lhs > rhs,
		CompOp::SGE | CompOp::OGE => lhs >= rhs,
		CompOp::SLT | CompOp::OLT => lhs < rhs,
		CompOp::SLE | CompOp::OLE => lhs <= rhs,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rrvm::samples::*;

	#[test]
	fn test_samples_run() {
		// sum of a[i] * 3 + i with a[i] = 2i
		let program = array_scale(10);
		let mut sim = Simulator::new(&program);
		assert_eq!(sim.run_main().unwrap(), 7 * 45);
		assert_eq!(sim.stores.len(), 20);

		let program = sum_squares(4);
		let expected: i32 = (0..4).map(|i| 4 * i * i + 18).sum();
		assert_eq!(Simulator::new(&program).run_main().unwrap(), expected);

		let program = eq_exit(6);
		assert_eq!(Simulator::new(&program).run_main().unwrap(), 15);
	}

	#[test]
	fn test_calls_and_output() {
		let program = dual_iv(5, 3, 4);
		// j takes 0, 7, 14, 21, 28
		assert_eq!(Simulator::new(&program).run_main().unwrap(), 70);

		let program = pipeline_io(3);
		let mut sim = Simulator::new(&program);
		assert_eq!(sim.run_main().unwrap(), 20);
		assert_eq!(sim.output, vec!["0", "4", "16"]);
	}

	#[test]
	fn test_step_limit() {
		let program = nested(8, 8);
		let mut sim = Simulator::new(&program);
		sim.step_limit = 100;
		let err = sim.run_main().unwrap_err();
		assert!(err.to_string().contains("step limit"));
	}
}
