//! External functions: the io library, the pure helpers and the parallel
//! runtime the generated code calls into. Dispatchers run workers and
//! stages one after another, so queues never block.

use std::collections::VecDeque;

use log::debug;
use utils::{
	errors::Result, DOALL_DISPATCHER, QUEUE_POP_32, QUEUE_POP_64,
	QUEUE_PUSH_32, QUEUE_PUSH_64, STAGE_DISPATCHER,
};

use crate::{
	inout::{putch, putint},
	simulator::{fault, Simulator, StackValue},
};

fn arg(name: &str, args: &[StackValue], index: usize) -> Result<StackValue> {
	args.get(index).copied().ok_or_else(|| {
		fault(format!("`{}` expects argument {}", name, index + 1))
	})
}

fn func_ptr(value: StackValue) -> Result<usize> {
	match value {
		StackValue::Func(index) => Ok(index),
		other => Err(fault(format!("calling {:?}", other))),
	}
}

impl<'a> Simulator<'a> {
	pub(crate) fn call_external(
		&mut self,
		name: &str,
		args: &[StackValue],
	) -> Result<Option<StackValue>> {
		let int = |index: usize| arg(name, args, index)?.as_i32();
		match name {
			"putint" => Ok(putint(&mut self.output, int(0)?)),
			"putch" => Ok(putch(&mut self.output, int(0)?)),
			"getch" => Ok(Some(self.input.getch().into())),
			"getint" => self
				.input
				.getint()
				.map(|v| Some(v.into()))
				.ok_or_else(|| fault("getint found no integer")),
			"abs" => Ok(Some(int(0)?.wrapping_abs().into())),
			"min" => Ok(Some(int(0)?.min(int(1)?).into())),
			"max" => Ok(Some(int(0)?.max(int(1)?).into())),
			QUEUE_PUSH_32 | QUEUE_PUSH_64 => {
				let queue = self.queue(arg(name, args, 0)?)?;
				queue.push_back(arg(name, args, 1)?);
				Ok(None)
			}
			QUEUE_POP_32 | QUEUE_POP_64 => {
				let queue = self.queue(arg(name, args, 0)?)?;
				queue
					.pop_front()
					.map(Some)
					.ok_or_else(|| fault("pop from an empty queue"))
			}
			DOALL_DISPATCHER => {
				self.doall_dispatcher(args)?;
				Ok(None)
			}
			STAGE_DISPATCHER => {
				self.stage_dispatcher(args)?;
				Ok(None)
			}
			_ => Err(fault(format!("call to unknown function `{}`", name))),
		}
	}

	fn queue(&mut self, handle: StackValue) -> Result<&mut VecDeque<StackValue>> {
		match handle {
			StackValue::Queue(index) if index < self.queues.len() => {
				Ok(&mut self.queues[index])
			}
			other => Err(fault(format!("{:?} is not a queue", other))),
		}
	}

	/// `doall_dispatcher(env, worker, workers, chunk)` runs worker ids
	/// `0..workers` in turn.
	fn doall_dispatcher(&mut self, args: &[StackValue]) -> Result<()> {
		let name = DOALL_DISPATCHER;
		let env = arg(name, args, 0)?;
		let worker = func_ptr(arg(name, args, 1)?)?;
		let workers = arg(name, args, 2)?.as_i32()?;
		let chunk = arg(name, args, 3)?;
		debug!("{}: {} workers", name, workers);
		for id in 0..workers {
			self.call_index(
				worker,
				vec![env, id.into(), workers.into(), chunk],
			)?;
		}
		Ok(())
	}

	/// `stage_dispatcher(env, widths, stages, stage_count, queue_count)`
	/// builds the queue array and runs every stage to completion in order.
	fn stage_dispatcher(&mut self, args: &[StackValue]) -> Result<()> {
		let name = STAGE_DISPATCHER;
		let env = arg(name, args, 0)?;
		let widths = arg(name, args, 1)?.as_ptr()?;
		let stages = arg(name, args, 2)?.as_ptr()?;
		let stage_count = arg(name, args, 3)?.as_i32()? as usize;
		let queue_count = arg(name, args, 4)?.as_i32()? as usize;

		let first = self.queues.len();
		let queue_array = self.alloc(queue_count);
		for offset in 0..queue_count {
			let width = self.load(widths + offset)?.as_i32()?;
			if width != 32 && width != 64 {
				return Err(fault(format!("queue of width {}", width)));
			}
			self.queues.push(VecDeque::new());
			self.memory[queue_array + offset] = StackValue::Queue(first + offset);
		}
		debug!("{}: {} stages, {} queues", name, stage_count, queue_count);
		for offset in 0..stage_count {
			let stage = func_ptr(self.load(stages + offset)?)?;
			self.call_index(stage, vec![env, StackValue::Ptr(queue_array)])?;
		}
		for (index, queue) in self.queues.drain(first..).enumerate() {
			if !queue.is_empty() {
				return Err(fault(format!(
					"queue {} left with {} values",
					index,
					queue.len()
				)));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use llvm::TempManager;
	use rrvm::program::LlvmProgram;

	#[test]
	fn test_queues() {
		let program = LlvmProgram::new(TempManager::new());
		let mut sim = Simulator::new(&program);
		sim.queues.push(VecDeque::new());
		let q = StackValue::Queue(0);
		sim.call_external(QUEUE_PUSH_32, &[q, 5.into()]).unwrap();
		sim.call_external(QUEUE_PUSH_32, &[q, 6.into()]).unwrap();
		let pop = |sim: &mut Simulator| sim.call_external(QUEUE_POP_32, &[q]);
		assert_eq!(pop(&mut sim).unwrap(), Some(5.into()));
		assert_eq!(pop(&mut sim).unwrap(), Some(6.into()));
		assert!(pop(&mut sim).is_err());
		assert!(sim.call_external("putint", &[StackValue::Ptr(0)]).is_err());
		sim.call_external("putch", &[('a' as i32).into()]).unwrap();
		assert_eq!(sim.output, vec!["a"]);
	}
}
