//! Small programs with the loop shapes the parallelizer cares about. Every
//! program has a `main` returning a checksum, so a transformed program can
//! be compared with the original one by running both.

use llvm::*;

use crate::{
	func::{InstrId, LlvmFunc},
	llvmgen::LlvmGen,
	program::LlvmProgram,
};

pub struct Sample {
	pub name: &'static str,
	pub description: &'static str,
	pub build: fn() -> LlvmProgram,
}

pub const SAMPLE_LEN: i32 = 100;

pub fn all_samples() -> Vec<Sample> {
	vec![
		Sample {
			name: "array_scale",
			description: "b[i] = a[i] * 3 + i over local arrays, then a sum",
			build: || array_scale(SAMPLE_LEN),
		},
		Sample {
			name: "param_scale",
			description: "the same kernel over pointer parameters",
			build: || param_scale(SAMPLE_LEN),
		},
		Sample {
			name: "countdown",
			description: "decrementing induction variable",
			build: || countdown(SAMPLE_LEN),
		},
		Sample {
			name: "dual_iv",
			description: "a second induction variable with a composite step",
			build: || dual_iv(SAMPLE_LEN, 3, 4),
		},
		Sample {
			name: "eq_exit",
			description: "loop leaving on i == n",
			build: || eq_exit(SAMPLE_LEN),
		},
		Sample {
			name: "sum_squares",
			description: "reduction, a pipeline candidate",
			build: || sum_squares(SAMPLE_LEN),
		},
		Sample {
			name: "pipeline_io",
			description: "loop printing every element while summing",
			build: || pipeline_io(10),
		},
		Sample {
			name: "shared_cell",
			description: "a callee reading the cell each iteration writes",
			build: || shared_cell(10),
		},
		Sample {
			name: "last_index",
			description: "stride-3 loop whose counter is read afterwards",
			build: || last_index(SAMPLE_LEN),
		},
		Sample {
			name: "nested",
			description: "two-level loop nest writing a matrix",
			build: || nested(12, 9),
		},
	]
}

pub fn find_sample(name: &str) -> Option<Sample> {
	all_samples().into_iter().find(|s| s.name == name)
}

pub struct CountedLoop {
	pub header: BlockId,
	pub body: BlockId,
	pub latch: BlockId,
	pub exit: BlockId,
	pub phi: InstrId,
	pub iv: Temp,
	pub carried: Vec<Temp>,
}

/// Emits `for (iv = start; iv op bound; iv += step) body` from the current
/// block and leaves the generator in the exit block. `carried` values become
/// header phis; `body` returns their values for the next iteration.
#[allow(clippy::too_many_arguments)]
pub fn counted_loop(
	gen: &mut LlvmGen,
	name: &str,
	start: Value,
	op: CompOp,
	bound: Value,
	step: i32,
	carried: Vec<(&str, Value)>,
	body: impl FnOnce(&mut LlvmGen, &Temp, &[Temp]) -> Vec<Value>,
) -> CountedLoop {
	let pre = gen.block;
	let header = gen.new_block();
	let body_bb = gen.new_block();
	let exit = gen.new_block();
	gen.visit_jump_instr(header);

	gen.switch_to(header);
	let (phi, iv) =
		gen.named(name).visit_phi_instr(VarType::I32, vec![(start, pre)]);
	let mut carried_phis = Vec::new();
	for (carried_name, init) in carried {
		let var_type = init.get_type();
		let phi = gen.named(carried_name).visit_phi_instr(var_type, vec![(init, pre)]);
		carried_phis.push(phi);
	}
	let cond = gen.named(&format!("{}.cond", name)).visit_comp_instr(
		iv.clone().into(),
		op,
		bound,
	);
	gen.visit_jump_cond_instr(cond.into(), body_bb, exit);

	gen.switch_to(body_bb);
	let carried_temps: Vec<Temp> =
		carried_phis.iter().map(|(_, t)| t.clone()).collect();
	let next_values = body(gen, &iv, &carried_temps);
	let latch = gen.block;
	let next = gen.named(&format!("{}.next", name)).visit_arith_instr(
		iv.clone().into(),
		ArithOp::Add,
		Value::Int(step),
	);
	gen.visit_jump_instr(header);
	gen.add_incoming(phi, next.into(), latch);
	for ((phi, _), value) in carried_phis.iter().zip(next_values) {
		gen.add_incoming(*phi, value, latch);
	}
	gen.switch_to(exit);
	CountedLoop {
		header,
		body: body_bb,
		latch,
		exit,
		phi,
		iv,
		carried: carried_temps,
	}
}

fn new_program(funcs: Vec<LlvmFunc>, temp_mgr: TempManager) -> LlvmProgram {
	let mut program = LlvmProgram::new(temp_mgr);
	program.funcs = funcs;
	program
}

fn int_array(gen: &mut LlvmGen, name: &str, len: i32) -> Temp {
	gen.named(name).visit_alloc_instr(VarType::I32Ptr, Value::Int(len))
}

/// `a[i] = i * 2`
fn emit_fill(gen: &mut LlvmGen, a: &Temp, n: Value) {
	counted_loop(gen, "f", 0.into(), CompOp::SLT, n, 1, vec![], |gen, i, _| {
		let v = gen.visit_arith_instr(i.into(), ArithOp::Mul, 2.into());
		let p = gen.visit_gep_instr(a.into(), i.into());
		gen.visit_store_instr(v.into(), p.into());
		vec![]
	});
}

/// `s = sum(a[0..n])`, left in the exit block of the loop.
fn emit_sum(gen: &mut LlvmGen, a: &Temp, n: Value) -> Temp {
	let l = counted_loop(
		gen,
		"k",
		0.into(),
		CompOp::SLT,
		n,
		1,
		vec![("s", 0.into())],
		|gen, k, carried| {
			let p = gen.visit_gep_instr(a.into(), k.into());
			let v = gen.visit_load_instr(p.into());
			let s = gen
				.named("s.next")
				.visit_arith_instr(carried[0].clone().into(), ArithOp::Add, v.into());
			vec![s.into()]
		},
	);
	l.carried[0].clone()
}

fn emit_scale_body(gen: &mut LlvmGen, a: &Temp, b: &Temp, i: &Temp) {
	let pa = gen.named("pa").visit_gep_instr(a.into(), i.into());
	let v = gen.named("v").visit_load_instr(pa.into());
	let w = gen.named("w").visit_arith_instr(v.into(), ArithOp::Mul, 3.into());
	let x = gen.named("x").visit_arith_instr(w.into(), ArithOp::Add, i.into());
	let pb = gen.named("pb").visit_gep_instr(b.into(), i.into());
	gen.visit_store_instr(x.into(), pb.into());
}

/// `for (i = 0; i < n; i++) b[i] = a[i] * 3 + i;` on arrays local to main.
pub fn array_scale(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let a = int_array(&mut gen, "a", n);
	let b = int_array(&mut gen, "b", n);
	emit_fill(&mut gen, &a, n.into());
	counted_loop(&mut gen, "i", 0.into(), CompOp::SLT, n.into(), 1, vec![], {
		let (a, b) = (a.clone(), b.clone());
		move |gen, i, _| {
			emit_scale_body(gen, &a, &b, i);
			vec![]
		}
	});
	let s = emit_sum(&mut gen, &b, n.into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// The `array_scale` kernel moved into `scale(a, b, n)`.
pub fn param_scale(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let a = temp_mgr.new_temp_with_name("pa.arg", VarType::I32Ptr);
	let b = temp_mgr.new_temp_with_name("pb.arg", VarType::I32Ptr);
	let len = temp_mgr.new_temp_with_name("n", VarType::I32);
	let mut scale = LlvmFunc::new(
		"scale",
		VarType::Void,
		vec![a.clone(), b.clone(), len.clone()],
	);
	let mut gen = LlvmGen::new(&mut scale, &mut temp_mgr, 0);
	counted_loop(&mut gen, "i", 0.into(), CompOp::SLT, len.into(), 1, vec![], {
		move |gen, i, _| {
			emit_scale_body(gen, &a, &b, i);
			vec![]
		}
	});
	gen.visit_ret_instr(None);
	gen.visit_end();

	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let a = int_array(&mut gen, "a", n);
	let b = int_array(&mut gen, "b", n);
	emit_fill(&mut gen, &a, n.into());
	gen.visit_call_instr(
		VarType::Void,
		"scale",
		vec![a.into(), b.clone().into(), n.into()],
	);
	let s = emit_sum(&mut gen, &b, n.into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![scale, main], temp_mgr)
}

/// `for (i = n - 1; i >= 0; i--) b[i] = 3 * i + 1;`
pub fn countdown(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let b = int_array(&mut gen, "b", n);
	counted_loop(
		&mut gen,
		"i",
		(n - 1).into(),
		CompOp::SGE,
		0.into(),
		-1,
		vec![],
		{
			let b = b.clone();
			move |gen, i, _| {
				let v = gen.visit_arith_instr(i.into(), ArithOp::Mul, 3.into());
				let v = gen.visit_arith_instr(v.into(), ArithOp::Add, 1.into());
				let p = gen.visit_gep_instr(b.into(), i.into());
				gen.visit_store_instr(v.into(), p.into());
				vec![]
			}
		},
	);
	let s = emit_sum(&mut gen, &b, n.into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// `j = 0; for (i = 0; i < n; i++) { b[i] = j; j = (j + k) + m; }` inside
/// `dual(b, n, k, m)`; the step of `j` is the composite `k + m`.
pub fn dual_iv(n: i32, k: i32, m: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let b = temp_mgr.new_temp_with_name("b.arg", VarType::I32Ptr);
	let len = temp_mgr.new_temp_with_name("n", VarType::I32);
	let kk = temp_mgr.new_temp_with_name("k", VarType::I32);
	let mm = temp_mgr.new_temp_with_name("m", VarType::I32);
	let mut dual = LlvmFunc::new(
		"dual",
		VarType::Void,
		vec![b.clone(), len.clone(), kk.clone(), mm.clone()],
	);
	let mut gen = LlvmGen::new(&mut dual, &mut temp_mgr, 0);
	counted_loop(
		&mut gen,
		"i",
		0.into(),
		CompOp::SLT,
		len.into(),
		1,
		vec![("j", 0.into())],
		move |gen, i, carried| {
			let j = &carried[0];
			let p = gen.visit_gep_instr(b.into(), i.into());
			gen.visit_store_instr(j.into(), p.into());
			let t = gen.named("j.k").visit_arith_instr(j.into(), ArithOp::Add, kk.into());
			let next =
				gen.named("j.next").visit_arith_instr(t.into(), ArithOp::Add, mm.into());
			vec![next.into()]
		},
	);
	gen.visit_ret_instr(None);
	gen.visit_end();

	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let b = int_array(&mut gen, "b", n);
	gen.visit_call_instr(
		VarType::Void,
		"dual",
		vec![b.clone().into(), n.into(), k.into(), m.into()],
	);
	let s = emit_sum(&mut gen, &b, n.into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![dual, main], temp_mgr)
}

/// `for (i = 0; !(i == n); i++) b[i] = i;` with the exit on the true edge.
pub fn eq_exit(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let b = int_array(&mut gen, "b", n);
	let header = gen.new_block();
	let body = gen.new_block();
	let exit = gen.new_block();
	gen.visit_jump_instr(header);
	gen.switch_to(header);
	let (phi, i) = gen.named("i").visit_phi_instr(VarType::I32, vec![(0.into(), 0)]);
	let cond = gen.visit_comp_instr(i.clone().into(), CompOp::EQ, n.into());
	gen.visit_jump_cond_instr(cond.into(), exit, body);
	gen.switch_to(body);
	let p = gen.visit_gep_instr(b.clone().into(), i.clone().into());
	gen.visit_store_instr(i.clone().into(), p.into());
	let next = gen.visit_arith_instr(i.into(), ArithOp::Add, 1.into());
	gen.visit_jump_instr(header);
	gen.add_incoming(phi, next.into(), body);
	gen.switch_to(exit);
	let s = emit_sum(&mut gen, &b, n.into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// `s = 0; for (i = 0; i < n; i++) s += a[i] * a[i] + 18;`
pub fn sum_squares(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let a = int_array(&mut gen, "a", n);
	emit_fill(&mut gen, &a, n.into());
	let l = counted_loop(
		&mut gen,
		"i",
		0.into(),
		CompOp::SLT,
		n.into(),
		1,
		vec![("s", 0.into())],
		{
			let a = a.clone();
			move |gen, i, carried| {
				let p = gen.named("p").visit_gep_instr(a.into(), i.into());
				let v = gen.named("v").visit_load_instr(p.into());
				let sq = gen.named("sq").visit_arith_instr(v.clone().into(), ArithOp::Mul, v.into());
				let t = gen.named("t").visit_arith_instr(sq.into(), ArithOp::Add, 18.into());
				let s = gen
					.named("s.next")
					.visit_arith_instr(carried[0].clone().into(), ArithOp::Add, t.into());
				vec![s.into()]
			}
		},
	);
	gen.visit_ret_instr(Some(l.carried[0].clone().into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// `for (i = 0; i < n; i++) { w = a[i] * a[i]; putint(w); s += w; }`
pub fn pipeline_io(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let a = int_array(&mut gen, "a", n);
	emit_fill(&mut gen, &a, n.into());
	let l = counted_loop(
		&mut gen,
		"i",
		0.into(),
		CompOp::SLT,
		n.into(),
		1,
		vec![("s", 0.into())],
		{
			let a = a.clone();
			move |gen, i, carried| {
				let p = gen.visit_gep_instr(a.into(), i.into());
				let v = gen.named("v").visit_load_instr(p.into());
				let w = gen.named("w").visit_arith_instr(v.clone().into(), ArithOp::Mul, v.into());
				gen.visit_call_instr(VarType::Void, "putint", vec![w.clone().into()]);
				let s = gen
					.named("s.next")
					.visit_arith_instr(carried[0].clone().into(), ArithOp::Add, w.into());
				vec![s.into()]
			}
		},
	);
	gen.visit_ret_instr(Some(l.carried[0].clone().into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// `show(p) { putint(*p); }`, called as `*cell = i; show(cell);` in every
/// iteration of a loop over `i < n`.
pub fn shared_cell(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let p = temp_mgr.new_temp_with_name("p", VarType::I32Ptr);
	let mut show = LlvmFunc::new("show", VarType::Void, vec![p.clone()]);
	let mut gen = LlvmGen::new(&mut show, &mut temp_mgr, 0);
	let v = gen.named("v").visit_load_instr(p.into());
	gen.visit_call_instr(VarType::Void, "putint", vec![v.into()]);
	gen.visit_ret_instr(None);
	gen.visit_end();

	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let cell = int_array(&mut gen, "cell", 1);
	let l = counted_loop(
		&mut gen,
		"i",
		0.into(),
		CompOp::SLT,
		n.into(),
		1,
		vec![("s", 0.into())],
		{
			let cell = cell.clone();
			move |gen, i, carried| {
				gen.visit_store_instr(i.into(), cell.clone().into());
				gen.visit_call_instr(VarType::Void, "show", vec![cell.into()]);
				let s = gen
					.named("s.next")
					.visit_arith_instr(carried[0].clone().into(), ArithOp::Add, i.into());
				vec![s.into()]
			}
		},
	);
	gen.visit_ret_instr(Some(l.carried[0].clone().into()));
	gen.visit_end();
	new_program(vec![show, main], temp_mgr)
}

/// `for (i = 0; i < n; i += 3) b[i] = i + 1; return i * 1000 + sum(b);`
pub fn last_index(n: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let b = int_array(&mut gen, "b", n);
	let l = counted_loop(&mut gen, "i", 0.into(), CompOp::SLT, n.into(), 3, vec![], {
		let b = b.clone();
		move |gen, i, _| {
			let v = gen.visit_arith_instr(i.into(), ArithOp::Add, 1.into());
			let p = gen.visit_gep_instr(b.into(), i.into());
			gen.visit_store_instr(v.into(), p.into());
			vec![]
		}
	});
	let high = gen.visit_arith_instr(l.iv.into(), ArithOp::Mul, 1000.into());
	let s = emit_sum(&mut gen, &b, n.into());
	let r = gen.visit_arith_instr(high.into(), ArithOp::Add, s.into());
	gen.visit_ret_instr(Some(r.into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

/// `for (i < n) for (j < m) c[i * m + j] = i + 2 * j;`
pub fn nested(n: i32, m: i32) -> LlvmProgram {
	let mut temp_mgr = TempManager::new();
	let mut main = LlvmFunc::new("main", VarType::I32, vec![]);
	let mut gen = LlvmGen::new(&mut main, &mut temp_mgr, 0);
	let c = int_array(&mut gen, "c", n * m);
	counted_loop(&mut gen, "i", 0.into(), CompOp::SLT, n.into(), 1, vec![], {
		let c = c.clone();
		move |gen, i, _| {
			let row = gen.named("row").visit_arith_instr(i.into(), ArithOp::Mul, m.into());
			counted_loop(gen, "j", 0.into(), CompOp::SLT, m.into(), 1, vec![], {
				let i = i.clone();
				move |gen, j, _| {
					let idx = gen.visit_arith_instr(row.into(), ArithOp::Add, j.into());
					let jj = gen.visit_arith_instr(j.into(), ArithOp::Mul, 2.into());
					let v = gen.visit_arith_instr(i.into(), ArithOp::Add, jj.into());
					let p = gen.visit_gep_instr(c.into(), idx.into());
					gen.visit_store_instr(v.into(), p.into());
					vec![]
				}
			});
			vec![]
		}
	});
	let s = emit_sum(&mut gen, &c, (n * m).into());
	gen.visit_ret_instr(Some(s.into()));
	gen.visit_end();
	new_program(vec![main], temp_mgr)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_every_sample_is_well_typed() {
		for sample in all_samples() {
			let program = (sample.build)();
			for func in program.funcs.iter() {
				for id in func.all_instrs() {
					let instr = func.instr(id);
					assert!(instr.type_valid(), "{}: {}", sample.name, instr);
				}
				for bb in func.blocks.values() {
					assert!(bb.jump_instr.is_some(), "{}: open block", sample.name);
				}
			}
		}
	}
}
