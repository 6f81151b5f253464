use std::collections::HashMap;

use llvm::{LlvmInstr, Temp, Value};
use log::trace;
use rrvm::{InstrId, LlvmFunc};
use utils::{VEC_IO, VEC_PURE};

use super::{AliasOracle, AliasResult, ModRefOracle, ModRefResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BaseKind {
	Alloc,
	Param,
	Global,
}

#[derive(Clone, Debug, PartialEq)]
enum Offset {
	Const(i32),
	Temp(Temp),
	Unknown,
}

impl Offset {
	fn add(&self, offset: &Value) -> Offset {
		match (self, offset) {
			(Self::Const(a), Value::Int(b)) => Self::Const(a.wrapping_add(*b)),
			(Self::Const(0), Value::Temp(t)) => Self::Temp(t.clone()),
			(Self::Temp(t), Value::Int(0)) => Self::Temp(t.clone()),
			_ => Self::Unknown,
		}
	}
}

/// Maps every pointer temp to the object it points into: base 0 stands
/// for an unknown object.
pub struct PointerTracer {
	ptr_set: HashMap<Temp, (u32, Offset)>,
	kinds: HashMap<u32, BaseKind>,
	named: HashMap<String, u32>,
	last: u32,
}

impl PointerTracer {
	pub fn new(func: &LlvmFunc) -> Self {
		let mut tracer = Self {
			ptr_set: HashMap::new(),
			kinds: HashMap::new(),
			named: HashMap::new(),
			last: 0,
		};
		for param in func.params.iter().filter(|p| p.var_type.is_ptr()) {
			tracer.create(param, BaseKind::Param);
		}
		let def_map = func.def_map();
		let mut ptrs: Vec<&Temp> =
			def_map.keys().filter(|t| t.var_type.is_ptr()).collect();
		ptrs.sort();
		for ptr in ptrs {
			tracer.resolve(func, &def_map, ptr);
		}
		tracer
	}

	fn create(&mut self, ptr: &Temp, kind: BaseKind) -> (u32, Offset) {
		self.last += 1;
		self.kinds.insert(self.last, kind);
		let entry = (self.last, Offset::Const(0));
		self.ptr_set.insert(ptr.clone(), entry.clone());
		entry
	}

	fn resolve(
		&mut self,
		func: &LlvmFunc,
		def_map: &HashMap<Temp, InstrId>,
		ptr: &Temp,
	) -> (u32, Offset) {
		if let Some(entry) = self.ptr_set.get(ptr) {
			return entry.clone();
		}
		if ptr.is_global {
			let id = match self.named.get(&ptr.name) {
				Some(id) => *id,
				None => {
					let id = self.create(ptr, BaseKind::Global).0;
					self.named.insert(ptr.name.clone(), id);
					id
				}
			};
			return (id, Offset::Const(0));
		}
		let entry = match def_map.get(ptr).map(|id| func.instr(*id)) {
			Some(LlvmInstr::AllocInstr(_)) => return self.create(ptr, BaseKind::Alloc),
			Some(LlvmInstr::GEPInstr(gep)) => match &gep.addr {
				Value::Temp(addr) => {
					let (base, offset) = self.resolve(func, def_map, addr);
					(base, offset.add(&gep.offset))
				}
				_ => (0, Offset::Unknown),
			},
			_ => (0, Offset::Unknown),
		};
		self.ptr_set.insert(ptr.clone(), entry.clone());
		entry
	}

	fn get(&self, ptr: &Temp) -> (u32, Offset) {
		self.ptr_set.get(ptr).cloned().unwrap_or((0, Offset::Unknown))
	}
}

/// Base-pointer alias analysis: distinct allocations never alias, and
/// accesses into the same object alias exactly when their offsets match.
pub struct BasicAliasAnalysis {
	tracer: PointerTracer,
	assume_noalias_params: bool,
}

impl BasicAliasAnalysis {
	pub fn new(func: &LlvmFunc, assume_noalias_params: bool) -> Self {
		Self {
			tracer: PointerTracer::new(func),
			assume_noalias_params,
		}
	}

	fn address(instr: &LlvmInstr) -> Option<&Temp> {
		match instr {
			LlvmInstr::LoadInstr(load) => load.addr.as_temp(),
			LlvmInstr::StoreInstr(store) => store.addr.as_temp(),
			_ => None,
		}
	}

	fn callee(instr: &LlvmInstr) -> Option<&str> {
		match instr {
			LlvmInstr::CallInstr(call) => Some(call.func.name.as_str()),
			_ => None,
		}
	}
}

impl AliasOracle for BasicAliasAnalysis {
	fn alias(&self, func: &LlvmFunc, a: InstrId, b: InstrId) -> AliasResult {
		let (Some(pa), Some(pb)) = (
			Self::address(func.instr(a)),
			Self::address(func.instr(b)),
		) else {
			return AliasResult::MayAlias;
		};
		let (base_a, offset_a) = self.tracer.get(pa);
		let (base_b, offset_b) = self.tracer.get(pb);
		if base_a == 0 || base_b == 0 {
			return AliasResult::MayAlias;
		}
		if base_a != base_b {
			let kinds = (self.tracer.kinds[&base_a], self.tracer.kinds[&base_b]);
			return match kinds {
				(BaseKind::Param, BaseKind::Param) if !self.assume_noalias_params => {
					AliasResult::MayAlias
				}
				(BaseKind::Param, BaseKind::Global)
				| (BaseKind::Global, BaseKind::Param) => AliasResult::MayAlias,
				_ => AliasResult::NoAlias,
			};
		}
		let result = match (offset_a, offset_b) {
			(Offset::Const(x), Offset::Const(y)) if x == y => AliasResult::MustAlias,
			(Offset::Const(_), Offset::Const(_)) => AliasResult::NoAlias,
			(Offset::Temp(x), Offset::Temp(y)) if x == y => AliasResult::MustAlias,
			_ => AliasResult::MayAlias,
		};
		trace!("alias {} {}: {}", func.instr(a), func.instr(b), result);
		result
	}
}

impl ModRefOracle for BasicAliasAnalysis {
	fn mod_ref(
		&self,
		func: &LlvmFunc,
		call: InstrId,
		location: InstrId,
	) -> ModRefResult {
		let Some(callee) = Self::callee(func.instr(call)) else {
			return ModRefResult::ModRef;
		};
		if VEC_PURE.contains(&callee) {
			return ModRefResult::NoModRef;
		}
		match Self::callee(func.instr(location)) {
			// io calls stay ordered among themselves
			Some(other) if VEC_PURE.contains(&other) => ModRefResult::NoModRef,
			Some(_) => ModRefResult::ModRef,
			None if VEC_IO.contains(&callee) => ModRefResult::NoModRef,
			None => ModRefResult::ModRef,
		}
	}
}
