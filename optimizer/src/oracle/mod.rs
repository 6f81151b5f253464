//! Questions the dependence analysis asks about the program. Every oracle
//! may answer conservatively; only `NoAlias` and `NoModRef` ever remove a
//! dependence.

mod alias;
mod post_dom;
mod recurrence;

use llvm::BlockId;
use rrvm::{rrvm_loop::Loop, InstrId, LlvmFunc};
use rrvm_derive::SnakeDisplay;

pub use alias::*;
pub use recurrence::*;

#[derive(SnakeDisplay, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AliasResult {
	NoAlias,
	MayAlias,
	MustAlias,
	PartialAlias,
}

#[derive(SnakeDisplay, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModRefResult {
	NoModRef,
	Ref,
	Mod,
	ModRef,
}

impl ModRefResult {
	pub fn may_ref(&self) -> bool {
		matches!(self, Self::Ref | Self::ModRef)
	}
	pub fn may_mod(&self) -> bool {
		matches!(self, Self::Mod | Self::ModRef)
	}
}

pub trait AliasOracle {
	/// Relation between the locations touched by two memory accesses.
	fn alias(&self, func: &LlvmFunc, a: InstrId, b: InstrId) -> AliasResult;
}

pub trait ModRefOracle {
	/// How `call` may touch the location accessed by `location`, which is a
	/// load, a store or another call.
	fn mod_ref(
		&self,
		func: &LlvmFunc,
		call: InstrId,
		location: InstrId,
	) -> ModRefResult;
}

pub trait PostDominance {
	/// Whether every path from `b` to the function exit passes through `a`.
	fn post_dominates(&self, a: BlockId, b: BlockId) -> bool;
}

pub trait ClosedFormOracle {
	fn recurrence(
		&self,
		func: &LlvmFunc,
		phi: InstrId,
		loop_: &Loop,
	) -> Option<Recurrence>;
}

/// Knows nothing: everything may alias and every call may read and write
/// everything.
#[derive(Default, Clone, Copy)]
pub struct ConservativeOracle;

impl AliasOracle for ConservativeOracle {
	fn alias(&self, _func: &LlvmFunc, _a: InstrId, _b: InstrId) -> AliasResult {
		AliasResult::MayAlias
	}
}

impl ModRefOracle for ConservativeOracle {
	fn mod_ref(
		&self,
		_func: &LlvmFunc,
		_call: InstrId,
		_location: InstrId,
	) -> ModRefResult {
		ModRefResult::ModRef
	}
}
