use std::fmt::Display;

use rrvm_derive::Fuyuki;

use crate::{llvmvar::VarType, temp::Temp};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Int(i32),
	Float(f32),
	Temp(Temp),
}

pub trait LlvmOp: Display {
	fn oprand_type(&self) -> VarType;
}

#[derive(Fuyuki, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
	Add,
	Sub,
	#[style("sdiv")]
	Div,
	Mul,
	// modulo
	#[style("srem")]
	Rem,
	// Float add
	Fadd,
	// Float sub
	Fsub,
	// Float div
	Fdiv,
	// Float mul
	Fmul,
	// shift left
	Shl,
	// arithmetic shift right
	Ashr,
	And,
	Or,
	Xor,
}

#[derive(Fuyuki, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompOp {
	EQ,
	NE,
	// signed greater than
	SGT,
	// signed greater or equal
	SGE,
	// signed less than
	SLT,
	// signed less or equal
	SLE,
	// ordered and equal
	OEQ,
	// ordered and not equal
	ONE,
	// ordered and greater than
	OGT,
	// ordered and greater or equal
	OGE,
	// ordered and less than
	OLT,
	// ordered and less or equal
	OLE,
}

#[derive(Fuyuki, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompKind {
	Icmp,
	Fcmp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConvertOp {
	Int2Float,
	Float2Int,
}

impl Value {
	pub fn get_type(&self) -> VarType {
		match self {
			Self::Int(_) => VarType::I32,
			Self::Float(_) => VarType::F32,
			Self::Temp(v) => v.var_type,
		}
	}
	pub fn unwrap_temp(&self) -> Option<Temp> {
		match self {
			Self::Temp(v) => Some(v.clone()),
			_ => None,
		}
	}
	pub fn as_temp(&self) -> Option<&Temp> {
		match self {
			Self::Temp(v) => Some(v),
			_ => None,
		}
	}
	pub fn as_int(&self) -> Option<i32> {
		match self {
			Self::Int(v) => Some(*v),
			_ => None,
		}
	}
	pub fn is_constant(&self) -> bool {
		!matches!(self, Self::Temp(_))
	}
	pub fn is_temp(&self, temp: &Temp) -> bool {
		matches!(self, Self::Temp(v) if v == temp)
	}
}

impl From<Temp> for Value {
	fn from(value: Temp) -> Self {
		Self::Temp(value)
	}
}

impl From<&Temp> for Value {
	fn from(value: &Temp) -> Self {
		Self::Temp(value.clone())
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Int(v) => write!(f, "{}", v),
			Self::Float(v) => write!(f, "{:?}", v),
			Self::Temp(v) => write!(f, "{}", v),
		}
	}
}

impl LlvmOp for ArithOp {
	fn oprand_type(&self) -> VarType {
		match self {
			Self::Fadd | Self::Fsub | Self::Fdiv | Self::Fmul => VarType::F32,
			_ => VarType::I32,
		}
	}
}

impl ArithOp {
	pub fn is_commutative(&self) -> bool {
		matches!(
			self,
			Self::Add
				| Self::Mul | Self::Fadd
				| Self::Fmul | Self::And
				| Self::Or | Self::Xor
		)
	}
}

impl LlvmOp for CompOp {
	fn oprand_type(&self) -> VarType {
		match self {
			Self::EQ | Self::NE | Self::SGT | Self::SGE | Self::SLT | Self::SLE => {
				VarType::I32
			}
			_ => VarType::F32,
		}
	}
}

impl CompOp {
	/// The predicate that holds exactly when `self` does not.
	pub fn inverse(&self) -> CompOp {
		match self {
			Self::EQ => Self::NE,
			Self::NE => Self::EQ,
			Self::SGT => Self::SLE,
			Self::SGE => Self::SLT,
			Self::SLT => Self::SGE,
			Self::SLE => Self::SGT,
			Self::OEQ => Self::ONE,
			Self::ONE => Self::OEQ,
			Self::OGT => Self::OLE,
			Self::OGE => Self::OLT,
			Self::OLT => Self::OGE,
			Self::OLE => Self::OGT,
		}
	}
	/// The predicate to use once the two operands trade places.
	pub fn swapped(&self) -> CompOp {
		match self {
			Self::SGT => Self::SLT,
			Self::SGE => Self::SLE,
			Self::SLT => Self::SGT,
			Self::SLE => Self::SGE,
			Self::OGT => Self::OLT,
			Self::OGE => Self::OLE,
			Self::OLT => Self::OGT,
			Self::OLE => Self::OGE,
			_ => *self,
		}
	}
	pub fn is_float(&self) -> bool {
		self.oprand_type() == VarType::F32
	}
}

impl LlvmOp for CompKind {
	fn oprand_type(&self) -> VarType {
		match self {
			Self::Icmp => VarType::I32,
			Self::Fcmp => VarType::F32,
		}
	}
}

impl Display for ConvertOp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Int2Float => write!(f, "sitofp"),
			Self::Float2Int => write!(f, "fptosi"),
		}
	}
}

impl ConvertOp {
	pub fn type_from(&self) -> VarType {
		match self {
			Self::Float2Int => VarType::F32,
			Self::Int2Float => VarType::I32,
		}
	}
	pub fn type_to(&self) -> VarType {
		match self {
			Self::Float2Int => VarType::I32,
			Self::Int2Float => VarType::F32,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_inverse_and_swap() {
		let ops = [
			CompOp::EQ,
			CompOp::NE,
			CompOp::SGT,
			CompOp::SGE,
			CompOp::SLT,
			CompOp::SLE,
		];
		for op in ops {
			assert_eq!(op.inverse().inverse(), op);
			assert_eq!(op.swapped().swapped(), op);
		}
		assert_eq!(CompOp::SLT.inverse(), CompOp::SGE);
		assert_eq!(CompOp::SLT.swapped(), CompOp::SGT);
		assert_eq!(CompOp::EQ.swapped(), CompOp::EQ);
	}

	#[test]
	fn test_op_display() {
		assert_eq!(CompOp::SGE.to_string(), "sge");
		assert_eq!(ArithOp::Div.to_string(), "sdiv");
		assert_eq!(CompKind::Icmp.to_string(), "icmp");
	}
}
