pub mod basicblock;
pub mod cfg;
pub mod dominator;
pub mod func;
pub mod impls;
pub mod llvmgen;
pub mod program;
pub mod rrvm_loop;
pub mod samples;

pub use basicblock::BasicBlock;
pub use func::{InstrId, LlvmFunc};
pub use llvmgen::LlvmGen;
pub use program::LlvmProgram;
