pub mod config;
mod driver;
pub mod indvar;
pub mod oracle;
pub mod parallel;
pub mod pdg;
pub mod sccdag;
pub mod sccdag_attrs;

use rrvm::program::LlvmProgram;
use utils::errors::Result;

pub use config::{ParallelizerConfig, SchemeKind};
pub use driver::Parallelizer;

pub trait RrvmOptimizer {
	fn new() -> Self;
	fn apply(self, program: &mut LlvmProgram) -> Result<bool>;
}
