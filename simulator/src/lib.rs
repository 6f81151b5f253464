mod inout;
mod runtime;
pub mod simulator;

pub use simulator::{Simulator, StackValue, StoreRecord};
