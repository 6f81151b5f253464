use thiserror::Error;

#[derive(Error, Debug)]
pub enum RrvmError {
	#[error("ill-formed loop: {0}")]
	IllFormedLoop(String),
	#[error("incompatible exit predicate: {0}")]
	IncompatiblePredicate(String),
	#[error("invalid partition: {0}")]
	PartitionError(String),
	#[error("not applicable: {0}")]
	NotApplicable(String),
	#[error("unsupported: {0}")]
	Unsupported(String),
	#[error("simulation failed: {0}")]
	SimulationError(String),
	#[error("system error: {0}")]
	SystemError(String),
}

pub type Result<T, E = RrvmError> = std::result::Result<T, E>;

pub fn map_sys_err(e: std::io::Error) -> RrvmError {
	RrvmError::SystemError(e.to_string())
}
