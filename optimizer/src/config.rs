use std::{fmt::Display, str::FromStr};

use utils::{
	RrvmError, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_LOOP_COST, DEFAULT_WORKERS,
};

use crate::{
	parallel::{Doall, Dswp, ParallelizationScheme},
	sccdag_attrs::PartitionHints,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeKind {
	Doall,
	Dswp,
}

impl Display for SchemeKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Doall => write!(f, "doall"),
			Self::Dswp => write!(f, "dswp"),
		}
	}
}

impl FromStr for SchemeKind {
	type Err = RrvmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"doall" => Ok(Self::Doall),
			"dswp" => Ok(Self::Dswp),
			_ => Err(RrvmError::Unsupported(format!("unknown scheme `{s}`"))),
		}
	}
}

#[derive(Clone, Debug)]
pub struct ParallelizerConfig {
	pub workers: i32,
	pub chunk_size: i32,
	/// Tried in order; the first scheme accepting a loop takes it.
	pub schemes: Vec<SchemeKind>,
	pub assume_noalias_params: bool,
	/// Loops cheaper than this are left alone.
	pub min_loop_cost: usize,
	pub hints: PartitionHints,
}

impl Default for ParallelizerConfig {
	fn default() -> Self {
		Self {
			workers: DEFAULT_WORKERS as i32,
			chunk_size: DEFAULT_CHUNK_SIZE as i32,
			schemes: vec![SchemeKind::Doall, SchemeKind::Dswp],
			assume_noalias_params: false,
			min_loop_cost: DEFAULT_MIN_LOOP_COST,
			hints: PartitionHints::new(),
		}
	}
}

impl ParallelizerConfig {
	pub fn only(mut self, scheme: SchemeKind) -> Self {
		self.schemes = vec![scheme];
		self
	}

	pub fn build_schemes(&self) -> Vec<Box<dyn ParallelizationScheme>> {
		self
			.schemes
			.iter()
			.map(|kind| -> Box<dyn ParallelizationScheme> {
				match kind {
					SchemeKind::Doall => {
						Box::new(Doall::new(self.workers, self.chunk_size))
					}
					SchemeKind::Dswp => Box::new(Dswp::new(self.hints.clone())),
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scheme_order() {
		let config = ParallelizerConfig::default();
		let names: Vec<_> =
			config.build_schemes().iter().map(|s| s.name()).collect();
		assert_eq!(names, vec!["doall", "dswp"]);
		let config = config.only("dswp".parse().unwrap());
		assert_eq!(config.schemes, vec![SchemeKind::Dswp]);
		assert!("helix".parse::<SchemeKind>().is_err());
	}
}
