use llvm::CompOp;
use utils::{errors::Result, RrvmError};

/// Turns the comparison guarding a loop exit into a predicate that holds
/// exactly when the loop leaves, with the induction variable on the left,
/// and that stays true for every later value of the recurrence, so the test
/// may be applied to values skipping ahead by more than one step.
pub fn normalize_exit_predicate(
	op: CompOp,
	exit_on_true: bool,
	iv_on_left: bool,
	step: i32,
) -> Result<CompOp> {
	if op.is_float() {
		return Err(RrvmError::IncompatiblePredicate(format!(
			"{} compares floats",
			op
		)));
	}
	if step == 0 {
		return Err(RrvmError::IncompatiblePredicate(
			"zero step".to_string(),
		));
	}
	let exit = if exit_on_true { op } else { op.inverse() };
	let exit = if iv_on_left { exit } else { exit.swapped() };
	match exit {
		CompOp::NE => Ok(exit),
		CompOp::EQ if step > 0 => Ok(CompOp::SGE),
		CompOp::EQ => Ok(CompOp::SLE),
		CompOp::SLT | CompOp::SLE if step < 0 => Ok(exit),
		CompOp::SGT | CompOp::SGE if step > 0 => Ok(exit),
		_ => Err(RrvmError::IncompatiblePredicate(format!(
			"exit on {} with step {}",
			exit, step
		))),
	}
}

/// The predicate under which the loop keeps iterating.
pub fn normalize_continue_predicate(
	op: CompOp,
	exit_on_true: bool,
	iv_on_left: bool,
	step: i32,
) -> Result<CompOp> {
	normalize_exit_predicate(op, exit_on_true, iv_on_left, step)
		.map(|p| p.inverse())
}

#[cfg(test)]
mod tests {
	use super::*;
	use CompOp::*;

	const OPS: [CompOp; 6] = [SLT, SLE, SGT, SGE, EQ, NE];

	// expected exit predicate per comparison, indexed by
	// [exit on true][iv on left][step positive]; None is a rejection
	fn expected(op: CompOp) -> [[[Option<CompOp>; 2]; 2]; 2] {
		match op {
			SLT => [
				// exit on false: continue while iv < x / x < iv
				[[Some(SLE), None], [None, Some(SGE)]],
				[[None, Some(SGT)], [Some(SLT), None]],
			],
			SLE => [
				[[Some(SLT), None], [None, Some(SGT)]],
				[[None, Some(SGE)], [Some(SLE), None]],
			],
			SGT => [
				[[None, Some(SGE)], [Some(SLE), None]],
				[[Some(SLT), None], [None, Some(SGT)]],
			],
			SGE => [
				[[None, Some(SGT)], [Some(SLT), None]],
				[[Some(SLE), None], [None, Some(SGE)]],
			],
			EQ => [
				[[Some(NE), Some(NE)], [Some(NE), Some(NE)]],
				[[Some(SLE), Some(SGE)], [Some(SLE), Some(SGE)]],
			],
			NE => [
				[[Some(SLE), Some(SGE)], [Some(SLE), Some(SGE)]],
				[[Some(NE), Some(NE)], [Some(NE), Some(NE)]],
			],
			_ => unreachable!(),
		}
	}

	#[test]
	fn test_normalization_table() {
		for op in OPS {
			let table = expected(op);
			for exit_on_true in [false, true] {
				for iv_on_left in [false, true] {
					for positive in [false, true] {
						let step = if positive { 2 } else { -3 };
						let got = normalize_exit_predicate(
							op,
							exit_on_true,
							iv_on_left,
							step,
						)
						.ok();
						let want = table[usize::from(exit_on_true)]
							[usize::from(iv_on_left)][usize::from(positive)];
						assert_eq!(
							got, want,
							"{} exit_on_true={} iv_on_left={} step={}",
							op, exit_on_true, iv_on_left, step
						);
					}
				}
			}
		}
	}

	#[test]
	fn test_counting_loop() {
		// for (i = 0; i < n; i++): continue on true, iv on the left
		assert_eq!(normalize_exit_predicate(SLT, false, true, 1).unwrap(), SGE);
		assert_eq!(normalize_continue_predicate(SLT, false, true, 1).unwrap(), SLT);
	}

	#[test]
	fn test_rejections() {
		let err = normalize_exit_predicate(SLT, false, true, -1).unwrap_err();
		assert!(matches!(err, RrvmError::IncompatiblePredicate(_)));
		assert!(normalize_exit_predicate(OLT, true, true, 1).is_err());
		assert!(normalize_exit_predicate(NE, true, true, 0).is_err());
	}
}
