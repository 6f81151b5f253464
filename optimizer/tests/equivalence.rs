use std::collections::BTreeSet;

use optimizer::{Parallelizer, ParallelizerConfig, RrvmOptimizer, SchemeKind};
use rrvm::{program::LlvmProgram, samples::*};
use simulator::{Simulator, StackValue};

fn run(program: &LlvmProgram) -> (i32, Vec<String>) {
	let mut sim = Simulator::new(program);
	let value = sim.run_main().unwrap();
	(value, sim.output)
}

fn parallelize(program: &mut LlvmProgram, config: ParallelizerConfig) -> bool {
	Parallelizer::with_config(config).apply(program).unwrap()
}

#[test]
fn doall_covers_every_iteration_once() {
	for (n, workers, chunk) in [(100, 4, 1), (97, 3, 4), (1, 1, 1)] {
		let mut program = array_scale(n);
		let expected = run(&program);
		let config = ParallelizerConfig {
			workers,
			chunk_size: chunk,
			..Default::default()
		}
		.only(SchemeKind::Doall);
		assert!(parallelize(&mut program, config));

		let mut sim = Simulator::new(&program);
		assert_eq!(sim.run_main().unwrap(), expected.0, "n = {}", n);
		let workers: BTreeSet<String> = program
			.funcs
			.iter()
			.filter(|f| f.name.contains(".doall."))
			.map(|f| f.name.clone())
			.collect();
		assert_eq!(workers.len(), 2);

		let scaled: Vec<i32> = (0..n).map(|i| 7 * i).collect();
		let mut found_scale = false;
		for worker in workers.iter() {
			let stores: Vec<_> = sim.stores.iter().filter(|s| &s.func == worker).collect();
			let addrs: BTreeSet<usize> = stores.iter().map(|s| s.addr).collect();
			assert_eq!(stores.len(), n as usize, "{} with n = {}", worker, n);
			assert_eq!(addrs.len(), n as usize, "{} wrote a slot twice", worker);
			let mut values: Vec<i32> = stores
				.iter()
				.map(|s| match s.value {
					StackValue::Int(v) => v,
					other => panic!("stored {:?}", other),
				})
				.collect();
			values.sort();
			found_scale |= values == scaled;
		}
		assert!(found_scale, "b[i] = 7i not written with n = {}", n);
	}
}

#[test]
fn doall_keeps_nested_and_composite_loops_equivalent() {
	for mut program in [nested(5, 7), dual_iv(23, 3, 4), countdown(30), eq_exit(17)] {
		let expected = run(&program);
		let config = ParallelizerConfig {
			workers: 3,
			chunk_size: 2,
			..Default::default()
		}
		.only(SchemeKind::Doall);
		assert!(parallelize(&mut program, config));
		assert_eq!(run(&program), expected);
	}
}

#[test]
fn dswp_keeps_results_and_output() {
	for mut program in [sum_squares(50), pipeline_io(10)] {
		let expected = run(&program);
		let config = ParallelizerConfig::default().only(SchemeKind::Dswp);
		assert!(parallelize(&mut program, config));
		assert!(program.funcs.iter().any(|f| f.name.contains(".stage1.")));
		assert_eq!(run(&program), expected);
	}
}

#[test]
fn dswp_keeps_a_callee_reading_a_stored_cell_in_order() {
	let mut program = shared_cell(4);
	let expected = run(&program);
	assert_eq!(expected.1, vec!["0", "1", "2", "3"]);
	let config = ParallelizerConfig::default().only(SchemeKind::Dswp);
	parallelize(&mut program, config);
	assert_eq!(run(&program), expected);
}

#[test]
fn doall_stores_the_final_counter() {
	// the exit index starts a chunk, falls inside one, or is zero
	for (n, workers, chunk) in [(30, 3, 2), (31, 3, 2), (1, 2, 1), (2, 4, 3), (0, 3, 2)] {
		let mut program = last_index(n);
		let expected = run(&program);
		let config = ParallelizerConfig {
			workers,
			chunk_size: chunk,
			..Default::default()
		}
		.only(SchemeKind::Doall);
		assert!(parallelize(&mut program, config));
		assert!(program.funcs.iter().any(|f| f.name.contains(".doall.")));
		assert_eq!(run(&program), expected, "n = {}", n);
	}
}

#[test]
fn every_sample_survives_the_driver() {
	for sample in all_samples() {
		let mut program = (sample.build)();
		let expected = run(&program);
		Parallelizer::new().apply(&mut program).unwrap();
		assert_eq!(run(&program), expected, "sample {}", sample.name);
	}
	let mut program = param_scale(40);
	let expected = run(&program);
	let config = ParallelizerConfig {
		assume_noalias_params: true,
		..Default::default()
	};
	assert!(parallelize(&mut program, config));
	assert!(program.funcs.iter().any(|f| f.name.starts_with("scale.doall.")));
	assert_eq!(run(&program), expected);
}
