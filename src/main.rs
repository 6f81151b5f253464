mod cli;
mod logging;

use std::{
	fs::File,
	io::{self, Write},
};

use anyhow::Result;
use cli::{Args, Parser, SchemeArg};
use log::{info, trace};
use optimizer::{Parallelizer, ParallelizerConfig, RrvmOptimizer, SchemeKind};
use rrvm::{
	program::LlvmProgram,
	samples::{all_samples, find_sample},
};
use simulator::Simulator;
use utils::{fatal_error, map_sys_err, note, warning};

fn build_config(args: &Args) -> ParallelizerConfig {
	let mut config = ParallelizerConfig {
		assume_noalias_params: args.noalias_params,
		..Default::default()
	};
	if let Some(workers) = args.workers {
		config.workers = workers;
	}
	if let Some(chunk) = args.chunk {
		config.chunk_size = chunk;
	}
	match args.scheme {
		SchemeArg::Auto => config,
		SchemeArg::Doall => config.only(SchemeKind::Doall),
		SchemeArg::Dswp => config.only(SchemeKind::Dswp),
	}
}

fn simulate(program: &LlvmProgram) -> Result<(i32, Vec<String>)> {
	let mut sim = Simulator::new(program);
	let value = sim.run_main()?;
	info!("simulated {} steps", sim.step_count);
	Ok((value, sim.output))
}

fn main() -> Result<()> {
	let args = Args::parse();
	logging::init(args.verbose);
	trace!("start");

	if args.list {
		for sample in all_samples() {
			println!("{:<12} {}", sample.name, sample.description);
		}
		return Ok(());
	}
	if args.workers.is_some_and(|w| w < 1) || args.chunk.is_some_and(|c| c < 1) {
		fatal_error("workers and chunk size must be positive");
	}

	let mut writer: Box<dyn Write> = if let Some(o) = &args.output {
		Box::new(File::create(o).map_err(map_sys_err)?)
	} else {
		Box::new(io::stdout())
	};

	let sample = find_sample(&args.sample).unwrap_or_else(|| {
		fatal_error(format!("unknown sample '{}'; see --list", args.sample));
		unreachable!()
	});
	let mut program = (sample.build)();
	let before = match args.simulate {
		true => Some(simulate(&program)?),
		false => None,
	};

	let changed = Parallelizer::with_config(build_config(&args)).apply(&mut program)?;
	if !changed {
		warning(format!("no loop of '{}' was parallelized", sample.name));
	}
	write!(writer, "{}", program)?;

	if let Some(before) = before {
		let after = simulate(&program)?;
		if after != before {
			fatal_error(format!(
				"'{}' changed behavior: returned {} with {} output line(s), now {} with {}",
				sample.name,
				before.0,
				before.1.len(),
				after.0,
				after.1.len()
			));
		}
		note(format!(
			"'{}' returns {} with {} line(s) of output before and after",
			sample.name,
			after.0,
			after.1.len()
		));
	}
	Ok(())
}
