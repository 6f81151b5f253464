pub use clap::Parser;
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
	/// DOALL first, then DSWP
	Auto,
	Doall,
	Dswp,
}

/// Parallelizes the loops of a built-in sample program and prints the
/// resulting IR.
#[derive(Parser, Debug)]
#[command(name = "parallelizer", version)]
pub struct Args {
	/// Sample program to transform
	#[arg(long, default_value = "array_scale")]
	pub sample: String,

	/// List the sample programs and exit
	#[arg(long)]
	pub list: bool,

	#[arg(long, value_enum, default_value_t = SchemeArg::Auto)]
	pub scheme: SchemeArg,

	/// Workers a DOALL loop is split across
	#[arg(long)]
	pub workers: Option<i32>,

	/// Iterations per DOALL chunk
	#[arg(long)]
	pub chunk: Option<i32>,

	/// Assume pointer parameters never overlap
	#[arg(long)]
	pub noalias_params: bool,

	/// Run the program before and after the transformation and compare
	#[arg(long)]
	pub simulate: bool,

	#[arg(short)]
	pub output: Option<String>,

	/// More output per occurrence
	#[arg(short, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
