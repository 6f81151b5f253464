use log::LevelFilter;

/// `RUST_LOG` applies unless `-v` is given.
pub fn init(verbose: u8) {
	let level = match verbose {
		0 => LevelFilter::Warn,
		1 => LevelFilter::Info,
		2 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	};
	let mut builder = env_logger::Builder::from_default_env();
	if verbose > 0 || std::env::var_os("RUST_LOG").is_none() {
		builder.filter_level(level);
	}
	builder.format_timestamp(None).init();
}
