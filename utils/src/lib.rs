pub mod constants;
pub mod errors;
pub mod label;
pub mod union_find;

use std::fmt::Display;

pub use constants::*;
pub use errors::*;
pub use label::*;
pub use union_find::UnionFind;

pub fn fatal_error(str: impl Display) {
	eprintln!("{}: {}", console::style("fatal error").bold().red(), str);
	std::process::exit(1);
}

pub fn warning(str: impl Display) {
	eprintln!("{}: {}", console::style("warning").bold().yellow(), str);
}

pub fn note(str: impl Display) {
	eprintln!("{}: {}", console::style("note").bold().cyan(), str);
}
