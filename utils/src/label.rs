use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
	pub name: String,
}

impl Display for Label {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.name)
	}
}

impl Label {
	pub fn new(name: impl Display) -> Self {
		Label {
			name: name.to_string(),
		}
	}
}

pub fn to_label(id: usize) -> Label {
	match id {
		0 => Label::new("entry"),
		_ => Label::new(format!("B{}", id)),
	}
}

pub fn from_label(label: &Label) -> Option<usize> {
	if label.name == "entry" {
		Some(0)
	} else {
		label.name.strip_prefix('B')?.parse().ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_label_round_trip() {
		for id in [0, 1, 17, 4096] {
			assert_eq!(from_label(&to_label(id)), Some(id));
		}
		assert_eq!(to_label(0).name, "entry");
		assert_eq!(from_label(&Label::new("exit")), None);
	}
}
