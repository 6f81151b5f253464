use crate::simulator::StackValue;

/// Characters `getint` and `getch` read from.
#[derive(Debug, Default)]
pub struct InputStream {
	chars: Vec<char>,
	position: usize,
}

impl InputStream {
	pub fn new(input: String) -> Self {
		InputStream {
			chars: input.chars().collect(),
			position: 0,
		}
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.position).copied()
	}

	fn next(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.position += 1;
		Some(c)
	}

	fn skip_blank(&mut self) {
		while self.peek().is_some_and(|c| c.is_whitespace()) {
			self.position += 1;
		}
	}

	/// `-1` at the end of the input, as the runtime library does.
	pub fn getch(&mut self) -> i32 {
		self.next().map_or(-1, |c| c as i32)
	}

	pub fn getint(&mut self) -> Option<i32> {
		self.skip_blank();
		let negative = self.peek() == Some('-');
		if negative {
			self.position += 1;
		}
		let mut result: i32 = 0;
		let mut ok_flag = false;
		while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
			result = result.wrapping_mul(10).wrapping_add(digit as i32);
			ok_flag = true;
			self.position += 1;
		}
		match (ok_flag, negative) {
			(false, _) => None,
			(true, true) => Some(result.wrapping_neg()),
			(true, false) => Some(result),
		}
	}
}

pub fn putint(output: &mut Vec<String>, data: i32) -> Option<StackValue> {
	output.push(data.to_string());
	None
}

pub fn putch(output: &mut Vec<String>, data: i32) -> Option<StackValue> {
	let c = char::from_u32(data as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
	output.push(c.to_string());
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_getint() {
		let mut input = InputStream::new("  12 -7\nx".to_string());
		assert_eq!(input.getint(), Some(12));
		assert_eq!(input.getint(), Some(-7));
		assert_eq!(input.getint(), None);
		assert_eq!(input.getch(), 'x' as i32);
		assert_eq!(input.getch(), -1);
	}
}
