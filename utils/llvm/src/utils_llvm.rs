use crate::{temp::Temp, Value};

pub fn all_equal<T: PartialEq>(items: &[T]) -> bool {
	items.windows(2).all(|w| w[0] == w[1])
}

pub fn map_value(
	value: &mut Value,
	map: &mut dyn FnMut(&Temp) -> Option<Value>,
) {
	if let Value::Temp(temp) = value {
		if let Some(new_value) = map(temp) {
			*value = new_value;
		}
	}
}

pub fn read_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<Temp> {
	values.into_iter().flat_map(|v| v.unwrap_temp()).collect()
}
