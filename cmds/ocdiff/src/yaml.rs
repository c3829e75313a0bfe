//! YAML serialization for diffs and exported templates.

use serde_json::Value;
use tracing::instrument;

/// Sort object keys recursively, whether or not serde_json's `preserve_order`
/// feature is enabled.
pub fn canonicalize(value: Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<(String, Value)> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| a.cmp(b));
			Value::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, canonicalize(v)))
					.collect(),
			)
		}
		Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
		other => other,
	}
}

fn options() -> serde_saphyr::SerializerOptions {
	serde_saphyr::SerializerOptions {
		indent_step: 2,
		indent_array: Some(0),
		prefer_block_scalars: true,
		empty_map_as_braces: true,
		empty_array_as_brackets: true,
		line_width: Some(80),
		quote_ambiguous_keys: true,
		quote_numeric_strings: true,
		..Default::default()
	}
}

/// Serialize a value as a single YAML document with sorted keys.
#[instrument(skip_all)]
pub fn to_yaml(value: &Value) -> Result<String, serde_saphyr::ser_error::Error> {
	let sorted = canonicalize(value.clone());
	let mut output = String::new();
	serde_saphyr::to_fmt_writer_with_options(&mut output, &sorted, options())?;
	Ok(output)
}

/// Serialize values as a `---`-separated YAML stream.
pub fn to_yaml_stream<'a>(
	values: impl IntoIterator<Item = &'a Value>,
) -> Result<String, serde_saphyr::ser_error::Error> {
	let mut output = String::new();
	for value in values {
		output.push_str("---\n");
		output.push_str(&to_yaml(value)?);
	}
	Ok(output)
}
