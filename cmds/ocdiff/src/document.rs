//! Resource documents as produced by template rendering or remote export.

use std::{collections::BTreeMap, fmt};

use serde_json::Value;
use thiserror::Error;

use crate::kind::Kind;

#[derive(Debug, Error)]
pub enum DocumentError {
	#[error("parsing JSON output")]
	Json(#[source] serde_json::Error),

	#[error("parsing YAML output")]
	Yaml(#[source] serde_saphyr::Error),

	#[error("expected an object or a list of objects, found {0}")]
	UnexpectedShape(&'static str),
}

/// A single raw resource, immutable once it has been handed to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
	value: Value,
}

impl ResourceDocument {
	pub fn new(value: Value) -> Self {
		Self { value }
	}

	pub fn value(&self) -> &Value {
		&self.value
	}

	pub fn into_value(self) -> Value {
		self.value
	}

	/// The raw `kind` field.
	pub fn kind_str(&self) -> Option<&str> {
		self.value.get("kind").and_then(Value::as_str)
	}

	/// The `kind` field, if it names a supported kind.
	pub fn kind(&self) -> Option<Kind> {
		self.kind_str()?.parse().ok()
	}

	pub fn name(&self) -> Option<&str> {
		self.value
			.pointer("/metadata/name")
			.and_then(Value::as_str)
			.filter(|n| !n.is_empty())
	}

	/// String-valued entries of `metadata.labels`.
	pub fn labels(&self) -> BTreeMap<&str, &str> {
		self.value
			.pointer("/metadata/labels")
			.and_then(Value::as_object)
			.map(|labels| {
				labels
					.iter()
					.filter_map(|(k, v)| Some((k.as_str(), v.as_str()?)))
					.collect()
			})
			.unwrap_or_default()
	}

	/// `kind/name` with placeholders for missing parts, for error messages.
	pub fn describe(&self) -> String {
		format!(
			"{}/{}",
			self.kind_str().unwrap_or("<no kind>"),
			self.name().unwrap_or("<no name>")
		)
	}
}

impl From<Value> for ResourceDocument {
	fn from(value: Value) -> Self {
		Self::new(value)
	}
}

impl fmt::Display for ResourceDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.describe())
	}
}

/// Parse collaborator output into a batch of documents.
///
/// Accepts a `List` object (`oc get -o json`, `oc process -o json`), a single
/// resource object, a JSON array, or a YAML stream of any of those. Nested
/// lists are flattened; null documents are skipped.
pub fn parse_batch(input: &str) -> Result<Vec<ResourceDocument>, DocumentError> {
	let trimmed = input.trim_start();
	if trimmed.is_empty() {
		return Ok(Vec::new());
	}

	let values: Vec<Value> = if trimmed.starts_with('{') || trimmed.starts_with('[') {
		vec![serde_json::from_str(trimmed).map_err(DocumentError::Json)?]
	} else {
		let options = serde_saphyr::Options {
			legacy_octal_numbers: true,
			budget: None,
			..Default::default()
		};
		serde_saphyr::from_multiple_with_options(trimmed, options)
			.map_err(DocumentError::Yaml)?
	};

	let mut batch = Vec::new();
	for value in values {
		flatten_into(value, &mut batch)?;
	}
	Ok(batch)
}

fn flatten_into(value: Value, batch: &mut Vec<ResourceDocument>) -> Result<(), DocumentError> {
	match value {
		Value::Null => Ok(()),
		Value::Array(items) => items.into_iter().try_for_each(|v| flatten_into(v, batch)),
		Value::Object(mut map) => {
			let is_list = map.get("kind").and_then(Value::as_str) == Some("List")
				|| (!map.contains_key("kind") && map.contains_key("items"));
			if is_list {
				match map.remove("items") {
					Some(items) => flatten_into(items, batch),
					None => Ok(()),
				}
			} else {
				batch.push(ResourceDocument::new(Value::Object(map)));
				Ok(())
			}
		}
		Value::Bool(_) => Err(DocumentError::UnexpectedShape("a boolean")),
		Value::Number(_) => Err(DocumentError::UnexpectedShape("a number")),
		Value::String(_) => Err(DocumentError::UnexpectedShape("a string")),
	}
}
