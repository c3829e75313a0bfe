//! Reduction of resource documents to a comparable canonical form.
//!
//! Which fields count as noise is data ([`NoiseConfig`]), loaded from
//! `.ocdiff-config.yaml` or defaulted. The comparison itself never looks at
//! field names.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::{
	document::ResourceDocument,
	kind::{Kind, UnknownKind},
	yaml,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
	#[error("document {document} has no kind")]
	MissingKind { document: String },

	#[error(transparent)]
	UnknownKind(#[from] UnknownKind),

	#[error("{kind} document has no metadata.name")]
	MissingName { kind: Kind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid noise path `{path}`: {reason}")]
pub struct InvalidNoisePath {
	pub path: String,
	pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Key(String),
	Any,
}

/// A JSON-pointer-like path to a field that is removed before comparison.
///
/// `~1` and `~0` escape `/` and `~` inside a segment; a bare `*` segment
/// matches every entry of an object or array at that level.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct NoisePath {
	raw: String,
	segments: Vec<Segment>,
}

impl NoisePath {
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Remove every field this path designates from `value`.
	pub fn strip(&self, value: &mut Value) {
		strip_segments(value, &self.segments);
	}
}

fn strip_segments(value: &mut Value, segments: &[Segment]) {
	let Some((head, rest)) = segments.split_first() else {
		return;
	};

	if rest.is_empty() {
		match (value, head) {
			(Value::Object(map), Segment::Key(key)) => {
				map.remove(key);
			}
			(Value::Object(map), Segment::Any) => map.clear(),
			(Value::Array(items), Segment::Any) => items.clear(),
			(Value::Array(items), Segment::Key(key)) => {
				if let Some(index) = key.parse::<usize>().ok().filter(|i| *i < items.len()) {
					items.remove(index);
				}
			}
			_ => {}
		}
		return;
	}

	match (value, head) {
		(Value::Object(map), Segment::Key(key)) => {
			if let Some(child) = map.get_mut(key) {
				strip_segments(child, rest);
			}
		}
		(Value::Object(map), Segment::Any) => {
			for child in map.values_mut() {
				strip_segments(child, rest);
			}
		}
		(Value::Array(items), Segment::Any) => {
			for child in items.iter_mut() {
				strip_segments(child, rest);
			}
		}
		(Value::Array(items), Segment::Key(key)) => {
			if let Some(child) = key.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
				strip_segments(child, rest);
			}
		}
		_ => {}
	}
}

impl FromStr for NoisePath {
	type Err = InvalidNoisePath;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = |reason| InvalidNoisePath {
			path: s.to_string(),
			reason,
		};
		let Some(body) = s.strip_prefix('/') else {
			return Err(invalid("must start with `/`"));
		};
		if body.is_empty() {
			return Err(invalid("must name at least one field"));
		}

		let segments = body
			.split('/')
			.map(|segment| match segment {
				"*" => Segment::Any,
				key => Segment::Key(key.replace("~1", "/").replace("~0", "~")),
			})
			.collect();

		Ok(Self {
			raw: s.to_string(),
			segments,
		})
	}
}

impl TryFrom<String> for NoisePath {
	type Error = InvalidNoisePath;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl fmt::Display for NoisePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

/// Fields that vary without semantic meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseConfig {
	/// Removed from every document.
	pub paths: Vec<NoisePath>,
	/// Annotations whose key starts with any of these are removed.
	pub annotation_prefixes: Vec<String>,
	/// Removed from documents of one kind only, after `paths`.
	pub per_kind: BTreeMap<Kind, Vec<NoisePath>>,
}

pub const DEFAULT_NOISE_PATHS: &[&str] = &[
	"/status",
	"/metadata/uid",
	"/metadata/resourceVersion",
	"/metadata/generation",
	"/metadata/creationTimestamp",
	"/metadata/deletionTimestamp",
	"/metadata/deletionGracePeriodSeconds",
	"/metadata/selfLink",
	"/metadata/ownerReferences",
	"/metadata/managedFields",
	"/metadata/namespace",
];

/// Annotations written by the server or by `oc` itself. User-facing
/// `openshift.io/` keys such as `display-name` are compared.
pub const DEFAULT_ANNOTATION_PREFIXES: &[&str] = &[
	"kubectl.kubernetes.io/",
	"deployment.kubernetes.io/",
	"openshift.io/generated-by",
	"openshift.io/host.generated",
	"openshift.io/deployment-config.",
	"openshift.io/deployment.",
	"openshift.io/encoded-deployment-config",
	"openshift.io/build-config.",
	"openshift.io/build.",
	"openshift.io/image.dockerRepositoryCheck",
];

/// Parse a static list of paths known to be well-formed.
fn static_paths(paths: &[&str]) -> Vec<NoisePath> {
	paths.iter().filter_map(|p| p.parse().ok()).collect()
}

impl NoiseConfig {
	pub fn default_paths() -> Vec<NoisePath> {
		static_paths(DEFAULT_NOISE_PATHS)
	}

	pub fn default_annotation_prefixes() -> Vec<String> {
		DEFAULT_ANNOTATION_PREFIXES
			.iter()
			.map(|p| p.to_string())
			.collect()
	}

	pub fn default_per_kind() -> BTreeMap<Kind, Vec<NoisePath>> {
		BTreeMap::from([
			(
				Kind::Service,
				static_paths(&["/spec/clusterIP", "/spec/clusterIPs"]),
			),
			(
				Kind::ServiceAccount,
				static_paths(&["/secrets", "/imagePullSecrets"]),
			),
		])
	}

	/// Every path that applies to documents of `kind`.
	pub fn paths_for(&self, kind: Kind) -> impl Iterator<Item = &NoisePath> {
		self.paths
			.iter()
			.chain(self.per_kind.get(&kind).into_iter().flatten())
	}
}

impl Default for NoiseConfig {
	fn default() -> Self {
		Self {
			paths: Self::default_paths(),
			annotation_prefixes: Self::default_annotation_prefixes(),
			per_kind: Self::default_per_kind(),
		}
	}
}

/// The (kind, name) pair local and remote documents are matched on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
	pub kind: Kind,
	pub name: String,
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.kind, self.name)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResource {
	pub identity: Identity,
	/// Document content with noise removed and keys in canonical order.
	pub comparable: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
	noise: NoiseConfig,
}

impl Normalizer {
	pub fn new(noise: NoiseConfig) -> Self {
		Self { noise }
	}

	pub fn normalize(&self, document: &ResourceDocument) -> Result<NormalizedResource, NormalizeError> {
		let kind: Kind = document
			.kind_str()
			.ok_or_else(|| NormalizeError::MissingKind {
				document: document.describe(),
			})?
			.parse()?;
		let name = document
			.name()
			.ok_or(NormalizeError::MissingName { kind })?
			.to_string();

		Ok(NormalizedResource {
			comparable: self.strip(kind, document.value().clone()),
			identity: Identity { kind, name },
		})
	}

	/// Remove noise fields from a `kind` document and sort its keys.
	pub fn strip(&self, kind: Kind, mut value: Value) -> Value {
		for path in self.noise.paths_for(kind) {
			path.strip(&mut value);
		}

		if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
			if let Some(annotations) = metadata
				.get_mut("annotations")
				.and_then(Value::as_object_mut)
			{
				annotations.retain(|key, _| {
					let reserved = self
						.noise
						.annotation_prefixes
						.iter()
						.any(|prefix| key.starts_with(prefix.as_str()));
					if reserved {
						trace!(annotation = %key, "dropping reserved annotation");
					}
					!reserved
				});
			}
			for field in ["annotations", "labels"] {
				let empty = match metadata.get(field) {
					Some(Value::Object(map)) => map.is_empty(),
					Some(Value::Null) => true,
					_ => false,
				};
				if empty {
					metadata.remove(field);
				}
			}
		}

		yaml::canonicalize(value)
	}
}
