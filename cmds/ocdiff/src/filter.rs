//! Resolution of the user's `resource` expression and `--selector` into
//! per-kind filters.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
	str::FromStr,
	sync::OnceLock,
};

use regex::Regex;
use thiserror::Error;
use tracing::instrument;

use crate::kind::{Kind, KindTable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
	#[error("unknown resource kinds: {}", .0.join(", "))]
	UnknownKinds(Vec<String>),

	#[error("invalid label selector `{selector}`: {reason}")]
	InvalidSelector { selector: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
	Equals(String, String),
	NotEquals(String, String),
	Exists(String),
	NotExists(String),
}

impl Requirement {
	fn matches(&self, labels: &BTreeMap<&str, &str>) -> bool {
		match self {
			Requirement::Equals(k, v) => labels.get(k.as_str()) == Some(&v.as_str()),
			Requirement::NotEquals(k, v) => labels.get(k.as_str()) != Some(&v.as_str()),
			Requirement::Exists(k) => labels.contains_key(k.as_str()),
			Requirement::NotExists(k) => !labels.contains_key(k.as_str()),
		}
	}
}

/// Equality-based label selector, a subset of the syntax `oc -l` accepts.
///
/// Supports comma-joined `key=value`, `key==value`, `key!=value`, `key` and
/// `!key` requirements; all requirements must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
	raw: String,
	requirements: Vec<Requirement>,
}

impl LabelSelector {
	pub fn matches(&self, labels: &BTreeMap<&str, &str>) -> bool {
		self.requirements.iter().all(|r| r.matches(labels))
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

impl fmt::Display for LabelSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

fn label_key_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"^([A-Za-z0-9.-]+/)?[A-Za-z0-9]([A-Za-z0-9_.-]*[A-Za-z0-9])?$")
			.expect("static pattern")
	})
}

/// Label values may be empty.
fn label_value_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"^([A-Za-z0-9]([A-Za-z0-9_.-]*[A-Za-z0-9])?)?$").expect("static pattern")
	})
}

impl FromStr for LabelSelector {
	type Err = FilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = |reason: &str| FilterError::InvalidSelector {
			selector: s.to_string(),
			reason: reason.to_string(),
		};

		let mut requirements = Vec::new();
		for part in s.split(',').map(str::trim) {
			if part.is_empty() {
				return Err(invalid("empty requirement"));
			}
			let requirement = if let Some((key, value)) = part.split_once("!=") {
				Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
			} else if let Some((key, value)) = part
				.split_once("==")
				.or_else(|| part.split_once('='))
			{
				Requirement::Equals(key.trim().to_string(), value.trim().to_string())
			} else if let Some(key) = part.strip_prefix('!') {
				Requirement::NotExists(key.trim().to_string())
			} else {
				Requirement::Exists(part.to_string())
			};

			let (key, value) = match &requirement {
				Requirement::Equals(k, v) | Requirement::NotEquals(k, v) => (k, Some(v)),
				Requirement::Exists(k) | Requirement::NotExists(k) => (k, None),
			};
			if key.is_empty() {
				return Err(invalid("missing label key"));
			}
			if !label_key_pattern().is_match(key) {
				return Err(invalid(format!("`{key}` is not a valid label key").as_str()));
			}
			if let Some(value) = value {
				if !label_value_pattern().is_match(value) {
					return Err(invalid(format!("`{value}` is not a valid label value").as_str()));
				}
			}
			requirements.push(requirement);
		}

		Ok(Self {
			raw: s.to_string(),
			requirements,
		})
	}
}

/// Describes the subset of one kind's resources the user cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
	pub kind: Kind,
	/// Names requested through `kind/name` tokens.
	pub names: BTreeSet<String>,
	/// Set when a bare `kind` token (or a blank expression) asked for every name.
	pub all_names: bool,
	pub selector: Option<LabelSelector>,
}

impl ResourceFilter {
	pub fn all(kind: Kind, selector: Option<LabelSelector>) -> Self {
		Self {
			kind,
			names: BTreeSet::new(),
			all_names: true,
			selector,
		}
	}

	/// Whether the filter narrows the kind down to an explicit name list.
	pub fn restricts_names(&self) -> bool {
		!self.all_names && !self.names.is_empty()
	}

	pub fn admits_name(&self, name: &str) -> bool {
		!self.restricts_names() || self.names.contains(name)
	}

	pub fn admits_labels(&self, labels: &BTreeMap<&str, &str>) -> bool {
		self.selector.as_ref().map_or(true, |s| s.matches(labels))
	}
}

/// Resolve a kind expression such as `dc/payments,svc` into one filter per kind.
///
/// A blank expression selects every kind in `table`. Resolution is atomic:
/// if any token names an unknown kind, no filters are returned and the error
/// lists every unknown token.
#[instrument(skip(table))]
pub fn resolve_filters(
	expression: &str,
	selector: Option<&str>,
	table: &KindTable,
) -> Result<BTreeMap<Kind, ResourceFilter>, FilterError> {
	let selector = selector
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(LabelSelector::from_str)
		.transpose()?;

	let expression = expression.trim();
	if expression.is_empty() {
		return Ok(table
			.kinds()
			.into_iter()
			.map(|kind| (kind, ResourceFilter::all(kind, selector.clone())))
			.collect());
	}

	let mut filters: BTreeMap<Kind, ResourceFilter> = BTreeMap::new();
	let mut unknown = Vec::new();

	for token in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
		let (kind_token, name) = match token.split_once('/') {
			Some((kind, name)) => (kind, Some(name.trim()).filter(|n| !n.is_empty())),
			None => (token, None),
		};

		let Some(kind) = table.lookup(kind_token) else {
			unknown.push(kind_token.to_string());
			continue;
		};

		let filter = filters.entry(kind).or_insert_with(|| ResourceFilter {
			kind,
			names: BTreeSet::new(),
			all_names: false,
			selector: selector.clone(),
		});
		match name {
			Some(name) => {
				filter.names.insert(name.to_string());
			}
			None => filter.all_names = true,
		}
	}

	if !unknown.is_empty() {
		return Err(FilterError::UnknownKinds(unknown));
	}

	Ok(filters)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;

	use super::*;

	fn labels<'a>(pairs: &[(&'a str, &'a str)]) -> BTreeMap<&'a str, &'a str> {
		pairs.iter().copied().collect()
	}

	#[test]
	fn test_blank_expression_selects_every_kind() {
		let filters = resolve_filters("  ", None, &KindTable::default()).unwrap();
		assert_eq!(filters.len(), Kind::ALL.len());
		assert!(filters.values().all(|f| !f.restricts_names()));
	}

	#[test]
	fn test_kind_with_name_and_bare_kind() {
		let filters = resolve_filters("dc/payments,svc", None, &KindTable::default()).unwrap();
		assert_eq!(filters.len(), 2);

		let dc = &filters[&Kind::DeploymentConfig];
		assert!(dc.restricts_names());
		assert_eq!(dc.names, BTreeSet::from(["payments".to_string()]));
		assert!(dc.admits_name("payments"));
		assert!(!dc.admits_name("billing"));

		let svc = &filters[&Kind::Service];
		assert!(!svc.restricts_names());
		assert!(svc.admits_name("anything"));
	}

	#[test]
	fn test_repeated_names_accumulate() {
		let filters =
			resolve_filters("dc/a,DeploymentConfig/b,dc/a", None, &KindTable::default()).unwrap();
		let dc = &filters[&Kind::DeploymentConfig];
		assert_eq!(
			dc.names,
			BTreeSet::from(["a".to_string(), "b".to_string()])
		);
	}

	#[rstest]
	#[case("dc/a,dc")]
	#[case("dc,dc/a")]
	fn test_bare_kind_wins_for_inclusion(#[case] expression: &str) {
		let filters = resolve_filters(expression, None, &KindTable::default()).unwrap();
		let dc = &filters[&Kind::DeploymentConfig];
		assert!(dc.admits_name("other"));
		assert!(!dc.restricts_names());
		assert!(dc.names.contains("a"));
	}

	#[test]
	fn test_unknown_kind_fails() {
		let result = resolve_filters("foo", None, &KindTable::default());
		assert_eq!(result, Err(FilterError::UnknownKinds(vec!["foo".to_string()])));
	}

	#[test]
	fn test_unknown_kinds_are_all_reported_and_nothing_returned() {
		let result = resolve_filters("svc,foo/x,bar", None, &KindTable::default());
		let err = result.unwrap_err();
		assert_eq!(
			err,
			FilterError::UnknownKinds(vec!["foo".to_string(), "bar".to_string()])
		);
		assert_eq!(err.to_string(), "unknown resource kinds: foo, bar");
	}

	#[test]
	fn test_selector_attached_to_every_filter() {
		let filters = resolve_filters("svc,cm", Some("app=web"), &KindTable::default()).unwrap();
		for filter in filters.values() {
			assert_eq!(filter.selector.as_ref().map(|s| s.as_str()), Some("app=web"));
		}
	}

	#[test]
	fn test_invalid_selector_is_rejected() {
		assert_matches!(
			resolve_filters("svc", Some("=web"), &KindTable::default()),
			Err(FilterError::InvalidSelector { .. })
		);
	}

	#[rstest]
	#[case("env in (prod)")]
	#[case("env in (prod,staging)")]
	#[case("env notin (dev)")]
	#[case("a b")]
	#[case("x)")]
	#[case("app=web app")]
	#[case("app!=-web")]
	#[case("!")]
	fn test_unsupported_selector_syntax_is_rejected(#[case] selector: &str) {
		assert_matches!(
			selector.parse::<LabelSelector>(),
			Err(FilterError::InvalidSelector { .. })
		);
	}

	#[rstest]
	#[case("app.kubernetes.io/name=web")]
	#[case("app=")]
	#[case("tier!=front-end")]
	#[case("!deployment.openshift.io/paused")]
	fn test_valid_selector_syntax_is_accepted(#[case] selector: &str) {
		assert!(selector.parse::<LabelSelector>().is_ok());
	}

	#[rstest]
	#[case("app=web", &[("app", "web")], true)]
	#[case("app==web", &[("app", "web")], true)]
	#[case("app=web", &[("app", "api")], false)]
	#[case("app=web", &[], false)]
	#[case("app!=web", &[("app", "api")], true)]
	#[case("app!=web", &[], true)]
	#[case("app", &[("app", "x")], true)]
	#[case("!app", &[("app", "x")], false)]
	#[case("app=web,tier=front", &[("app", "web"), ("tier", "front")], true)]
	#[case("app=web,tier=front", &[("app", "web")], false)]
	fn test_selector_matching(
		#[case] selector: &str,
		#[case] pairs: &[(&str, &str)],
		#[case] expected: bool,
	) {
		let selector: LabelSelector = selector.parse().unwrap();
		assert_eq!(selector.matches(&labels(pairs)), expected);
	}
}
