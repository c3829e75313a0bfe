//! The closed vocabulary of resource kinds ocdiff knows how to reconcile.
//!
//! Kinds enter the program as free-form strings (CLI tokens, `kind` fields of
//! rendered or exported documents, config file keys) and are converted to
//! [`Kind`] at that boundary. Anything that does not convert is rejected there.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
	str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;

/// A resource kind supported by ocdiff.
///
/// Declaration order is significant: it is the order in which changesets are
/// applied, so kinds that others tend to reference (config, secrets, accounts,
/// storage, images) come before the workloads and routes that consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Kind {
	ConfigMap,
	Secret,
	ServiceAccount,
	RoleBinding,
	PersistentVolumeClaim,
	ImageStream,
	BuildConfig,
	DeploymentConfig,
	Service,
	Route,
	Template,
}

impl Kind {
	/// Every supported kind, in apply order.
	pub const ALL: [Kind; 11] = [
		Kind::ConfigMap,
		Kind::Secret,
		Kind::ServiceAccount,
		Kind::RoleBinding,
		Kind::PersistentVolumeClaim,
		Kind::ImageStream,
		Kind::BuildConfig,
		Kind::DeploymentConfig,
		Kind::Service,
		Kind::Route,
		Kind::Template,
	];

	/// Canonical name, as it appears in a document's `kind` field.
	pub fn as_str(self) -> &'static str {
		match self {
			Kind::ConfigMap => "ConfigMap",
			Kind::Secret => "Secret",
			Kind::ServiceAccount => "ServiceAccount",
			Kind::RoleBinding => "RoleBinding",
			Kind::PersistentVolumeClaim => "PersistentVolumeClaim",
			Kind::ImageStream => "ImageStream",
			Kind::BuildConfig => "BuildConfig",
			Kind::DeploymentConfig => "DeploymentConfig",
			Kind::Service => "Service",
			Kind::Route => "Route",
			Kind::Template => "Template",
		}
	}

	/// Short name used for exported file names (`dc-template.yml`).
	pub fn short_name(self) -> &'static str {
		match self {
			Kind::ConfigMap => "cm",
			Kind::Secret => "secret",
			Kind::ServiceAccount => "serviceaccount",
			Kind::RoleBinding => "rolebinding",
			Kind::PersistentVolumeClaim => "pvc",
			Kind::ImageStream => "is",
			Kind::BuildConfig => "bc",
			Kind::DeploymentConfig => "dc",
			Kind::Service => "svc",
			Kind::Route => "route",
			Kind::Template => "template",
		}
	}
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
	type Err = UnknownKind;

	/// Parses a canonical kind name exactly as the cluster reports it.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Kind::ALL
			.into_iter()
			.find(|k| k.as_str() == s)
			.ok_or_else(|| UnknownKind(s.to_string()))
	}
}

/// Lookup table from user-typed kind tokens to [`Kind`].
///
/// Built once at startup and handed to filter resolution. Tokens are matched
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct KindTable {
	entries: BTreeMap<String, Kind>,
}

impl KindTable {
	pub fn new<S: AsRef<str>>(entries: impl IntoIterator<Item = (S, Kind)>) -> Self {
		Self {
			entries: entries
				.into_iter()
				.map(|(token, kind)| (token.as_ref().to_lowercase(), kind))
				.collect(),
		}
	}

	pub fn lookup(&self, token: &str) -> Option<Kind> {
		self.entries.get(&token.to_lowercase()).copied()
	}

	/// Distinct kinds reachable through this table.
	pub fn kinds(&self) -> BTreeSet<Kind> {
		self.entries.values().copied().collect()
	}
}

impl Default for KindTable {
	fn default() -> Self {
		Self::new([
			("svc", Kind::Service),
			("service", Kind::Service),
			("route", Kind::Route),
			("dc", Kind::DeploymentConfig),
			("deploymentconfig", Kind::DeploymentConfig),
			("bc", Kind::BuildConfig),
			("buildconfig", Kind::BuildConfig),
			("is", Kind::ImageStream),
			("imagestream", Kind::ImageStream),
			("pvc", Kind::PersistentVolumeClaim),
			("persistentvolumeclaim", Kind::PersistentVolumeClaim),
			("template", Kind::Template),
			("cm", Kind::ConfigMap),
			("configmap", Kind::ConfigMap),
			("secret", Kind::Secret),
			("rolebinding", Kind::RoleBinding),
			("serviceaccount", Kind::ServiceAccount),
		])
	}
}
