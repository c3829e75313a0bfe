//! Per-kind reconciliation of remote against local resources.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
	collection::ResourceCollection,
	document::ResourceDocument,
	kind::Kind,
	normalize::{NormalizeError, NormalizedResource, Normalizer},
};

/// Which collection a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Local,
	Remote,
}

impl std::fmt::Display for Side {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Side::Local => "local",
			Side::Remote => "remote",
		})
	}
}

#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("normalizing {side} {kind} document {document}")]
	Normalize {
		kind: Kind,
		side: Side,
		document: String,
		#[source]
		source: NormalizeError,
	},

	#[error("{side} {kind} document {document} has kind {found}")]
	KindMismatch {
		kind: Kind,
		side: Side,
		document: String,
		found: Kind,
	},
}

/// A document together with its normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
	pub document: ResourceDocument,
	pub comparable: Value,
}

/// Both sides of a resource whose content differs.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePair {
	pub remote: Entry,
	pub local: Entry,
}

/// The four-way partition of one kind's resources, keyed by name.
///
/// Maps carry no ordering; use the `*_names` accessors for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
	pub kind: Kind,
	pub unchanged: HashMap<String, Entry>,
	pub to_create: HashMap<String, Entry>,
	pub to_update: HashMap<String, UpdatePair>,
	pub to_delete: HashMap<String, Entry>,
}

fn sorted_names<V>(map: &HashMap<String, V>) -> Vec<&str> {
	let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
	names.sort_unstable();
	names
}

impl Changeset {
	pub fn new(kind: Kind) -> Self {
		Self {
			kind,
			unchanged: HashMap::new(),
			to_create: HashMap::new(),
			to_update: HashMap::new(),
			to_delete: HashMap::new(),
		}
	}

	/// True when nothing needs to be created, updated or deleted.
	pub fn is_empty(&self) -> bool {
		self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
	}

	pub fn unchanged_names(&self) -> Vec<&str> {
		sorted_names(&self.unchanged)
	}

	pub fn create_names(&self) -> Vec<&str> {
		sorted_names(&self.to_create)
	}

	pub fn update_names(&self) -> Vec<&str> {
		sorted_names(&self.to_update)
	}

	pub fn delete_names(&self) -> Vec<&str> {
		sorted_names(&self.to_delete)
	}

	pub fn summary(&self) -> ChangesetSummary {
		ChangesetSummary {
			unchanged: self.unchanged.len(),
			create: self.to_create.len(),
			update: self.to_update.len(),
			delete: self.to_delete.len(),
		}
	}
}

/// Partition sizes of a [`Changeset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangesetSummary {
	pub unchanged: usize,
	pub create: usize,
	pub update: usize,
	pub delete: usize,
}

impl ChangesetSummary {
	pub fn changes(&self) -> usize {
		self.create + self.update + self.delete
	}
}

impl std::ops::Add for ChangesetSummary {
	type Output = Self;

	fn add(self, other: Self) -> Self {
		Self {
			unchanged: self.unchanged + other.unchanged,
			create: self.create + other.create,
			update: self.update + other.update,
			delete: self.delete + other.delete,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
	normalizer: Normalizer,
}

impl ReconciliationEngine {
	pub fn new(normalizer: Normalizer) -> Self {
		Self { normalizer }
	}

	fn index(
		&self,
		kind: Kind,
		side: Side,
		collection: &ResourceCollection,
	) -> Result<HashMap<String, Entry>, ReconcileError> {
		let mut entries = HashMap::with_capacity(collection.len());
		for document in collection.documents() {
			let NormalizedResource {
				identity,
				comparable,
			} = self
				.normalizer
				.normalize(document)
				.map_err(|source| ReconcileError::Normalize {
					kind,
					side,
					document: document.describe(),
					source,
				})?;

			if identity.kind != kind {
				return Err(ReconcileError::KindMismatch {
					kind,
					side,
					document: document.describe(),
					found: identity.kind,
				});
			}

			let entry = Entry {
				document: document.clone(),
				comparable,
			};
			if entries.insert(identity.name, entry).is_some() {
				warn!(%side, document = %document, "duplicate resource, keeping the last one");
			}
		}
		Ok(entries)
	}

	/// Compare a kind's remote resources against its local ones.
	///
	/// Remote-only resources go to `to_delete`, or are dropped entirely when
	/// `upsert_only` is set. Both collections must be of the same kind.
	#[instrument(skip_all, fields(kind = %remote.kind(), upsert_only = upsert_only))]
	pub fn reconcile(
		&self,
		remote: &ResourceCollection,
		local: &ResourceCollection,
		upsert_only: bool,
	) -> Result<Changeset, ReconcileError> {
		assert_eq!(
			remote.kind(),
			local.kind(),
			"reconciling collections of different kinds"
		);
		let kind = remote.kind();

		let mut remote = self.index(kind, Side::Remote, remote)?;
		let local = self.index(kind, Side::Local, local)?;

		let mut changeset = Changeset::new(kind);
		for (name, local) in local {
			match remote.remove(&name) {
				Some(remote) if remote.comparable == local.comparable => {
					changeset.unchanged.insert(name, local);
				}
				Some(remote) => {
					changeset.to_update.insert(name, UpdatePair { remote, local });
				}
				None => {
					changeset.to_create.insert(name, local);
				}
			}
		}
		if upsert_only {
			debug!(suppressed = remote.len(), "upsert-only, not deleting remote-only resources");
		} else {
			changeset.to_delete = remote;
		}

		debug!(summary = ?changeset.summary(), "reconciled");
		Ok(changeset)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::filter::ResourceFilter;

	fn collection(kind: Kind, docs: &[Value]) -> ResourceCollection {
		let mut collection = ResourceCollection::new(ResourceFilter::all(kind, None));
		let docs: Vec<_> = docs.iter().cloned().map(ResourceDocument::new).collect();
		collection.append_matching(&docs);
		collection
	}

	fn service(name: &str, port: u16) -> Value {
		json!({
			"apiVersion": "v1",
			"kind": "Service",
			"metadata": { "name": name },
			"spec": { "ports": [{ "port": port }] }
		})
	}

	fn reconcile(remote: &ResourceCollection, local: &ResourceCollection, upsert_only: bool) -> Changeset {
		ReconciliationEngine::default()
			.reconcile(remote, local, upsert_only)
			.unwrap()
	}

	#[test]
	fn test_changed_body_is_update() {
		let remote = collection(Kind::Service, &[service("foo", 8080)]);
		let local = collection(Kind::Service, &[service("foo", 9090)]);

		let changeset = reconcile(&remote, &local, false);
		assert_eq!(changeset.update_names(), vec!["foo"]);
		assert!(changeset.unchanged.is_empty());
		assert!(changeset.to_create.is_empty());
		assert!(changeset.to_delete.is_empty());

		let pair = &changeset.to_update["foo"];
		assert_eq!(pair.remote.comparable["spec"]["ports"][0]["port"], 8080);
		assert_eq!(pair.local.comparable["spec"]["ports"][0]["port"], 9090);
	}

	#[test]
	fn test_local_only_is_create() {
		let remote = collection(Kind::ConfigMap, &[]);
		let local = collection(
			Kind::ConfigMap,
			&[json!({ "kind": "ConfigMap", "metadata": { "name": "bar" } })],
		);

		let changeset = reconcile(&remote, &local, false);
		assert_eq!(changeset.create_names(), vec!["bar"]);
		assert!(!changeset.is_empty());
	}

	#[test]
	fn test_remote_only_is_delete_unless_upsert_only() {
		let remote = collection(
			Kind::Secret,
			&[json!({ "kind": "Secret", "metadata": { "name": "baz" } })],
		);
		let local = collection(Kind::Secret, &[]);

		let changeset = reconcile(&remote, &local, false);
		assert_eq!(changeset.delete_names(), vec!["baz"]);

		let changeset = reconcile(&remote, &local, true);
		assert!(changeset.is_empty());
		assert!(changeset.to_delete.is_empty());
		assert!(changeset.unchanged.is_empty());
	}

	#[test]
	fn test_reconcile_with_itself_is_all_unchanged() {
		let docs = [service("a", 1), service("b", 2), service("c", 3)];
		let remote = collection(Kind::Service, &docs);
		let local = collection(Kind::Service, &docs);

		let changeset = reconcile(&remote, &local, false);
		assert!(changeset.is_empty());
		assert_eq!(changeset.unchanged_names(), vec!["a", "b", "c"]);
	}

	#[test]
	fn test_partition_is_total_and_upsert_only_changes_only_deletes() {
		let remote = collection(
			Kind::Service,
			&[service("same", 1), service("changed", 1), service("gone", 1)],
		);
		let local = collection(
			Kind::Service,
			&[service("same", 1), service("changed", 2), service("new", 1)],
		);

		let full = reconcile(&remote, &local, false);
		let mut seen: Vec<&str> = full
			.unchanged_names()
			.into_iter()
			.chain(full.create_names())
			.chain(full.update_names())
			.chain(full.delete_names())
			.collect();
		seen.sort_unstable();
		assert_eq!(seen, vec!["changed", "gone", "new", "same"]);

		let upsert = reconcile(&remote, &local, true);
		assert_eq!(upsert.unchanged, full.unchanged);
		assert_eq!(upsert.to_create, full.to_create);
		assert_eq!(upsert.to_update, full.to_update);
		assert!(upsert.to_delete.is_empty());
	}

	#[test]
	fn test_two_empty_collections() {
		let changeset = reconcile(
			&collection(Kind::Route, &[]),
			&collection(Kind::Route, &[]),
			false,
		);
		assert!(changeset.is_empty());
		assert_eq!(changeset.summary(), ChangesetSummary::default());
	}

	#[test]
	fn test_noise_does_not_cause_updates() {
		let mut remote_doc = service("web", 80);
		remote_doc["metadata"]["resourceVersion"] = json!("42");
		remote_doc["status"] = json!({ "loadBalancer": {} });

		let changeset = reconcile(
			&collection(Kind::Service, &[remote_doc]),
			&collection(Kind::Service, &[service("web", 80)]),
			false,
		);
		assert_eq!(changeset.unchanged_names(), vec!["web"]);
	}

	#[test]
	fn test_normalization_failure_names_the_document() {
		let remote = collection(Kind::Route, &[json!({ "kind": "Route", "metadata": {} })]);
		let local = collection(Kind::Route, &[]);

		let err = ReconciliationEngine::default()
			.reconcile(&remote, &local, false)
			.unwrap_err();
		assert_matches!(
			&err,
			ReconcileError::Normalize {
				kind: Kind::Route,
				side: Side::Remote,
				..
			}
		);
		assert_eq!(err.to_string(), "normalizing remote Route document Route/<no name>");
	}

	#[test]
	fn test_summary_adds_up() {
		let total: ChangesetSummary = [
			ChangesetSummary { unchanged: 1, create: 2, update: 0, delete: 1 },
			ChangesetSummary { unchanged: 0, create: 1, update: 1, delete: 0 },
		]
		.into_iter()
		.fold(ChangesetSummary::default(), |a, b| a + b);
		assert_eq!(total.changes(), 5);
		assert_eq!(total.unchanged, 1);
	}
}
