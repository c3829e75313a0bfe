//! Gathering both sides and reconciling every requested kind.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{instrument, warn};

use crate::{
	changeset::{Changeset, ChangesetSummary, ReconcileError, ReconciliationEngine},
	collection::CollectionSet,
	filter::ResourceFilter,
	kind::Kind,
	local::{assemble_local, LocalError, RenderOptions, TemplateSource},
	remote::{BoxError, RemoteExporter, TemplateRenderer},
};

#[derive(Debug, Error)]
pub enum PlanError {
	#[error(transparent)]
	Local(#[from] LocalError),

	#[error("exporting {kind} resources")]
	Export {
		kind: Kind,
		#[source]
		source: BoxError,
	},
}

/// Changesets for every kind that reconciled, and the error for every kind
/// that did not.
#[derive(Debug, Default)]
pub struct Plan {
	pub changesets: BTreeMap<Kind, Changeset>,
	pub failures: BTreeMap<Kind, ReconcileError>,
}

impl Plan {
	/// Whether any reconciled kind has something to create, update or delete.
	pub fn has_changes(&self) -> bool {
		self.changesets.values().any(|c| !c.is_empty())
	}

	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn summary(&self) -> ChangesetSummary {
		self.changesets
			.values()
			.map(Changeset::summary)
			.fold(ChangesetSummary::default(), |a, b| a + b)
	}
}

/// Merge the live resources of every kind in `remote` into it.
#[instrument(skip_all)]
pub fn assemble_remote<E: RemoteExporter>(
	exporter: &E,
	remote: &mut CollectionSet,
) -> Result<(), PlanError> {
	let kinds: Vec<Kind> = remote.kinds().collect();
	for kind in kinds {
		let batch = exporter
			.export_by_kind(kind)
			.map_err(|e| PlanError::Export {
				kind,
				source: Box::new(e),
			})?;
		remote.append_matching(&batch);
	}
	Ok(())
}

/// Reconcile each kind independently; a failing kind does not stop the others.
#[instrument(skip_all, fields(upsert_only = upsert_only))]
pub fn reconcile_all(
	engine: &ReconciliationEngine,
	remote: &CollectionSet,
	local: &CollectionSet,
	upsert_only: bool,
) -> Plan {
	let mut plan = Plan::default();
	for (kind, remote) in remote.iter() {
		let Some(local) = local.get(kind) else {
			continue;
		};
		match engine.reconcile(remote, local, upsert_only) {
			Ok(changeset) => {
				plan.changesets.insert(kind, changeset);
			}
			Err(e) => {
				warn!(%kind, error = %e, "reconciliation failed");
				plan.failures.insert(kind, e);
			}
		}
	}
	plan
}

/// Everything [`compute_plan`] needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PlanInputs<'a> {
	pub filters: &'a BTreeMap<Kind, ResourceFilter>,
	pub sources: &'a [TemplateSource],
	pub render: &'a RenderOptions,
	pub upsert_only: bool,
}

/// Render local templates, export remote state and reconcile them.
///
/// Collaborator failures abort the whole computation. Reconciliation
/// failures are per kind and end up in [`Plan::failures`].
#[instrument(skip_all, fields(kinds = inputs.filters.len()))]
pub fn compute_plan<R: TemplateRenderer, E: RemoteExporter>(
	renderer: &R,
	exporter: &E,
	engine: &ReconciliationEngine,
	inputs: &PlanInputs<'_>,
) -> Result<Plan, PlanError> {
	let mut local = CollectionSet::from_filters(inputs.filters);
	assemble_local(renderer, inputs.sources, inputs.render, &mut local)?;

	let mut remote = CollectionSet::from_filters(inputs.filters);
	assemble_remote(exporter, &mut remote)?;

	Ok(reconcile_all(engine, &remote, &local, inputs.upsert_only))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::{document::ResourceDocument, filter::resolve_filters, kind::KindTable};

	fn set(expression: &str, docs: &[serde_json::Value]) -> CollectionSet {
		let filters = resolve_filters(expression, None, &KindTable::default()).unwrap();
		let mut set = CollectionSet::from_filters(&filters);
		let docs: Vec<_> = docs.iter().cloned().map(ResourceDocument::new).collect();
		set.append_matching(&docs);
		set
	}

	#[test]
	fn test_failing_kind_does_not_block_others() {
		let remote = set(
			"svc,route",
			&[
				json!({ "kind": "Service", "metadata": { "name": "web" } }),
				json!({ "kind": "Route", "metadata": { "name": "" } }),
			],
		);
		let local = set(
			"svc,route",
			&[json!({ "kind": "Service", "metadata": { "name": "web" } })],
		);

		let plan = reconcile_all(&ReconciliationEngine::default(), &remote, &local, false);
		assert!(!plan.is_complete());
		assert!(plan.failures.contains_key(&Kind::Route));
		assert!(plan.changesets[&Kind::Service].is_empty());
		assert!(!plan.has_changes());
	}

	#[test]
	fn test_summary_spans_kinds() {
		let remote = set("svc,cm", &[json!({ "kind": "ConfigMap", "metadata": { "name": "old" } })]);
		let local = set("svc,cm", &[json!({ "kind": "Service", "metadata": { "name": "new" } })]);

		let plan = reconcile_all(&ReconciliationEngine::default(), &remote, &local, false);
		assert!(plan.has_changes());
		let summary = plan.summary();
		assert_eq!((summary.create, summary.delete), (1, 1));
	}
}
