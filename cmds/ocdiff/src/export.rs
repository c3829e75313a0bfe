//! Turning live cluster state into re-applicable templates.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{
	collection::CollectionSet,
	filter::ResourceFilter,
	kind::Kind,
	normalize::Normalizer,
	plan::{assemble_remote, PlanError},
	remote::RemoteExporter,
};

pub const TEMPLATE_API_VERSION: &str = "template.openshift.io/v1";

/// All exported resources of one kind, wrapped in a `Template`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedTemplate {
	pub kind: Kind,
	pub template: Value,
}

impl ExportedTemplate {
	pub fn name(kind: Kind) -> String {
		format!("{}-template", kind.short_name())
	}

	/// `dc-template.yml` and so on.
	pub fn file_name(&self) -> String {
		format!("{}.yml", Self::name(self.kind))
	}

	pub fn object_count(&self) -> usize {
		self.template["objects"].as_array().map_or(0, Vec::len)
	}
}

/// Export every kind in `filters` as a template of its normalized objects.
///
/// Objects are sorted by name. Kinds without matching resources produce no
/// template.
#[instrument(skip_all, fields(kinds = filters.len()))]
pub fn export_templates<E: RemoteExporter>(
	exporter: &E,
	normalizer: &Normalizer,
	filters: &BTreeMap<Kind, ResourceFilter>,
) -> Result<Vec<ExportedTemplate>, PlanError> {
	let mut remote = CollectionSet::from_filters(filters);
	assemble_remote(exporter, &mut remote)?;

	let mut templates = Vec::new();
	for (kind, collection) in remote.iter() {
		if collection.is_empty() {
			debug!(%kind, "nothing to export");
			continue;
		}

		let mut documents: Vec<_> = collection.documents().iter().collect();
		documents.sort_by(|a, b| a.name().cmp(&b.name()));
		let objects: Vec<Value> = documents
			.into_iter()
			.map(|d| normalizer.strip(kind, d.value().clone()))
			.collect();

		templates.push(ExportedTemplate {
			kind,
			template: json!({
				"apiVersion": TEMPLATE_API_VERSION,
				"kind": "Template",
				"metadata": { "name": ExportedTemplate::name(kind) },
				"objects": objects,
				"parameters": [],
			}),
		});
	}
	Ok(templates)
}
