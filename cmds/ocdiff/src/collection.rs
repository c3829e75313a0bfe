//! Filter-scoped accumulation of resource documents.

use std::collections::BTreeMap;

use tracing::trace;

use crate::{document::ResourceDocument, filter::ResourceFilter, kind::Kind};

/// Documents of one kind that passed that kind's filter, in arrival order.
///
/// Merges are additive and never deduplicate by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection {
	filter: ResourceFilter,
	documents: Vec<ResourceDocument>,
}

impl ResourceCollection {
	pub fn new(filter: ResourceFilter) -> Self {
		Self {
			filter,
			documents: Vec::new(),
		}
	}

	pub fn kind(&self) -> Kind {
		self.filter.kind
	}

	pub fn filter(&self) -> &ResourceFilter {
		&self.filter
	}

	pub fn documents(&self) -> &[ResourceDocument] {
		&self.documents
	}

	pub fn len(&self) -> usize {
		self.documents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.is_empty()
	}

	/// Whether `document` belongs in this collection.
	pub fn admits(&self, document: &ResourceDocument) -> bool {
		if document.kind() != Some(self.filter.kind) {
			return false;
		}
		if !self.filter.admits_labels(&document.labels()) {
			return false;
		}
		if self.filter.restricts_names() {
			return document
				.name()
				.is_some_and(|name| self.filter.admits_name(name));
		}
		true
	}

	/// Append every document of `batch` that passes the filter.
	///
	/// Returns the number of documents appended.
	pub fn append_matching<'a>(
		&mut self,
		batch: impl IntoIterator<Item = &'a ResourceDocument>,
	) -> usize {
		let before = self.documents.len();
		for document in batch {
			if self.admits(document) {
				self.documents.push(document.clone());
			}
		}
		self.documents.len() - before
	}
}

/// One collection per requested kind, built from a set of filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionSet {
	collections: BTreeMap<Kind, ResourceCollection>,
}

impl CollectionSet {
	pub fn from_filters(filters: &BTreeMap<Kind, ResourceFilter>) -> Self {
		Self {
			collections: filters
				.iter()
				.map(|(kind, filter)| (*kind, ResourceCollection::new(filter.clone())))
				.collect(),
		}
	}

	/// Route each document of `batch` to its kind's collection.
	///
	/// Documents whose kind has no filter, or which fail their kind's filter,
	/// are ignored. Returns the number of documents appended across all kinds.
	pub fn append_matching(&mut self, batch: &[ResourceDocument]) -> usize {
		let mut appended = 0;
		for document in batch {
			let Some(collection) = document.kind().and_then(|k| self.collections.get_mut(&k))
			else {
				trace!(document = %document, "no filter for kind, ignoring");
				continue;
			};
			appended += collection.append_matching(std::iter::once(document));
		}
		appended
	}

	pub fn get(&self, kind: Kind) -> Option<&ResourceCollection> {
		self.collections.get(&kind)
	}

	pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
		self.collections.keys().copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = (Kind, &ResourceCollection)> {
		self.collections.iter().map(|(k, c)| (*k, c))
	}
}
