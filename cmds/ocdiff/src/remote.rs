//! Seams to the systems ocdiff does not implement itself: the template
//! renderer and the cluster.
//!
//! The `oc` module backs all three traits with the `oc` command-line tool;
//! tests use in-memory fakes.

use std::path::PathBuf;

use bon::Builder;

use crate::{document::ResourceDocument, kind::Kind};

/// Collaborator errors once their concrete type no longer matters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Inputs for rendering one template file.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct RenderRequest {
	#[builder(into)]
	pub template: PathBuf,
	/// Per-template parameter file, passed verbatim to the renderer.
	#[builder(into)]
	pub param_file: Option<PathBuf>,
	/// Labels added to every rendered object (`--labels`).
	#[builder(into)]
	pub labels: Option<String>,
	/// `KEY=VALUE` parameter overrides.
	#[builder(default)]
	pub params: Vec<String>,
	#[builder(default)]
	pub ignore_unknown_parameters: bool,
}

pub trait TemplateRenderer {
	type Error: std::error::Error + Send + Sync + 'static;

	fn render(&self, request: &RenderRequest) -> Result<Vec<ResourceDocument>, Self::Error>;
}

pub trait RemoteExporter {
	type Error: std::error::Error + Send + Sync + 'static;

	/// Every live resource of `kind` in the current namespace.
	fn export_by_kind(&self, kind: Kind) -> Result<Vec<ResourceDocument>, Self::Error>;
}

pub trait RemoteApplier {
	type Error: std::error::Error + Send + Sync + 'static;

	fn create(&self, document: &ResourceDocument) -> Result<(), Self::Error>;

	/// Replace the live resource with `document`.
	fn update(&self, document: &ResourceDocument) -> Result<(), Self::Error>;

	fn delete(&self, document: &ResourceDocument) -> Result<(), Self::Error>;
}

impl<T: TemplateRenderer + ?Sized> TemplateRenderer for &T {
	type Error = T::Error;

	fn render(&self, request: &RenderRequest) -> Result<Vec<ResourceDocument>, Self::Error> {
		(**self).render(request)
	}
}

impl<T: RemoteExporter + ?Sized> RemoteExporter for &T {
	type Error = T::Error;

	fn export_by_kind(&self, kind: Kind) -> Result<Vec<ResourceDocument>, Self::Error> {
		(**self).export_by_kind(kind)
	}
}

impl<T: RemoteApplier + ?Sized> RemoteApplier for &T {
	type Error = T::Error;

	fn create(&self, document: &ResourceDocument) -> Result<(), Self::Error> {
		(**self).create(document)
	}

	fn update(&self, document: &ResourceDocument) -> Result<(), Self::Error> {
		(**self).update(document)
	}

	fn delete(&self, document: &ResourceDocument) -> Result<(), Self::Error> {
		(**self).delete(document)
	}
}
