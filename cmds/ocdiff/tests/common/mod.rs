//! In-memory stand-ins for `oc`, shared by the integration tests.

#![allow(dead_code)]

use std::{
	cell::RefCell,
	collections::{BTreeMap, BTreeSet},
	convert::Infallible,
	fs, io,
	path::Path,
};

use ocdiff::{
	commands::util::Settings,
	document::{parse_batch, ResourceDocument},
	kind::Kind,
	output::ColorMode,
	remote::{RemoteApplier, RemoteExporter, RenderRequest, TemplateRenderer},
};
use serde_json::Value;

/// A cluster holding resources in memory, keyed by kind and name.
#[derive(Default)]
pub struct MockCluster {
	resources: RefCell<BTreeMap<(Kind, String), Value>>,
	failing: BTreeSet<String>,
	calls: RefCell<Vec<String>>,
}

fn identity(document: &ResourceDocument) -> io::Result<(Kind, String)> {
	match (document.kind(), document.name()) {
		(Some(kind), Some(name)) => Ok((kind, name.to_string())),
		_ => Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("incomplete document {}", document.describe()),
		)),
	}
}

impl MockCluster {
	pub fn with_resources(values: impl IntoIterator<Item = Value>) -> Self {
		let cluster = Self::default();
		for value in values {
			let document = ResourceDocument::new(value);
			let key = identity(&document).expect("fixture must have kind and name");
			cluster
				.resources
				.borrow_mut()
				.insert(key, document.into_value());
		}
		cluster
	}

	/// Make every write to a resource with this name fail.
	pub fn failing_on(mut self, name: &str) -> Self {
		self.failing.insert(name.to_string());
		self
	}

	pub fn names(&self, kind: Kind) -> Vec<String> {
		self.resources
			.borrow()
			.keys()
			.filter(|(k, _)| *k == kind)
			.map(|(_, name)| name.clone())
			.collect()
	}

	pub fn get(&self, kind: Kind, name: &str) -> Option<Value> {
		self.resources
			.borrow()
			.get(&(kind, name.to_string()))
			.cloned()
	}

	/// Writes in the order they were made, as `verb Kind/name`.
	pub fn calls(&self) -> Vec<String> {
		self.calls.borrow().clone()
	}

	fn write(
		&self,
		verb: &str,
		document: &ResourceDocument,
		f: impl FnOnce(&mut BTreeMap<(Kind, String), Value>, (Kind, String)) -> io::Result<()>,
	) -> io::Result<()> {
		let key = identity(document)?;
		self.calls
			.borrow_mut()
			.push(format!("{verb} {}/{}", key.0, key.1));
		if self.failing.contains(&key.1) {
			return Err(io::Error::other(format!("{verb} rejected for {}", key.1)));
		}
		f(&mut self.resources.borrow_mut(), key)
	}
}

impl RemoteExporter for MockCluster {
	type Error = Infallible;

	fn export_by_kind(&self, kind: Kind) -> Result<Vec<ResourceDocument>, Infallible> {
		Ok(self
			.resources
			.borrow()
			.iter()
			.filter(|((k, _), _)| *k == kind)
			.map(|(_, value)| ResourceDocument::new(value.clone()))
			.collect())
	}
}

impl RemoteApplier for MockCluster {
	type Error = io::Error;

	fn create(&self, document: &ResourceDocument) -> io::Result<()> {
		self.write("create", document, |resources, key| {
			if resources.contains_key(&key) {
				return Err(io::Error::new(io::ErrorKind::AlreadyExists, "already exists"));
			}
			resources.insert(key, document.value().clone());
			Ok(())
		})
	}

	fn update(&self, document: &ResourceDocument) -> io::Result<()> {
		self.write("replace", document, |resources, key| {
			match resources.get_mut(&key) {
				Some(existing) => {
					*existing = document.value().clone();
					Ok(())
				}
				None => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
			}
		})
	}

	fn delete(&self, document: &ResourceDocument) -> io::Result<()> {
		self.write("delete", document, |resources, key| {
			resources
				.remove(&key)
				.map(drop)
				.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))
		})
	}
}

/// Treats every template file as already-rendered YAML and records each
/// request it receives.
#[derive(Default)]
pub struct FileRenderer {
	requests: RefCell<Vec<RenderRequest>>,
}

impl FileRenderer {
	pub fn requests(&self) -> Vec<RenderRequest> {
		self.requests.borrow().clone()
	}
}

impl TemplateRenderer for FileRenderer {
	type Error = io::Error;

	fn render(&self, request: &RenderRequest) -> io::Result<Vec<ResourceDocument>> {
		self.requests.borrow_mut().push(request.clone());
		let content = fs::read_to_string(&request.template)?;
		parse_batch(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
	}
}

/// Settings reading templates and param files from `dir`, without color
/// and without prompting.
pub fn settings(dir: &Path) -> Settings {
	Settings {
		template_dirs: vec![dir.to_path_buf()],
		param_dirs: vec![dir.to_path_buf()],
		non_interactive: true,
		color: ColorMode::Never,
		..Settings::default()
	}
}
