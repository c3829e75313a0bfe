//! Desired state: template directories rendered into local collections.

use std::{
	path::{Path, PathBuf},
	sync::OnceLock,
};

use bon::Builder;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

use crate::{
	collection::CollectionSet,
	remote::{BoxError, RenderRequest, TemplateRenderer},
};

/// Directory both `--template-dir` and `--param-dir` default to.
pub const DEFAULT_DIR: &str = ".";

/// Extension of per-template parameter files.
pub const PARAM_FILE_EXTENSION: &str = "env";

#[derive(Debug, Error)]
pub enum LocalError {
	#[error("cannot specify both --param-dir and --param-file")]
	ParamDirWithParamFile,

	#[error(
		"{templates} template directories but {params} param directories; \
		 give one --param-dir or one per --template-dir"
	)]
	DirectoryCountMismatch { templates: usize, params: usize },

	#[error("invalid parameter `{0}`, expected KEY=VALUE")]
	InvalidParam(String),

	#[error("reading template directory {}", path.display())]
	ReadDir {
		path: PathBuf,
		#[source]
		source: walkdir::Error,
	},

	#[error("rendering {}", template.display())]
	Render {
		template: PathBuf,
		#[source]
		source: BoxError,
	},
}

/// A template directory with the directory its parameter files live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
	pub template_dir: PathBuf,
	pub param_dir: PathBuf,
}

/// Pair every template directory with a param directory.
///
/// A single param directory serves all template directories; otherwise
/// there must be exactly one per template directory.
pub fn pair_directories(
	template_dirs: &[PathBuf],
	param_dirs: &[PathBuf],
) -> Result<Vec<TemplateSource>, LocalError> {
	let default = [PathBuf::from(DEFAULT_DIR)];
	let template_dirs = if template_dirs.is_empty() {
		&default[..]
	} else {
		template_dirs
	};
	let param_dirs = if param_dirs.is_empty() {
		&default[..]
	} else {
		param_dirs
	};

	match param_dirs {
		[single] => Ok(template_dirs
			.iter()
			.map(|t| TemplateSource {
				template_dir: t.clone(),
				param_dir: single.clone(),
			})
			.collect()),
		many if many.len() == template_dirs.len() => Ok(template_dirs
			.iter()
			.zip(many)
			.map(|(t, p)| TemplateSource {
				template_dir: t.clone(),
				param_dir: p.clone(),
			})
			.collect()),
		many => Err(LocalError::DirectoryCountMismatch {
			templates: template_dirs.len(),
			params: many.len(),
		}),
	}
}

/// `--param-file` only makes sense with the default param directory.
pub fn check_param_sources(
	param_dirs: &[PathBuf],
	param_file: Option<&Path>,
) -> Result<(), LocalError> {
	let custom_dirs = match param_dirs {
		[] => false,
		[single] => single != Path::new(DEFAULT_DIR),
		_ => true,
	};
	if custom_dirs && param_file.is_some() {
		return Err(LocalError::ParamDirWithParamFile);
	}
	Ok(())
}

fn param_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("static pattern"))
}

pub fn validate_params(params: &[String]) -> Result<(), LocalError> {
	match params.iter().find(|p| !param_pattern().is_match(p)) {
		Some(bad) => Err(LocalError::InvalidParam(bad.clone())),
		None => Ok(()),
	}
}

fn is_template_file(path: &Path) -> bool {
	matches!(
		path.extension().and_then(|e| e.to_str()),
		Some("yml" | "yaml")
	)
}

/// Template files directly inside `dir`, sorted by file name.
#[instrument]
pub fn template_files(dir: &Path) -> Result<Vec<PathBuf>, LocalError> {
	let mut files = Vec::new();
	for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
		let entry = entry.map_err(|source| LocalError::ReadDir {
			path: dir.to_path_buf(),
			source,
		})?;
		if entry.file_type().is_file() && is_template_file(entry.path()) {
			files.push(entry.into_path());
		}
	}
	files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
	trace!(count = files.len(), "found templates");
	Ok(files)
}

/// `<param_dir>/<template stem>.env`, if that file exists.
pub fn param_file_for(template: &Path, param_dir: &Path) -> Option<PathBuf> {
	let mut file_name = template.file_stem()?.to_os_string();
	file_name.push(".");
	file_name.push(PARAM_FILE_EXTENSION);
	let candidate = param_dir.join(file_name);
	candidate.is_file().then_some(candidate)
}

/// Render options shared by every template.
#[derive(Debug, Clone, Default, Builder)]
pub struct RenderOptions {
	#[builder(into)]
	pub labels: Option<String>,
	#[builder(default)]
	pub params: Vec<String>,
	/// Overrides the per-template param file lookup.
	#[builder(into)]
	pub param_file: Option<PathBuf>,
	#[builder(default)]
	pub ignore_unknown_parameters: bool,
}

impl RenderOptions {
	fn request_for(&self, template: &Path, param_dir: &Path) -> RenderRequest {
		RenderRequest {
			template: template.to_path_buf(),
			param_file: self
				.param_file
				.clone()
				.or_else(|| param_file_for(template, param_dir)),
			labels: self.labels.clone(),
			params: self.params.clone(),
			ignore_unknown_parameters: self.ignore_unknown_parameters,
		}
	}
}

/// Render every template of every source and merge the output into `local`.
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn assemble_local<R: TemplateRenderer>(
	renderer: &R,
	sources: &[TemplateSource],
	options: &RenderOptions,
	local: &mut CollectionSet,
) -> Result<(), LocalError> {
	validate_params(&options.params)?;

	for source in sources {
		for template in template_files(&source.template_dir)? {
			let request = options.request_for(&template, &source.param_dir);
			let batch = renderer
				.render(&request)
				.map_err(|e| LocalError::Render {
					template: template.clone(),
					source: Box::new(e),
				})?;
			let appended = local.append_matching(&batch);
			debug!(
				template = %template.display(),
				rendered = batch.len(),
				appended,
				"merged template"
			);
		}
	}
	Ok(())
}
