//! Configuration file support for ocdiff
//!
//! ocdiff looks for `.ocdiff-config.yaml` in the working directory and every
//! parent up to the filesystem root; the first one found wins.

use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
	kind::Kind,
	normalize::{NoiseConfig, NoisePath},
};

/// The name of the config file ocdiff looks for
pub const CONFIG_FILE_NAME: &str = ".ocdiff-config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file: {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},
}

/// Root structure of `.ocdiff-config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OcdiffConfig {
	/// Default for `--namespace`
	#[serde(default)]
	pub namespace: Option<String>,

	#[serde(default)]
	pub noise: NoiseSection,
}

/// Overrides for the fields ignored during comparison.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NoiseSection {
	/// Replaces the default global paths when present
	#[serde(default)]
	pub paths: Option<Vec<NoisePath>>,

	/// Appended to the global paths, default or replaced
	#[serde(default)]
	pub extra_paths: Vec<NoisePath>,

	/// Replaces the default reserved annotation prefixes when present
	#[serde(default)]
	pub annotation_prefixes: Option<Vec<String>>,

	/// Appended to the built-in per-kind paths
	#[serde(default)]
	pub kinds: BTreeMap<Kind, Vec<NoisePath>>,
}

impl NoiseSection {
	/// Apply these overrides on top of the built-in defaults.
	pub fn resolve(&self) -> NoiseConfig {
		let mut noise = NoiseConfig::default();
		if let Some(paths) = &self.paths {
			noise.paths = paths.clone();
		}
		noise.paths.extend(self.extra_paths.iter().cloned());
		if let Some(prefixes) = &self.annotation_prefixes {
			noise.annotation_prefixes = prefixes.clone();
		}
		for (kind, paths) in &self.kinds {
			noise
				.per_kind
				.entry(*kind)
				.or_default()
				.extend(paths.iter().cloned());
		}
		noise
	}
}

impl OcdiffConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>, ConfigError> {
		match find_config_file(start_dir) {
			Some(path) => Self::load_from_file(&path).map(Some),
			None => Ok(None),
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
		debug!(path = %path.display(), "loading config");
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		serde_yaml_with_quirks::from_str(&content).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}
