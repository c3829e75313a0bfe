//! Export command handler.

use std::{fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::instrument;

use super::util::{ensure_logged_in, Settings};
use crate::{
	export::export_templates,
	normalize::Normalizer,
	remote::RemoteExporter,
	yaml,
};

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
	/// Remote resource (defaults to all)
	pub resource: Option<String>,

	/// Write one file per kind instead of printing to stdout
	#[arg(short = 'w', long)]
	pub write_files_by_kind: bool,

	/// Directory for files written by --write-files-by-kind
	#[arg(long, default_value = ".")]
	pub output_dir: PathBuf,
}

pub fn run<W: Write>(settings: &Settings, args: ExportArgs, writer: W) -> Result<()> {
	let client = settings.oc_client();
	ensure_logged_in(&client)?;
	export(settings, &args, &client, writer)
}

/// Export live resources as templates, either to `writer` as a YAML stream
/// or to `<short>-template.yml` files.
#[instrument(skip_all, fields(resource = ?args.resource, write_files = args.write_files_by_kind))]
pub fn export<E: RemoteExporter, W: Write>(
	settings: &Settings,
	args: &ExportArgs,
	exporter: &E,
	mut writer: W,
) -> Result<()> {
	let filters = settings.filters(args.resource.as_deref())?;
	let normalizer = Normalizer::new(settings.noise.clone());
	let templates = export_templates(exporter, &normalizer, &filters)?;

	if !args.write_files_by_kind {
		let stream = yaml::to_yaml_stream(templates.iter().map(|t| &t.template))
			.context("serializing templates")?;
		write!(writer, "{stream}")?;
		return Ok(());
	}

	if !templates.is_empty() {
		fs::create_dir_all(&args.output_dir)
			.with_context(|| format!("creating {}", args.output_dir.display()))?;
	}
	for template in &templates {
		let path = args.output_dir.join(template.file_name());
		let content = yaml::to_yaml(&template.template)
			.with_context(|| format!("serializing {} template", template.kind))?;
		fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
		writeln!(
			writer,
			"Exported {} resources to {}",
			template.kind,
			path.display()
		)?;
	}
	Ok(())
}
