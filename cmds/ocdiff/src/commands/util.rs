//! Utilities shared by command handlers.

use std::{
	collections::BTreeMap,
	io::{self, ErrorKind, IsTerminal, Write},
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{debug, Level};

use crate::{
	changeset::ReconciliationEngine,
	config::OcdiffConfig,
	filter::{resolve_filters, ResourceFilter},
	kind::{Kind, KindTable},
	local::{check_param_sources, pair_directories, RenderOptions, DEFAULT_DIR},
	normalize::{NoiseConfig, Normalizer},
	oc::OcClient,
	output::ColorMode,
	plan::{compute_plan, Plan, PlanInputs},
	remote::{RemoteExporter, TemplateRenderer},
};

/// Flags accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
	/// Enable verbose output
	#[arg(short, long, global = true, env = "OCDIFF_VERBOSE")]
	pub verbose: bool,

	/// Apply changes without asking for confirmation
	#[arg(long, global = true, env = "OCDIFF_NON_INTERACTIVE")]
	pub non_interactive: bool,

	/// Namespace (omit to use current)
	#[arg(short, long, global = true, env = "OCDIFF_NAMESPACE")]
	pub namespace: Option<String>,

	/// Selector (label query) to filter on
	#[arg(short = 'l', long, global = true, env = "OCDIFF_SELECTOR")]
	pub selector: Option<String>,

	/// Path to local templates
	#[arg(
		short = 't',
		long,
		global = true,
		env = "OCDIFF_TEMPLATE_DIR",
		value_delimiter = ',',
		default_value = DEFAULT_DIR
	)]
	pub template_dir: Vec<PathBuf>,

	/// Path to param files for local templates
	#[arg(
		short = 'p',
		long,
		global = true,
		env = "OCDIFF_PARAM_DIR",
		value_delimiter = ',',
		default_value = DEFAULT_DIR
	)]
	pub param_dir: Vec<PathBuf>,

	/// Log level (trace, debug, info, warn, error); overrides RUST_LOG
	#[arg(long, global = true, env = "OCDIFF_LOG_LEVEL")]
	pub log_level: Option<Level>,

	/// Controls color in output
	#[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto, env = "OCDIFF_COLOR")]
	pub color: ColorMode,

	/// oc binary to invoke
	#[arg(long, global = true, default_value = "oc", env = "OCDIFF_OC_BINARY")]
	pub oc_binary: String,
}

impl GlobalArgs {
	pub fn default_log_level(&self) -> Level {
		if self.verbose {
			Level::DEBUG
		} else {
			Level::WARN
		}
	}
}

/// Everything a command needs to know about its environment, built once at
/// startup from the CLI and `.ocdiff-config.yaml`.
#[derive(Debug, Clone)]
pub struct Settings {
	pub namespace: Option<String>,
	pub selector: Option<String>,
	pub template_dirs: Vec<PathBuf>,
	pub param_dirs: Vec<PathBuf>,
	pub non_interactive: bool,
	pub color: ColorMode,
	pub oc_binary: String,
	pub noise: NoiseConfig,
	pub kinds: KindTable,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			namespace: None,
			selector: None,
			template_dirs: vec![PathBuf::from(DEFAULT_DIR)],
			param_dirs: vec![PathBuf::from(DEFAULT_DIR)],
			non_interactive: false,
			color: ColorMode::Auto,
			oc_binary: "oc".to_string(),
			noise: NoiseConfig::default(),
			kinds: KindTable::default(),
		}
	}
}

impl Settings {
	/// Merge CLI flags over the config file found from `cwd`.
	pub fn load(global: &GlobalArgs, cwd: &Path) -> Result<Self> {
		let config = OcdiffConfig::load_from_directory(cwd)?.unwrap_or_default();
		debug!(?config, "loaded config");
		Ok(Self::from_parts(global, config))
	}

	pub fn from_parts(global: &GlobalArgs, config: OcdiffConfig) -> Self {
		Self {
			namespace: global.namespace.clone().or(config.namespace),
			selector: global.selector.clone(),
			template_dirs: global.template_dir.clone(),
			param_dirs: global.param_dir.clone(),
			non_interactive: global.non_interactive,
			color: global.color,
			oc_binary: global.oc_binary.clone(),
			noise: config.noise.resolve(),
			kinds: KindTable::default(),
		}
	}

	pub fn oc_client(&self) -> OcClient {
		OcClient::builder()
			.binary(self.oc_binary.clone())
			.maybe_namespace(self.namespace.clone())
			.build()
	}

	pub fn engine(&self) -> ReconciliationEngine {
		ReconciliationEngine::new(Normalizer::new(self.noise.clone()))
	}

	/// Resolve a `resource` argument against the kind table and selector.
	pub fn filters(&self, resource: Option<&str>) -> Result<BTreeMap<Kind, ResourceFilter>> {
		Ok(resolve_filters(
			resource.unwrap_or_default(),
			self.selector.as_deref(),
			&self.kinds,
		)?)
	}
}

/// Flags shared by `status` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct ReconcileArgs {
	/// Remote resource (defaults to all), e.g. `dc/payments,svc`
	pub resource: Option<String>,

	/// Label to set in all resources for this template
	#[arg(long)]
	pub labels: Option<String>,

	/// Set or override a template parameter (KEY=VALUE)
	#[arg(long = "param")]
	pub params: Vec<String>,

	/// File containing template parameter values to set/override
	#[arg(long)]
	pub param_file: Option<PathBuf>,

	/// Don't stop if a provided parameter does not exist in the template
	#[arg(long)]
	pub ignore_unknown_parameters: bool,

	/// Don't delete resources, only create and update
	#[arg(short = 'u', long)]
	pub upsert_only: bool,
}

impl ReconcileArgs {
	/// Render, export and reconcile everything these flags select.
	pub fn plan<R: TemplateRenderer, E: RemoteExporter>(
		&self,
		settings: &Settings,
		renderer: &R,
		exporter: &E,
	) -> Result<Plan> {
		check_param_sources(&settings.param_dirs, self.param_file.as_deref())?;
		let filters = settings.filters(self.resource.as_deref())?;
		let sources = pair_directories(&settings.template_dirs, &settings.param_dirs)?;
		let render = RenderOptions::builder()
			.maybe_labels(self.labels.clone())
			.params(self.params.clone())
			.maybe_param_file(self.param_file.clone())
			.ignore_unknown_parameters(self.ignore_unknown_parameters)
			.build();

		let inputs = PlanInputs {
			filters: &filters,
			sources: &sources,
			render: &render,
			upsert_only: self.upsert_only,
		};
		compute_plan(renderer, exporter, &settings.engine(), &inputs)
			.context("computing changesets")
	}
}

/// Fail unless `oc` has a logged-in session.
pub fn ensure_logged_in(client: &OcClient) -> Result<()> {
	let user = client.whoami()?;
	debug!(%user, "logged in");
	Ok(())
}

/// Ask a yes/no question on stderr.
pub fn prompt_confirmation(question: &str) -> Result<bool> {
	if !io::stdin().is_terminal() {
		bail!("cannot ask for confirmation: stdin is not a terminal (use --non-interactive)");
	}

	eprint!("\n{question} [y/N]: ");
	io::stderr().flush()?;

	let mut input = String::new();
	io::stdin().read_line(&mut input)?;

	let input = input.trim().to_lowercase();
	Ok(input == "y" || input == "yes")
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `ocdiff status | head`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
