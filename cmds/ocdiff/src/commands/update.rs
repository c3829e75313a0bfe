//! Update command handler.

use std::io::Write;

use anyhow::{bail, Result};
use clap::Args;
use tracing::{info, instrument};

use super::{
	status::write_plan,
	util::{ensure_logged_in, prompt_confirmation, ReconcileArgs, Settings},
};
use crate::{
	apply::ApplyExecutor,
	oc::OcTemplateRenderer,
	output::ChangesetOutput,
	remote::{RemoteApplier, RemoteExporter, TemplateRenderer},
};

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
	#[command(flatten)]
	pub reconcile: ReconcileArgs,
}

pub fn run<W: Write>(settings: &Settings, args: UpdateArgs, writer: W) -> Result<()> {
	let client = settings.oc_client();
	ensure_logged_in(&client)?;
	let renderer = OcTemplateRenderer::new(client.clone());
	update(
		settings,
		&args.reconcile,
		&renderer,
		&client,
		&client,
		|| prompt_confirmation("Apply changes?"),
		writer,
	)
}

/// Show the plan, ask for confirmation and apply it.
///
/// Nothing is applied when any kind failed to reconcile. `confirm` is not
/// consulted in non-interactive mode.
#[instrument(skip_all, fields(resource = ?args.resource, upsert_only = args.upsert_only))]
pub fn update<R, E, A, C, W>(
	settings: &Settings,
	args: &ReconcileArgs,
	renderer: &R,
	exporter: &E,
	applier: A,
	confirm: C,
	writer: W,
) -> Result<()>
where
	R: TemplateRenderer,
	E: RemoteExporter,
	A: RemoteApplier,
	C: FnOnce() -> Result<bool>,
	W: Write,
{
	let plan = args.plan(settings, renderer, exporter)?;
	let mut output = ChangesetOutput::new(writer, settings.color);
	write_plan(&mut output, &plan)?;

	if !plan.is_complete() {
		bail!("not applying anything: some kinds could not be reconciled");
	}

	let mut writer = output.into_inner();
	if !plan.has_changes() {
		writeln!(writer, "\nEverything is in sync. Nothing to update.")?;
		return Ok(());
	}

	if !settings.non_interactive && !confirm()? {
		writeln!(writer, "Aborted.")?;
		return Ok(());
	}

	let summary = plan.summary();
	info!(
		changes = summary.changes(),
		create = summary.create,
		update = summary.update,
		delete = summary.delete,
		"applying changes"
	);
	let report = ApplyExecutor::new(applier).apply(&plan.changesets);

	let mut output = ChangesetOutput::new(writer, settings.color);
	output.write_apply_report(&report)?;

	if !report.is_success() {
		bail!("{} operation(s) failed", report.failed());
	}
	Ok(())
}
