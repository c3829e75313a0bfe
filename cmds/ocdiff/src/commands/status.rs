//! Status command handler.

use std::io::Write;

use anyhow::{bail, Result};
use clap::Args;
use tracing::instrument;

use super::util::{ensure_logged_in, ReconcileArgs, Settings};
use crate::{
	kind::Kind,
	oc::OcTemplateRenderer,
	output::{ChangesetOutput, OutputError},
	plan::Plan,
	remote::{RemoteExporter, TemplateRenderer},
};

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
	#[command(flatten)]
	pub reconcile: ReconcileArgs,
}

/// Whether the cluster matches the local templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
	InSync,
	Drifted,
}

pub fn run<W: Write>(settings: &Settings, args: StatusArgs, writer: W) -> Result<Drift> {
	let client = settings.oc_client();
	ensure_logged_in(&client)?;
	let renderer = OcTemplateRenderer::new(client.clone());
	status(settings, &args.reconcile, &renderer, &client, writer)
}

/// Compute the plan and print it.
///
/// Kinds that failed to reconcile are printed in place and turn the whole
/// run into an error once everything else has been shown.
#[instrument(skip_all, fields(resource = ?args.resource))]
pub fn status<R, E, W>(
	settings: &Settings,
	args: &ReconcileArgs,
	renderer: &R,
	exporter: &E,
	writer: W,
) -> Result<Drift>
where
	R: TemplateRenderer,
	E: RemoteExporter,
	W: Write,
{
	let plan = args.plan(settings, renderer, exporter)?;
	let mut output = ChangesetOutput::new(writer, settings.color);
	write_plan(&mut output, &plan)?;

	if !plan.is_complete() {
		bail!(
			"could not reconcile: {}",
			plan.failures
				.keys()
				.map(|kind| kind.as_str())
				.collect::<Vec<_>>()
				.join(", ")
		);
	}

	Ok(if plan.has_changes() {
		Drift::Drifted
	} else {
		Drift::InSync
	})
}

/// Every kind in apply order, then the summary table.
pub(crate) fn write_plan<W: Write>(
	output: &mut ChangesetOutput<W>,
	plan: &Plan,
) -> Result<(), OutputError> {
	for kind in Kind::ALL {
		if let Some(changeset) = plan.changesets.get(&kind) {
			output.write_changeset(changeset)?;
		} else if let Some(error) = plan.failures.get(&kind) {
			output.write_failure(kind, error)?;
		}
	}
	output.write_summary(&plan.changesets)
}
