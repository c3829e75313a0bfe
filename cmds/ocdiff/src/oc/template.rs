use std::process::Command;

use tracing::{debug, instrument};

use super::{
	client::{render_command, run_command},
	OcClient, OcError,
};
use crate::{
	document::{parse_batch, ResourceDocument},
	remote::{RenderRequest, TemplateRenderer},
};

/// Renders templates with `oc process --local`, without touching the cluster.
#[derive(Debug, Clone)]
pub struct OcTemplateRenderer {
	client: OcClient,
}

impl OcTemplateRenderer {
	pub fn new(client: OcClient) -> Self {
		Self { client }
	}

	fn command(&self, request: &RenderRequest) -> Command {
		let mut cmd = Command::new(self.client.binary());
		cmd.args(["process", "--local", "--output", "json", "-f"]);
		cmd.arg(&request.template);
		if let Some(labels) = &request.labels {
			cmd.arg("--labels").arg(labels);
		}
		for param in &request.params {
			cmd.arg("--param").arg(param);
		}
		if let Some(param_file) = &request.param_file {
			cmd.arg("--param-file").arg(param_file);
		}
		if request.ignore_unknown_parameters {
			cmd.arg("--ignore-unknown-parameters");
		}
		cmd
	}
}

impl TemplateRenderer for OcTemplateRenderer {
	type Error = OcError;

	#[instrument(skip_all, fields(template = %request.template.display()))]
	fn render(&self, request: &RenderRequest) -> Result<Vec<ResourceDocument>, OcError> {
		let cmd = self.command(request);
		let command = render_command(self.client.binary(), &cmd);
		let out = run_command(cmd, self.client.binary(), None)?;
		let batch =
			parse_batch(&out).map_err(|source| OcError::InvalidOutput { command, source })?;
		debug!(count = batch.len(), "rendered");
		Ok(batch)
	}
}
