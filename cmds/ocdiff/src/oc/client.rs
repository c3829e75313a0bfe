use std::{
	ffi::OsString,
	io::{self, Write},
	process::{Command, Output, Stdio},
};

use bon::Builder;
use tracing::{debug, instrument, trace};

use super::OcError;
use crate::{
	document::{parse_batch, ResourceDocument},
	kind::Kind,
	remote::{RemoteApplier, RemoteExporter},
};

/// Talks to the cluster through `oc`.
///
/// Every invocation is blocking and runs to completion; there are no
/// retries or timeouts.
#[derive(Debug, Clone, Builder)]
pub struct OcClient {
	#[builder(into, default = String::from("oc"))]
	binary: String,
	/// Passed as `--namespace` to every call when set.
	#[builder(into)]
	namespace: Option<String>,
}

impl Default for OcClient {
	fn default() -> Self {
		Self::builder().build()
	}
}

impl OcClient {
	pub fn binary(&self) -> &str {
		&self.binary
	}

	pub(super) fn command(&self) -> Command {
		let mut cmd = Command::new(&self.binary);
		if let Some(namespace) = &self.namespace {
			cmd.arg("--namespace").arg(namespace);
		}
		cmd
	}

	/// Run `oc <args>` and return its stdout.
	pub(super) fn run(
		&self,
		args: impl IntoIterator<Item = impl Into<OsString>>,
		stdin: Option<&[u8]>,
	) -> Result<String, OcError> {
		let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
		let mut cmd = self.command();
		cmd.args(&args);
		run_command(cmd, &self.binary, stdin)
	}

	/// Check that `oc` has a logged-in session.
	#[instrument(skip(self))]
	pub fn whoami(&self) -> Result<String, OcError> {
		self.run(["whoami"], None)
			.map(|user| user.trim().to_string())
			.map_err(|e| OcError::NotLoggedIn(Box::new(e)))
	}

	fn submit(&self, verb: &'static str, document: &ResourceDocument) -> Result<(), OcError> {
		if document.kind().is_none() || document.name().is_none() {
			return Err(OcError::IncompleteDocument {
				operation: verb,
				document: document.describe(),
			});
		}
		let body = serde_json::to_vec(document.value()).map_err(|source| OcError::Serialize {
			document: document.describe(),
			source,
		})?;
		let out = self.run([verb, "-f", "-"], Some(body.as_slice()))?;
		trace!(output = %out.trim(), "oc {verb}");
		Ok(())
	}
}

pub(super) fn render_command(binary: &str, cmd: &Command) -> String {
	let mut rendered = binary.to_string();
	for arg in cmd.get_args() {
		rendered.push(' ');
		rendered.push_str(&arg.to_string_lossy());
	}
	rendered
}

pub(super) fn run_command(
	mut cmd: Command,
	binary: &str,
	stdin: Option<&[u8]>,
) -> Result<String, OcError> {
	let command = render_command(binary, &cmd);
	debug!(%command, "running");

	cmd.stdin(if stdin.is_some() {
		Stdio::piped()
	} else {
		Stdio::null()
	});
	cmd.stdout(Stdio::piped());
	cmd.stderr(Stdio::piped());

	let mut child = cmd.spawn().map_err(|source| OcError::Spawn {
		binary: binary.to_string(),
		source,
	})?;

	if let Some(input) = stdin {
		if let Some(mut pipe) = child.stdin.take() {
			pipe.write_all(input).map_err(|source| OcError::Stdin {
				command: command.clone(),
				source,
			})?;
		}
	}

	finish(command, child.wait_with_output())
}

/// Turn the result of waiting on `oc` into its stdout.
fn finish(command: String, output: io::Result<Output>) -> Result<String, OcError> {
	let output = match output {
		Ok(output) => output,
		Err(source) => return Err(OcError::Wait { command, source }),
	};

	if !output.status.success() {
		return Err(OcError::Failed {
			command,
			status: output.status,
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}

	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl RemoteExporter for OcClient {
	type Error = OcError;

	#[instrument(skip(self))]
	fn export_by_kind(&self, kind: Kind) -> Result<Vec<ResourceDocument>, OcError> {
		let args = ["get", kind.as_str(), "--output", "json"];
		let out = self.run(args, None)?;
		let batch = parse_batch(&out).map_err(|source| OcError::InvalidOutput {
			command: format!("{} {}", self.binary, args.join(" ")),
			source,
		})?;
		debug!(count = batch.len(), "exported");
		Ok(batch)
	}
}

impl RemoteApplier for OcClient {
	type Error = OcError;

	#[instrument(skip_all, fields(document = %document))]
	fn create(&self, document: &ResourceDocument) -> Result<(), OcError> {
		self.submit("create", document)
	}

	#[instrument(skip_all, fields(document = %document))]
	fn update(&self, document: &ResourceDocument) -> Result<(), OcError> {
		self.submit("replace", document)
	}

	#[instrument(skip_all, fields(document = %document))]
	fn delete(&self, document: &ResourceDocument) -> Result<(), OcError> {
		let (Some(kind), Some(name)) = (document.kind(), document.name()) else {
			return Err(OcError::IncompleteDocument {
				operation: "delete",
				document: document.describe(),
			});
		};
		self.run(["delete", kind.as_str(), name], None)?;
		Ok(())
	}
}
