//! Collaborators backed by the `oc` command-line tool.

mod client;
mod template;

use std::{io, process::ExitStatus};

pub use client::OcClient;
pub use template::OcTemplateRenderer;
use thiserror::Error;

use crate::document::DocumentError;

#[derive(Debug, Error)]
pub enum OcError {
	#[error("failed to execute {binary}")]
	Spawn {
		binary: String,
		#[source]
		source: io::Error,
	},

	#[error("failed to write to `{command}` stdin")]
	Stdin {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("waiting for `{command}`")]
	Wait {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("`{command}` failed ({status}): {stderr}")]
	Failed {
		command: String,
		status: ExitStatus,
		stderr: String,
	},

	#[error("unexpected output from `{command}`")]
	InvalidOutput {
		command: String,
		#[source]
		source: DocumentError,
	},

	#[error("cannot {operation} {document}: missing kind or name")]
	IncompleteDocument {
		operation: &'static str,
		document: String,
	},

	#[error("serializing {document}")]
	Serialize {
		document: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("You need to login with 'oc login' first.")]
	NotLoggedIn(#[source] Box<OcError>),
}
