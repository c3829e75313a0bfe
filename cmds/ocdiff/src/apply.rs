//! Applying changesets to the cluster.
//!
//! Application is a single best-effort pass: every operation is attempted,
//! failures are recorded next to successes, and nothing is rolled back.

use std::{collections::BTreeMap, fmt};

use tracing::{info, instrument, warn};

use crate::{changeset::Changeset, document::ResourceDocument, kind::Kind, remote::RemoteApplier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
	Create,
	Update,
	Delete,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Operation::Create => "create",
			Operation::Update => "update",
			Operation::Delete => "delete",
		})
	}
}

/// Result of one remote operation.
#[derive(Debug)]
pub struct ApplyOutcome {
	pub kind: Kind,
	pub name: String,
	pub operation: Operation,
	pub error: Option<anyhow::Error>,
}

impl ApplyOutcome {
	pub fn succeeded(&self) -> bool {
		self.error.is_none()
	}
}

/// Every operation attempted by one [`ApplyExecutor::apply`] call, in order.
#[derive(Debug, Default)]
pub struct ApplyReport {
	pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
	pub fn failures(&self) -> impl Iterator<Item = &ApplyOutcome> {
		self.outcomes.iter().filter(|o| !o.succeeded())
	}

	pub fn failed(&self) -> usize {
		self.failures().count()
	}

	pub fn succeeded(&self) -> usize {
		self.outcomes.len() - self.failed()
	}

	pub fn is_success(&self) -> bool {
		self.failed() == 0
	}
}

pub struct ApplyExecutor<A> {
	applier: A,
}

impl<A: RemoteApplier> ApplyExecutor<A> {
	pub fn new(applier: A) -> Self {
		Self { applier }
	}

	/// Apply `changesets` in kind order; within a kind, creations come first,
	/// then updates, then deletions, each sorted by name.
	#[instrument(skip_all, fields(kinds = changesets.len()))]
	pub fn apply(&self, changesets: &BTreeMap<Kind, Changeset>) -> ApplyReport {
		let mut report = ApplyReport::default();

		for (kind, changeset) in changesets {
			for name in changeset.create_names() {
				let document = &changeset.to_create[name].document;
				report
					.outcomes
					.push(self.run(*kind, name, Operation::Create, document));
			}
			for name in changeset.update_names() {
				let document = &changeset.to_update[name].local.document;
				report
					.outcomes
					.push(self.run(*kind, name, Operation::Update, document));
			}
			for name in changeset.delete_names() {
				let document = &changeset.to_delete[name].document;
				report
					.outcomes
					.push(self.run(*kind, name, Operation::Delete, document));
			}
		}

		info!(
			succeeded = report.succeeded(),
			failed = report.failed(),
			"apply finished"
		);
		report
	}

	fn run(
		&self,
		kind: Kind,
		name: &str,
		operation: Operation,
		document: &ResourceDocument,
	) -> ApplyOutcome {
		let result = match operation {
			Operation::Create => self.applier.create(document),
			Operation::Update => self.applier.update(document),
			Operation::Delete => self.applier.delete(document),
		};

		let error = match result {
			Ok(()) => {
				info!(%kind, name, %operation, "applied");
				None
			}
			Err(e) => {
				warn!(%kind, name, %operation, error = %e, "operation failed, continuing");
				Some(anyhow::Error::new(e))
			}
		};

		ApplyOutcome {
			kind,
			name: name.to_string(),
			operation,
			error,
		}
	}
}
