//! Human-readable rendering of changesets and apply reports.
//!
//! Changeset maps are unordered; everything written here is sorted by name
//! so output is stable across runs.

use std::{
	collections::BTreeMap,
	fmt::Display,
	io::{IsTerminal, Write},
};

use clap::ValueEnum;
use nu_ansi_term::{Color, Style};
use serde_json::Value;
use similar::TextDiff;
use tabwriter::TabWriter;
use thiserror::Error;
use tracing::instrument;

use crate::{
	apply::ApplyReport,
	changeset::{Changeset, ChangesetSummary},
	kind::Kind,
	yaml,
};

#[derive(Debug, Error)]
pub enum OutputError {
	#[error("writing output")]
	Write(#[from] std::io::Error),

	#[error("serializing {resource} as YAML")]
	Yaml {
		resource: String,
		#[source]
		source: serde_saphyr::ser_error::Error,
	},
}

/// Controls color in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
	/// Color when stdout is a terminal and `NO_COLOR` is unset
	#[default]
	Auto,
	Always,
	Never,
}

impl ColorMode {
	pub fn should_colorize(self) -> bool {
		match self {
			ColorMode::Always => true,
			ColorMode::Never => false,
			ColorMode::Auto => {
				std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
			}
		}
	}
}

/// Writes changesets the way `status` and `update` show them.
pub struct ChangesetOutput<W: Write> {
	writer: W,
	use_color: bool,
}

impl<W: Write> ChangesetOutput<W> {
	pub fn new(writer: W, color_mode: ColorMode) -> Self {
		Self {
			writer,
			use_color: color_mode.should_colorize(),
		}
	}

	pub fn into_inner(self) -> W {
		self.writer
	}

	fn paint(&self, style: Style, text: impl Display) -> String {
		if self.use_color {
			style.paint(text.to_string()).to_string()
		} else {
			text.to_string()
		}
	}

	pub fn write_header(&mut self, kind: Kind) -> Result<(), OutputError> {
		writeln!(self.writer, "\n========== {kind} resources ==========")?;
		Ok(())
	}

	/// Write one kind's header, one line per resource and a diff for every
	/// resource that would change.
	#[instrument(skip_all, fields(kind = %changeset.kind))]
	pub fn write_changeset(&mut self, changeset: &Changeset) -> Result<(), OutputError> {
		let kind = changeset.kind;
		self.write_header(kind)?;

		for name in changeset.unchanged_names() {
			writeln!(self.writer, "* {name} is in sync")?;
		}

		for name in changeset.delete_names() {
			let line = self.paint(Color::Red.normal(), format_args!("- {name} to be deleted"));
			writeln!(self.writer, "{line}")?;
			let entry = &changeset.to_delete[name];
			self.write_diff(kind, name, Some(&entry.comparable), None)?;
		}

		for name in changeset.create_names() {
			let line = self.paint(Color::Green.normal(), format_args!("+ {name} to be created"));
			writeln!(self.writer, "{line}")?;
			let entry = &changeset.to_create[name];
			self.write_diff(kind, name, None, Some(&entry.comparable))?;
		}

		for name in changeset.update_names() {
			let line = self.paint(Color::Yellow.normal(), format_args!("~ {name} to be updated"));
			writeln!(self.writer, "{line}")?;
			let pair = &changeset.to_update[name];
			self.write_diff(
				kind,
				name,
				Some(&pair.remote.comparable),
				Some(&pair.local.comparable),
			)?;
		}

		Ok(())
	}

	/// Report a kind whose changeset could not be computed.
	pub fn write_failure(
		&mut self,
		kind: Kind,
		error: &(dyn std::error::Error + 'static),
	) -> Result<(), OutputError> {
		self.write_header(kind)?;
		let mut message = error.to_string();
		let mut source = error.source();
		while let Some(cause) = source {
			message.push_str(": ");
			message.push_str(&cause.to_string());
			source = cause.source();
		}
		let line = self.paint(Color::Red.bold(), format_args!("! {message}"));
		writeln!(self.writer, "{line}")?;
		Ok(())
	}

	fn write_diff(
		&mut self,
		kind: Kind,
		name: &str,
		old: Option<&Value>,
		new: Option<&Value>,
	) -> Result<(), OutputError> {
		let resource = format!("{kind}/{name}");
		let render = |value: Option<&Value>| -> Result<String, OutputError> {
			value
				.map(yaml::to_yaml)
				.transpose()
				.map(Option::unwrap_or_default)
				.map_err(|source| OutputError::Yaml {
					resource: resource.clone(),
					source,
				})
		};
		let old_yaml = render(old)?;
		let new_yaml = render(new)?;

		let old_header = if old.is_some() {
			format!("a/{resource}")
		} else {
			"/dev/null".to_string()
		};
		let new_header = if new.is_some() {
			format!("b/{resource}")
		} else {
			"/dev/null".to_string()
		};

		let diff = TextDiff::from_lines(&old_yaml, &new_yaml)
			.unified_diff()
			.context_radius(3)
			.header(&old_header, &new_header)
			.to_string();
		self.write_unified_diff(&diff)
	}

	fn write_unified_diff(&mut self, diff: &str) -> Result<(), OutputError> {
		if !self.use_color {
			write!(self.writer, "{diff}")?;
			return Ok(());
		}

		for line in diff.lines() {
			let style = if line.starts_with("+++") || line.starts_with("---") {
				Style::new().bold()
			} else if line.starts_with('+') {
				Color::Green.normal()
			} else if line.starts_with('-') {
				Color::Red.normal()
			} else if line.starts_with("@@") {
				Color::Cyan.normal()
			} else {
				Style::new()
			};
			writeln!(self.writer, "{}", style.paint(line))?;
		}
		Ok(())
	}

	/// Per-kind counts, followed by a total row.
	#[instrument(skip_all)]
	pub fn write_summary(
		&mut self,
		changesets: &BTreeMap<Kind, Changeset>,
	) -> Result<(), OutputError> {
		writeln!(self.writer)?;
		let mut table = TabWriter::new(&mut self.writer).padding(2);
		writeln!(table, "KIND\tIN SYNC\tCREATE\tUPDATE\tDELETE")?;

		let mut total = ChangesetSummary::default();
		for (kind, changeset) in changesets {
			let s = changeset.summary();
			writeln!(
				table,
				"{kind}\t{}\t{}\t{}\t{}",
				s.unchanged, s.create, s.update, s.delete
			)?;
			total = total + s;
		}
		writeln!(
			table,
			"TOTAL\t{}\t{}\t{}\t{}",
			total.unchanged, total.create, total.update, total.delete
		)?;
		table.flush()?;
		Ok(())
	}

	/// One line per attempted operation, then the failure count.
	pub fn write_apply_report(&mut self, report: &ApplyReport) -> Result<(), OutputError> {
		writeln!(self.writer)?;
		for outcome in &report.outcomes {
			let target = format!("{}/{}", outcome.kind, outcome.name);
			let line = match &outcome.error {
				None => self.paint(
					Color::Green.normal(),
					format_args!("{} {target}: ok", outcome.operation),
				),
				Some(e) => self.paint(
					Color::Red.normal(),
					format_args!("{} {target}: {e:#}", outcome.operation),
				),
			};
			writeln!(self.writer, "{line}")?;
		}

		let totals = format!(
			"Applied {} operation(s), {} failed",
			report.succeeded(),
			report.failed()
		);
		let totals = self.paint(Style::new().bold(), totals);
		writeln!(self.writer, "{totals}")?;
		Ok(())
	}
}
