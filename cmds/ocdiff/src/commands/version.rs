//! Version command handler.

use std::io::Write;

use anyhow::Result;

pub const VERSION: &str = env!("OCDIFF_VERSION");

pub fn run<W: Write>(mut writer: W) -> Result<()> {
	writeln!(writer, "{VERSION}")?;
	Ok(())
}
