use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ocdiff::{
	commands::{
		self,
		status::Drift,
		util::{BrokenPipeGuard, GlobalArgs, Settings},
	},
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

/// Exit status of `status` when the cluster differs from the templates.
const EXIT_DRIFT: u8 = 3;

#[derive(Parser)]
#[command(name = "ocdiff")]
#[command(about = "Compare and reconcile OpenShift templates with a live cluster", long_about = None)]
#[command(version = commands::version::VERSION)]
struct Cli {
	#[command(flatten)]
	global: GlobalArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Show diff between remote and local
	Status(commands::status::StatusArgs),

	/// Update remote with local
	Update(commands::update::UpdateArgs),

	/// Export remote state as template
	Export(commands::export::ExportArgs),

	/// Show version
	Version,
}

fn run(cli: Cli) -> Result<ExitCode> {
	telemetry::init(cli.global.log_level, cli.global.default_log_level())?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());
	let global = cli.global;
	let settings = || -> Result<Settings> {
		let cwd = std::env::current_dir().context("resolving current directory")?;
		Settings::load(&global, &cwd)
	};

	match cli.command {
		Commands::Status(args) => match commands::status::run(&settings()?, args, stdout)? {
			Drift::InSync => Ok(ExitCode::SUCCESS),
			Drift::Drifted => Ok(ExitCode::from(EXIT_DRIFT)),
		},
		Commands::Update(args) => {
			commands::update::run(&settings()?, args, stdout)?;
			Ok(ExitCode::SUCCESS)
		}
		Commands::Export(args) => {
			commands::export::run(&settings()?, args, stdout)?;
			Ok(ExitCode::SUCCESS)
		}
		Commands::Version => {
			commands::version::run(stdout)?;
			Ok(ExitCode::SUCCESS)
		}
	}
}

fn main() -> ExitCode {
	match run(Cli::parse()) {
		Ok(code) => code,
		Err(err) => {
			eprintln!("Error: {err:#}");
			ExitCode::FAILURE
		}
	}
}
