use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use wd_runtime::ServerKind;

/// Root CLI for wd.
#[derive(Parser, Debug)]
#[command(name = "wd")]
#[command(about = "Lifecycle manager for local WebDriver servers")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug for wd, -vv debug for everything)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Path to a JSON configuration file.
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Download the server jar and driver binaries.
	Install,
	/// Start a server in the foreground; Ctrl-C stops it.
	Start(StartArgs),
	/// Probe whether a server is already answering.
	Status,
	/// Print the server URL derived from the configuration.
	Url,
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
	/// Which server variant to launch.
	#[arg(long, value_enum, default_value = "selenium")]
	pub server: ServerArg,

	/// Start without installing binaries first.
	#[arg(long)]
	pub skip_install: bool,

	/// Treat an already-running server as success instead of failing.
	#[arg(long)]
	pub reuse: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServerArg {
	Selenium,
	Chromedriver,
}

impl From<ServerArg> for ServerKind {
	fn from(arg: ServerArg) -> Self {
		match arg {
			ServerArg::Selenium => ServerKind::Selenium,
			ServerArg::Chromedriver => ServerKind::ChromeDriver,
		}
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[test]
	fn start_defaults_to_selenium() {
		let cli = Cli::parse_from(["wd", "start"]);
		match cli.command {
			Commands::Start(args) => {
				assert_eq!(args.server, ServerArg::Selenium);
				assert!(!args.reuse);
				assert!(!args.skip_install);
			}
			other => panic!("expected start, got {other:?}"),
		}
	}

	#[test]
	fn start_accepts_chromedriver_and_reuse() {
		let cli = Cli::parse_from(["wd", "start", "--server", "chromedriver", "--reuse"]);
		match cli.command {
			Commands::Start(args) => {
				assert_eq!(args.server, ServerArg::Chromedriver);
				assert!(args.reuse);
			}
			other => panic!("expected start, got {other:?}"),
		}
	}

	#[test]
	fn config_flag_is_global() {
		let cli = Cli::parse_from(["wd", "status", "--config", "wd.json"]);
		assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("wd.json")));
	}
}
