use anyhow::{Context, Result};
use wd_runtime::{ServerKind, WebDriverController};

use crate::cli::{Cli, Commands, StartArgs};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let controller = match &cli.config {
		Some(path) => WebDriverController::from_config_file(path)
			.with_context(|| format!("loading config from {}", path.display()))?,
		None => WebDriverController::default(),
	};

	match cli.command {
		Commands::Install => {
			controller.install().await?;
			Ok(())
		}
		Commands::Start(args) => start(&controller, args).await,
		Commands::Status => status(&controller).await,
		Commands::Url => {
			println!("{}", controller.url_string());
			Ok(())
		}
	}
}

async fn start(controller: &WebDriverController, args: StartArgs) -> Result<()> {
	let kind = ServerKind::from(args.server);
	let error_if_started = !args.reuse;

	if args.skip_install {
		match kind {
			ServerKind::Selenium => controller.start_selenium(error_if_started).await?,
			ServerKind::ChromeDriver => controller.start_chromedriver(error_if_started).await?,
		}
	} else {
		controller.auto_start(kind, error_if_started).await?;
	}

	println!("WebDriver server ready on {}", controller.url_string());
	println!("Press Ctrl-C to stop.");
	tokio::signal::ctrl_c().await?;
	controller.stop().await;
	Ok(())
}

async fn status(controller: &WebDriverController) -> Result<()> {
	let body = controller
		.is_started()
		.await
		.with_context(|| format!("no server answering on {}", controller.status_url()))?;
	println!("{}", serde_json::to_string_pretty(&body)?);
	Ok(())
}
