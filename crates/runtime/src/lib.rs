//! Lifecycle management for local WebDriver servers.
//!
//! Installs Selenium/driver binaries, starts a server child process, detects
//! whether one is already answering, derives the URL it listens on, and stops
//! it cleanly:
//!
//! - **Controller**: sequences install → start → monitor → stop
//! - **Config**: default configuration deep-merged with caller overrides
//! - **Provisioner**: seam for binary download, path layout, and `java -jar`
//! - **Java probe**: detects a JRE before a Grid start
//! - **Shutdown**: injected capability that kills the child on host exit
//!
//! ```no_run
//! use wd_runtime::{ServerKind, WebDriverController};
//!
//! # async fn run() -> wd_runtime::Result<()> {
//! let controller = WebDriverController::default();
//! controller.auto_start(ServerKind::Selenium, true).await?;
//! assert_eq!(controller.url_string(), "http://localhost:4444");
//! controller.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod java;
pub mod provision;
pub mod shutdown;

pub use config::{DEFAULT_PORT, DriverSpec, Timeouts, WebDriverConfig};
pub use controller::{ServerHandle, ServerKind, WebDriverController};
pub use error::{Error, Result};
pub use provision::{Provisioner, StandaloneProvisioner};
pub use shutdown::{ShutdownFn, ShutdownRegistry, SignalShutdown};
