//! WebDriver server lifecycle controller.
//!
//! One controller owns at most one running server process and sequences
//! install, start, status probing, and stop around it. All lifecycle
//! operations serialize on a single async mutex, so a `stop` issued during an
//! in-flight start runs strictly before or after it, never interleaved.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{DEFAULT_PORT, WebDriverConfig};
use crate::error::{Error, Result};
use crate::java;
use crate::provision::{Provisioner, StandaloneProvisioner};
use crate::shutdown::{ShutdownRegistry, SignalShutdown};

/// Which server variant a start operation launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    /// Selenium Grid hub/node process.
    Selenium,
    /// Standalone ChromeDriver binary.
    ChromeDriver,
}

/// Owned handle to the one child process a controller may have live.
#[derive(Debug)]
pub struct ServerHandle {
    process: Child,
    url: String,
}

impl ServerHandle {
    fn new(process: Child, url: String) -> Self {
        Self { process, url }
    }

    /// URL the process was started to serve.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Best-effort, non-blocking termination.
    fn terminate(&mut self) {
        if let Err(err) = self.process.start_kill() {
            warn!(target: "wd", url = %self.url, "failed to kill server process: {err}");
        }
    }
}

#[derive(Debug, Default)]
struct ServerSlot {
    handle: Option<ServerHandle>,
    exit_hook_registered: bool,
}

impl ServerSlot {
    fn terminate_current(&mut self) -> bool {
        match self.handle.take() {
            Some(mut handle) => {
                handle.terminate();
                true
            }
            None => false,
        }
    }
}

/// Sequences install → start → monitor → stop for a local WebDriver server.
pub struct WebDriverController {
    overrides: WebDriverConfig,
    provisioner: Arc<dyn Provisioner>,
    shutdown: Arc<dyn ShutdownRegistry>,
    slot: Arc<Mutex<ServerSlot>>,
    http: reqwest::Client,
}

impl Default for WebDriverController {
    fn default() -> Self {
        Self::new(WebDriverConfig::default())
    }
}

impl WebDriverController {
    /// Creates a controller with an inline override configuration.
    pub fn new(overrides: WebDriverConfig) -> Self {
        Self {
            overrides,
            provisioner: Arc::new(StandaloneProvisioner::new()),
            shutdown: Arc::new(SignalShutdown),
            slot: Arc::new(Mutex::new(ServerSlot::default())),
            http: reqwest::Client::new(),
        }
    }

    /// Creates a controller with overrides loaded from a JSON file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(WebDriverConfig::from_file(path)?))
    }

    /// Replaces the provisioner seam.
    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Replaces the shutdown-registration capability.
    pub fn with_shutdown_registry(mut self, registry: Arc<dyn ShutdownRegistry>) -> Self {
        self.shutdown = registry;
        self
    }

    /// Default configuration deep-merged with the overrides, overrides winning.
    pub fn config(&self) -> WebDriverConfig {
        let mut merged = WebDriverConfig::standalone_defaults();
        merged.merge(&self.overrides);
        merged
    }

    /// `http://<host>:<port>` derived from the process argument list.
    ///
    /// Missing `-host` defaults to `localhost`; missing `-port` yields no
    /// port segment.
    pub fn url_string(&self) -> String {
        let config = self.config();
        let host = config.process_arg("-host").unwrap_or("localhost");
        match config.process_arg("-port") {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        }
    }

    /// Structured form of [`url_string`](Self::url_string).
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.url_string()).map_err(Error::from)
    }

    /// Status endpoint for the configured role.
    pub fn status_url(&self) -> String {
        let base = self.url_string();
        match self.config().process_arg("-role") {
            Some("hub") => format!("{base}/grid/api/hub"),
            _ => format!("{base}/wd/hub/status"),
        }
    }

    /// Downloads the server jar and driver binaries via the provisioner.
    pub async fn install(&self) -> Result<()> {
        self.provisioner.install(&self.config()).await
    }

    /// Probes whether a server is already answering on the status endpoint.
    ///
    /// Succeeds iff the endpoint answers HTTP 200, with the response body as
    /// a JSON value when parseable. This is the sole mechanism for detecting
    /// "already running", so it also sees servers started by other processes.
    pub async fn is_started(&self) -> Result<serde_json::Value> {
        let url = self.status_url();
        let mut request = self.http.get(&url);
        if let Some(limit) = self.config().timeouts.status_probe() {
            request = request.timeout(limit);
        }
        let response = request.send().await.map_err(|source| Error::StatusProbe {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await.unwrap_or(serde_json::Value::Null))
    }

    /// Starts a Selenium Grid server via the provisioner.
    pub async fn start_selenium(&self, error_if_started: bool) -> Result<()> {
        let mut slot = self.slot.lock().await;
        self.start_selenium_locked(&mut slot, error_if_started).await
    }

    /// Starts a standalone ChromeDriver, spawned and owned directly.
    pub async fn start_chromedriver(&self, error_if_started: bool) -> Result<()> {
        let mut slot = self.slot.lock().await;
        self.start_chromedriver_locked(&mut slot, error_if_started)
            .await
    }

    /// Installs binaries and starts the requested server variant.
    ///
    /// One call performs install+start with at-most-one-active-server
    /// semantics: when a server is already reachable nothing is installed.
    pub async fn auto_start(&self, kind: ServerKind, error_if_started: bool) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if self.is_started().await.is_ok() {
            return self.already_started(error_if_started);
        }
        self.install().await?;
        match kind {
            ServerKind::Selenium => self.start_selenium_locked(&mut slot, true).await,
            ServerKind::ChromeDriver => self.start_chromedriver_locked(&mut slot, true).await,
        }
    }

    /// Terminates the owned server process, if any.
    ///
    /// Best-effort: never fails, does not wait for exit confirmation, and is
    /// a no-op without a live handle.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if slot.terminate_current() {
            info!(target: "wd", "WebDriver server stopped");
        }
    }

    async fn start_selenium_locked(
        &self,
        slot: &mut ServerSlot,
        error_if_started: bool,
    ) -> Result<()> {
        if self.is_started().await.is_ok() {
            return self.already_started(error_if_started);
        }

        let config = self.config();
        match java::java_version(config.java_binary(), config.timeouts.java_probe()).await {
            Ok(Some(version)) => debug!(target: "wd", version = %version, "java runtime detected"),
            Ok(None) => debug!(target: "wd", "java runtime detected, version banner unrecognized"),
            Err(err) => return Err(err),
        }

        let child = self.provisioner.start(&config).await?;
        let url = self.url_string();
        slot.handle = Some(ServerHandle::new(child, url.clone()));
        info!(target: "wd", url = %url, "WebDriver server started");
        Ok(())
    }

    async fn start_chromedriver_locked(
        &self,
        slot: &mut ServerSlot,
        error_if_started: bool,
    ) -> Result<()> {
        if self.is_started().await.is_ok() {
            return self.already_started(error_if_started);
        }

        let config = self.config();
        let driver = self.provisioner.driver_path(&config, "chrome")?;
        let port = config
            .process_arg("-port")
            .map(str::to_owned)
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        self.register_exit_hook(slot);

        let mut child = Command::new(&driver)
            .arg("--url-base=wd/hub")
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                Error::Launch(format!("failed to spawn {}: {err}", driver.display()))
            })?;

        // Check if the process started successfully
        tokio::time::sleep(Duration::from_millis(100)).await;
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(Error::Launch(format!(
                    "ChromeDriver exited immediately with status: {status}"
                )));
            }
            Ok(None) => {}
            Err(err) => {
                return Err(Error::Launch(format!(
                    "failed to check process status: {err}"
                )));
            }
        }

        let url = self.url_string();
        slot.handle = Some(ServerHandle::new(child, url.clone()));
        info!(target: "wd", url = %url, "ChromeDriver started");
        Ok(())
    }

    fn already_started(&self, error_if_started: bool) -> Result<()> {
        let url = self.url_string();
        if error_if_started {
            Err(Error::AlreadyStarted { url })
        } else {
            info!(target: "wd", url = %url, "WebDriver server is already started");
            Ok(())
        }
    }

    fn register_exit_hook(&self, slot: &mut ServerSlot) {
        if slot.exit_hook_registered {
            return;
        }
        slot.exit_hook_registered = true;
        let slot = Arc::clone(&self.slot);
        self.shutdown.register(Box::new(move || {
            if let Ok(mut slot) = slot.try_lock() {
                if slot.terminate_current() {
                    info!(target: "wd", "WebDriver server stopped on host shutdown");
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_with_args(args: &[&str]) -> WebDriverController {
        WebDriverController::new(WebDriverConfig {
            process_arguments: args.iter().map(|arg| arg.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn url_string_uses_host_and_port_arguments() {
        let controller = controller_with_args(&["-host", "example.com", "-port", "5555"]);
        assert_eq!(controller.url_string(), "http://example.com:5555");
    }

    #[test]
    fn url_string_defaults_host_to_localhost() {
        let controller = controller_with_args(&["-port", "4444"]);
        assert_eq!(controller.url_string(), "http://localhost:4444");
    }

    #[test]
    fn url_string_omits_missing_port() {
        let controller = controller_with_args(&["-host", "grid.internal"]);
        assert_eq!(controller.url_string(), "http://grid.internal");
    }

    #[test]
    fn default_configuration_listens_on_4444() {
        let controller = WebDriverController::default();
        assert_eq!(controller.url_string(), "http://localhost:4444");
    }

    #[test]
    fn url_parses_into_parts() {
        let controller = controller_with_args(&["-host", "example.com", "-port", "5555"]);
        let url = controller.url().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.port(), Some(5555));
    }

    #[test]
    fn hub_role_probes_the_grid_api() {
        let controller = controller_with_args(&["-port", "4444", "-role", "hub"]);
        assert!(controller.status_url().ends_with("/grid/api/hub"));
    }

    #[test]
    fn non_hub_roles_probe_the_wd_hub_status() {
        let node = controller_with_args(&["-port", "4444", "-role", "node"]);
        assert!(node.status_url().ends_with("/wd/hub/status"));

        let plain = controller_with_args(&["-port", "4444"]);
        assert!(plain.status_url().ends_with("/wd/hub/status"));
    }
}
