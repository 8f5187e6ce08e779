//! Installing and launching Selenium server binaries.
//!
//! [`Provisioner`] is the seam between the controller and everything that
//! touches the network or the installed-binary layout. The default
//! [`StandaloneProvisioner`] downloads release artifacts over HTTPS, unpacks
//! driver archives, and launches the server jar with `java`.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::{DEFAULT_SELENIUM_BASE_URL, WebDriverConfig, canonical_driver_key};
use crate::error::{Error, Result};

/// System properties the Selenium server reads driver locations from.
const DRIVER_PROPERTIES: &[(&str, &str)] = &[
    ("chrome", "webdriver.chrome.driver"),
    ("firefox", "webdriver.gecko.driver"),
    ("ie", "webdriver.ie.driver"),
];

/// Installs server binaries and launches the Selenium server.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Ensures the server jar and every configured driver binary exist locally.
    /// Idempotent: artifacts already on disk are not downloaded again.
    async fn install(&self, config: &WebDriverConfig) -> Result<()>;

    /// Launches the Selenium server and returns the child process.
    async fn start(&self, config: &WebDriverConfig) -> Result<Child>;

    /// Filesystem path of a driver binary.
    fn driver_path(&self, config: &WebDriverConfig, driver: &str) -> Result<PathBuf>;
}

struct DriverArtifact {
    url: String,
    path: PathBuf,
}

/// Default provisioner: release downloads over HTTPS plus `java -jar` startup.
pub struct StandaloneProvisioner {
    http: reqwest::Client,
}

impl Default for StandaloneProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneProvisioner {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Root directory binaries install under.
    pub fn base_path(config: &WebDriverConfig) -> PathBuf {
        config.base_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wd-runtime")
        })
    }

    /// Path of the Selenium server jar for this configuration.
    pub fn server_jar_path(config: &WebDriverConfig) -> Result<PathBuf> {
        let version = selenium_version(config)?;
        Ok(Self::base_path(config)
            .join("selenium-server")
            .join(format!("{version}-server.jar")))
    }

    fn server_jar_url(config: &WebDriverConfig) -> Result<String> {
        let version = selenium_version(config)?;
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_SELENIUM_BASE_URL);
        Ok(format!(
            "{base}/{}/selenium-server-standalone-{version}.jar",
            major_minor(version)
        ))
    }

    fn driver_artifact(config: &WebDriverConfig, name: &str) -> Result<DriverArtifact> {
        let spec = config
            .driver(name)
            .ok_or_else(|| Error::InvalidConfig(format!("no driver entry for {name}")))?;
        let version = spec
            .version
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig(format!("driver {name} has no version")))?;
        let base_path = Self::base_path(config);

        match canonical_driver_key(name).as_str() {
            "chrome" => {
                let arch = spec.arch.as_deref().unwrap_or(if cfg!(windows) {
                    "win32"
                } else if cfg!(target_os = "macos") {
                    "mac64"
                } else {
                    "linux64"
                });
                let base = spec
                    .base_url
                    .as_deref()
                    .unwrap_or("https://chromedriver.storage.googleapis.com");
                Ok(DriverArtifact {
                    url: format!("{base}/{version}/chromedriver_{arch}.zip"),
                    path: base_path
                        .join("chromedriver")
                        .join(format!("{version}-{arch}-chromedriver{}", exe_suffix())),
                })
            }
            "firefox" => {
                let arch = spec.arch.as_deref().unwrap_or(if cfg!(windows) {
                    "win64"
                } else if cfg!(target_os = "macos") {
                    "macos"
                } else {
                    "linux64"
                });
                let base = spec
                    .base_url
                    .as_deref()
                    .unwrap_or("https://github.com/mozilla/geckodriver/releases/download");
                let archive = if cfg!(windows) { "zip" } else { "tar.gz" };
                Ok(DriverArtifact {
                    url: format!("{base}/v{version}/geckodriver-v{version}-{arch}.{archive}"),
                    path: base_path
                        .join("geckodriver")
                        .join(format!("{version}-{arch}-geckodriver{}", exe_suffix())),
                })
            }
            "ie" => {
                let arch = spec.arch.as_deref().unwrap_or("Win32");
                let base = spec.base_url.as_deref().unwrap_or(DEFAULT_SELENIUM_BASE_URL);
                Ok(DriverArtifact {
                    url: format!(
                        "{base}/{}/IEDriverServer_{arch}_{version}.zip",
                        major_minor(version)
                    ),
                    path: base_path
                        .join("iedriver")
                        .join(format!("{version}-{arch}-IEDriverServer.exe")),
                })
            }
            other => Err(Error::InvalidConfig(format!("unsupported driver: {other}"))),
        }
    }

    async fn download(&self, url: &str, artifact: &str) -> Result<Vec<u8>> {
        info!(target: "wd", url, "downloading {artifact}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| Error::Install {
                artifact: artifact.to_owned(),
                reason: err.to_string(),
            })?;
        let bytes = response.bytes().await.map_err(|err| Error::Install {
            artifact: artifact.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Provisioner for StandaloneProvisioner {
    async fn install(&self, config: &WebDriverConfig) -> Result<()> {
        let jar = Self::server_jar_path(config)?;
        if jar.exists() {
            debug!(target: "wd", path = %jar.display(), "selenium server already installed");
        } else {
            let url = Self::server_jar_url(config)?;
            let bytes = self.download(&url, "selenium-server").await?;
            write_binary(&jar, &bytes, false)?;
            info!(target: "wd", path = %jar.display(), "selenium server installed");
        }

        for name in config.drivers.keys() {
            if name == "ie" && !cfg!(windows) {
                debug!(target: "wd", "skipping IEDriverServer on a non-Windows host");
                continue;
            }
            let artifact = Self::driver_artifact(config, name)?;
            if artifact.path.exists() {
                debug!(target: "wd", path = %artifact.path.display(), "driver already installed");
                continue;
            }
            let bytes = self.download(&artifact.url, name).await?;
            let binary = unpack(&artifact.url, bytes).map_err(|reason| Error::Install {
                artifact: name.clone(),
                reason,
            })?;
            write_binary(&artifact.path, &binary, true)?;
            info!(target: "wd", path = %artifact.path.display(), "driver installed");
        }
        Ok(())
    }

    async fn start(&self, config: &WebDriverConfig) -> Result<Child> {
        let jar = Self::server_jar_path(config)?;
        if !jar.exists() {
            return Err(Error::Launch(format!(
                "server jar missing at {}; run install first",
                jar.display()
            )));
        }
        let java = match &config.java_path {
            Some(path) => path.clone(),
            None => which::which("java")
                .map_err(|err| Error::Launch(format!("java binary not found: {err}")))?,
        };

        let mut command = Command::new(&java);
        for (name, property) in DRIVER_PROPERTIES {
            if let Ok(artifact) = Self::driver_artifact(config, name) {
                if artifact.path.exists() {
                    command.arg(format!("-D{property}={}", artifact.path.display()));
                }
            }
        }
        command
            .arg("-jar")
            .arg(&jar)
            .args(&config.process_arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|err| Error::Launch(format!("failed to spawn {}: {err}", java.display())))?;

        // Check if the process started successfully
        tokio::time::sleep(Duration::from_millis(100)).await;
        match child.try_wait() {
            Ok(Some(status)) => Err(Error::Launch(format!(
                "server process exited immediately with status: {status}"
            ))),
            Ok(None) => Ok(child),
            Err(err) => Err(Error::Launch(format!(
                "failed to check process status: {err}"
            ))),
        }
    }

    fn driver_path(&self, config: &WebDriverConfig, driver: &str) -> Result<PathBuf> {
        Ok(Self::driver_artifact(config, driver)?.path)
    }
}

fn selenium_version(config: &WebDriverConfig) -> Result<&str> {
    config
        .version
        .as_deref()
        .ok_or_else(|| Error::InvalidConfig("no selenium version configured".to_owned()))
}

fn major_minor(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

fn exe_suffix() -> &'static str {
    if cfg!(windows) { ".exe" } else { "" }
}

/// Pulls the single driver binary out of a release archive.
pub(crate) fn unpack(url: &str, bytes: Vec<u8>) -> std::result::Result<Vec<u8>, String> {
    if url.ends_with(".zip") {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| err.to_string())?;
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|err| err.to_string())?;
            if !file.is_file() {
                continue;
            }
            let mut binary = Vec::new();
            file.read_to_end(&mut binary).map_err(|err| err.to_string())?;
            return Ok(binary);
        }
        Err("archive contains no file entries".to_owned())
    } else if url.ends_with(".tar.gz") {
        let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries().map_err(|err| err.to_string())? {
            let mut entry = entry.map_err(|err| err.to_string())?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let mut binary = Vec::new();
            entry
                .read_to_end(&mut binary)
                .map_err(|err| err.to_string())?;
            return Ok(binary);
        }
        Err("archive contains no file entries".to_owned())
    } else {
        Ok(bytes)
    }
}

fn write_binary(path: &Path, bytes: &[u8], executable: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = executable;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::DriverSpec;

    fn config_at(base: &Path) -> WebDriverConfig {
        let mut config = WebDriverConfig::standalone_defaults();
        config.base_path = Some(base.to_path_buf());
        config
    }

    #[test]
    fn server_jar_path_is_deterministic() {
        let config = config_at(Path::new("/opt/wd"));
        let jar = StandaloneProvisioner::server_jar_path(&config).unwrap();
        assert_eq!(
            jar,
            Path::new("/opt/wd/selenium-server/3.141.59-server.jar")
        );
    }

    #[test]
    fn server_jar_url_uses_major_minor_prefix() {
        let config = config_at(Path::new("/opt/wd"));
        let url = StandaloneProvisioner::server_jar_url(&config).unwrap();
        assert_eq!(
            url,
            "https://selenium-release.storage.googleapis.com/3.141/selenium-server-standalone-3.141.59.jar"
        );
    }

    #[test]
    fn chrome_driver_path_uses_version_and_arch() {
        let mut config = config_at(Path::new("/opt/wd"));
        config.drivers.insert(
            "chrome".to_owned(),
            DriverSpec {
                version: Some("114.0.5735.90".to_owned()),
                arch: Some("linux64".to_owned()),
                base_url: None,
            },
        );
        let provisioner = StandaloneProvisioner::new();
        let path = provisioner.driver_path(&config, "chrome").unwrap();
        assert_eq!(
            path,
            PathBuf::from(format!(
                "/opt/wd/chromedriver/114.0.5735.90-linux64-chromedriver{}",
                exe_suffix()
            ))
        );
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let mut config = config_at(Path::new("/opt/wd"));
        config
            .drivers
            .insert("safari".to_owned(), DriverSpec::default());
        let provisioner = StandaloneProvisioner::new();
        assert!(matches!(
            provisioner.driver_path(&config, "safari"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn install_skips_artifacts_already_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config_at(dir.path());
        config.version = Some("9.9.9".to_owned());
        config.drivers.clear();

        let jar = StandaloneProvisioner::server_jar_path(&config).unwrap();
        fs::create_dir_all(jar.parent().unwrap()).unwrap();
        fs::write(&jar, b"jar").unwrap();

        // no network touched: the only artifact is already present
        StandaloneProvisioner::new().install(&config).await.unwrap();
        assert_eq!(fs::read(&jar).unwrap(), b"jar");
    }

    #[test]
    fn unpack_extracts_the_zip_entry() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("chromedriver", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"binary-bytes").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let binary = unpack("https://example.com/chromedriver_linux64.zip", archive).unwrap();
        assert_eq!(binary, b"binary-bytes");
    }

    #[test]
    fn unpack_passes_plain_payloads_through() {
        let binary = unpack("https://example.com/server.jar", b"jar-bytes".to_vec()).unwrap();
        assert_eq!(binary, b"jar-bytes");
    }
}
