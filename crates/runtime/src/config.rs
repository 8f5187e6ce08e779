//! Merged configuration for WebDriver server installation and startup.
//!
//! Two layers with override semantics: [`WebDriverConfig::standalone_defaults`]
//! is the computed base, and a caller-supplied override (inline value or JSON
//! file) merges on top, caller values winning per key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Port the Selenium server listens on when the argument list names none.
pub const DEFAULT_PORT: u16 = 4444;

/// Selenium server release installed by default.
pub const DEFAULT_SELENIUM_VERSION: &str = "3.141.59";

/// Download base for Selenium server releases.
pub const DEFAULT_SELENIUM_BASE_URL: &str = "https://selenium-release.storage.googleapis.com";

/// Installation options merged with startup options for one server.
///
/// Field names serialize in camelCase, so a config file reads
/// `{"processArguments": ["-port", "4444"], "drivers": {"chrome": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebDriverConfig {
    /// Selenium server version to install and run.
    pub version: Option<String>,
    /// Download base URL for the Selenium server jar.
    pub base_url: Option<String>,
    /// Root directory for installed binaries; platform cache dir when absent.
    pub base_path: Option<PathBuf>,
    /// Driver binaries keyed by canonical driver name.
    pub drivers: BTreeMap<String, DriverSpec>,
    /// Ordered flag/value pairs handed to the server process.
    pub process_arguments: Vec<String>,
    /// Java binary override; resolved from PATH when absent.
    pub java_path: Option<PathBuf>,
    /// Probe timeout policy.
    pub timeouts: Timeouts,
}

/// Version and download coordinates for one driver binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverSpec {
    pub version: Option<String>,
    /// Target architecture token used in the release artifact name.
    pub arch: Option<String>,
    /// Download base URL for this driver's releases.
    pub base_url: Option<String>,
}

/// Optional bounds on the suspension points that can otherwise wait forever.
///
/// Values are milliseconds; `0` disables the bound for that probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub status_probe_ms: Option<u64>,
    pub java_probe_ms: Option<u64>,
}

impl Timeouts {
    pub fn status_probe(&self) -> Option<Duration> {
        to_duration(self.status_probe_ms)
    }

    pub fn java_probe(&self) -> Option<Duration> {
        to_duration(self.java_probe_ms)
    }

    fn merge(&mut self, other: &Timeouts) {
        if other.status_probe_ms.is_some() {
            self.status_probe_ms = other.status_probe_ms;
        }
        if other.java_probe_ms.is_some() {
            self.java_probe_ms = other.java_probe_ms;
        }
    }
}

fn to_duration(ms: Option<u64>) -> Option<Duration> {
    match ms {
        None | Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
    }
}

/// Canonical spelling of a driver key.
///
/// Keys are lowercased and the long-form `"internet explorer"` collapses to
/// `"ie"`, so both spellings address the same entry.
pub fn canonical_driver_key(name: &str) -> String {
    let key = name.to_ascii_lowercase();
    if key == "internet explorer" {
        "ie".to_owned()
    } else {
        key
    }
}

impl WebDriverConfig {
    /// The computed base configuration every controller starts from.
    pub fn standalone_defaults() -> Self {
        let mut drivers = BTreeMap::new();
        drivers.insert(
            "chrome".to_owned(),
            DriverSpec {
                version: Some("114.0.5735.90".to_owned()),
                arch: None,
                base_url: Some("https://chromedriver.storage.googleapis.com".to_owned()),
            },
        );
        drivers.insert(
            "firefox".to_owned(),
            DriverSpec {
                version: Some("0.33.0".to_owned()),
                arch: None,
                base_url: Some(
                    "https://github.com/mozilla/geckodriver/releases/download".to_owned(),
                ),
            },
        );
        drivers.insert(
            "ie".to_owned(),
            DriverSpec {
                version: Some("3.150.1".to_owned()),
                arch: None,
                base_url: Some(DEFAULT_SELENIUM_BASE_URL.to_owned()),
            },
        );

        Self {
            version: Some(DEFAULT_SELENIUM_VERSION.to_owned()),
            base_url: Some(DEFAULT_SELENIUM_BASE_URL.to_owned()),
            base_path: None,
            drivers,
            process_arguments: vec!["-port".to_owned(), DEFAULT_PORT.to_string()],
            java_path: None,
            timeouts: Timeouts {
                status_probe_ms: Some(10_000),
                java_probe_ms: Some(10_000),
            },
        }
    }

    /// Loads an override configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        Ok(config.normalized())
    }

    /// Merges `other` on top of `self`, `other` winning per key.
    ///
    /// Driver entries merge field-wise under canonical keys. A non-empty
    /// override argument list replaces the base list wholesale; positional
    /// flag/value pairing makes index-wise merging incoherent.
    pub fn merge(&mut self, other: &WebDriverConfig) {
        if other.version.is_some() {
            self.version = other.version.clone();
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url.clone();
        }
        if other.base_path.is_some() {
            self.base_path = other.base_path.clone();
        }
        if other.java_path.is_some() {
            self.java_path = other.java_path.clone();
        }
        if !other.process_arguments.is_empty() {
            self.process_arguments = other.process_arguments.clone();
        }
        for (name, spec) in &other.drivers {
            let entry = self.drivers.entry(canonical_driver_key(name)).or_default();
            if spec.version.is_some() {
                entry.version = spec.version.clone();
            }
            if spec.arch.is_some() {
                entry.arch = spec.arch.clone();
            }
            if spec.base_url.is_some() {
                entry.base_url = spec.base_url.clone();
            }
        }
        self.timeouts.merge(&other.timeouts);
    }

    /// Rewrites driver keys to their canonical spelling.
    fn normalized(mut self) -> Self {
        let drivers = std::mem::take(&mut self.drivers);
        for (name, spec) in drivers {
            self.drivers.insert(canonical_driver_key(&name), spec);
        }
        self
    }

    /// Looks up a driver spec, accepting either spelling of aliased keys.
    pub fn driver(&self, name: &str) -> Option<&DriverSpec> {
        self.drivers.get(&canonical_driver_key(name))
    }

    /// Value following `flag` in the process argument list.
    pub fn process_arg(&self, flag: &str) -> Option<&str> {
        self.process_arguments
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.process_arguments.get(index + 1))
            .map(String::as_str)
    }

    /// Java binary to probe and launch with.
    pub fn java_binary(&self) -> &Path {
        self.java_path.as_deref().unwrap_or_else(|| Path::new("java"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(overrides: WebDriverConfig) -> WebDriverConfig {
        let mut config = WebDriverConfig::standalone_defaults();
        config.merge(&overrides);
        config
    }

    #[test]
    fn defaults_survive_empty_override() {
        let config = merged(WebDriverConfig::default());
        assert_eq!(config.version.as_deref(), Some(DEFAULT_SELENIUM_VERSION));
        assert_eq!(config.process_arguments, vec!["-port", "4444"]);
        assert!(config.driver("chrome").is_some());
        assert_eq!(config.timeouts.status_probe_ms, Some(10_000));
    }

    #[test]
    fn override_wins_per_key() {
        let config = merged(WebDriverConfig {
            version: Some("4.0.0".to_owned()),
            process_arguments: vec!["-port".to_owned(), "5555".to_owned()],
            ..Default::default()
        });
        assert_eq!(config.version.as_deref(), Some("4.0.0"));
        assert_eq!(config.process_arguments, vec!["-port", "5555"]);
        // untouched default keys remain
        assert_eq!(config.base_url.as_deref(), Some(DEFAULT_SELENIUM_BASE_URL));
    }

    #[test]
    fn driver_entries_merge_field_wise() {
        let mut overrides = WebDriverConfig::default();
        overrides.drivers.insert(
            "chrome".to_owned(),
            DriverSpec {
                version: Some("120.0.0.0".to_owned()),
                ..Default::default()
            },
        );
        let config = merged(overrides);
        let chrome = config.driver("chrome").unwrap();
        assert_eq!(chrome.version.as_deref(), Some("120.0.0.0"));
        // base_url came from the defaults
        assert!(chrome.base_url.as_deref().unwrap().contains("chromedriver"));
    }

    #[test]
    fn internet_explorer_aliases_ie_in_both_directions() {
        let mut overrides = WebDriverConfig::default();
        overrides.drivers.insert(
            "internet explorer".to_owned(),
            DriverSpec {
                version: Some("9.9.9".to_owned()),
                ..Default::default()
            },
        );
        let config = merged(overrides);

        assert_eq!(
            config.driver("ie").unwrap().version.as_deref(),
            Some("9.9.9")
        );
        assert_eq!(
            config.driver("internet explorer").unwrap().version.as_deref(),
            Some("9.9.9")
        );
        // only the canonical key is stored
        assert!(!config.drivers.contains_key("internet explorer"));
    }

    #[test]
    fn default_ie_entry_visible_under_long_spelling() {
        let config = merged(WebDriverConfig::default());
        assert_eq!(config.driver("internet explorer"), config.driver("ie"));
        assert!(config.driver("ie").is_some());
    }

    #[test]
    fn process_arg_scans_positionally() {
        let config = WebDriverConfig {
            process_arguments: vec![
                "-host".to_owned(),
                "example.com".to_owned(),
                "-port".to_owned(),
                "5555".to_owned(),
            ],
            ..Default::default()
        };
        assert_eq!(config.process_arg("-host"), Some("example.com"));
        assert_eq!(config.process_arg("-port"), Some("5555"));
        assert_eq!(config.process_arg("-role"), None);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let timeouts = Timeouts {
            status_probe_ms: Some(0),
            java_probe_ms: Some(2_000),
        };
        assert_eq!(timeouts.status_probe(), None);
        assert_eq!(timeouts.java_probe(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn from_file_reads_camel_case_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wd.json");
        fs::write(
            &path,
            r#"{
                "processArguments": ["-port", "4646", "-role", "hub"],
                "basePath": "/opt/wd",
                "drivers": {"Internet Explorer": {"version": "3.0.0"}},
                "timeouts": {"statusProbeMs": 500}
            }"#,
        )
        .unwrap();

        let config = WebDriverConfig::from_file(&path).unwrap();
        assert_eq!(config.process_arg("-role"), Some("hub"));
        assert_eq!(config.base_path.as_deref(), Some(Path::new("/opt/wd")));
        assert_eq!(config.driver("ie").unwrap().version.as_deref(), Some("3.0.0"));
        assert_eq!(config.timeouts.status_probe(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn from_file_rejects_malformed_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wd.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            WebDriverConfig::from_file(&path),
            Err(Error::InvalidConfig(_))
        ));
    }
}
