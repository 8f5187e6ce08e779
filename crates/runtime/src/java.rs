//! Java runtime probe.
//!
//! A Selenium Grid start needs a JRE on the machine. The probe spawns
//! `java -version` and inspects the first line of its error stream, which is
//! where every JVM prints its banner.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use tokio::process::Command;

use crate::error::{Error, Result};

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"java version "([^"]+)""#).unwrap());

/// Probes the Java runtime and extracts its version token.
///
/// Three outcomes, never conflated:
/// - `Ok(Some(version))`: banner matched `java version "..."`;
/// - `Ok(None)`: the binary ran but the banner is not in that shape
///   (OpenJDK builds print `openjdk version ...`);
/// - `Err(JavaMissing)`: the binary could not be spawned at all.
///
/// `timeout` bounds the wait for process output; `None` waits indefinitely.
pub async fn java_version(java: &Path, timeout: Option<Duration>) -> Result<Option<String>> {
    let child = Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(Error::JavaMissing)?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Timeout(format!("java -version produced no output within {limit:?}"))
            })??,
        None => child.wait_with_output().await?,
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_version_line(stderr.lines().next().unwrap_or_default()))
}

fn parse_version_line(line: &str) -> Option<String> {
    VERSION_RE
        .captures(line)
        .map(|caps| caps[1].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_oracle_banner() {
        assert_eq!(
            parse_version_line(r#"java version "1.8.0_231""#),
            Some("1.8.0_231".to_owned())
        );
    }

    #[test]
    fn parses_quoted_modern_version() {
        assert_eq!(
            parse_version_line(r#"java version "17.0.2" 2022-01-18 LTS"#),
            Some("17.0.2".to_owned())
        );
    }

    #[test]
    fn non_matching_banner_yields_none() {
        assert_eq!(parse_version_line(r#"openjdk version "11.0.1""#), None);
        assert_eq!(parse_version_line(""), None);
    }

    #[tokio::test]
    async fn unreachable_binary_rejects_with_java_missing() {
        let result = java_version(Path::new("/definitely/not/a/java"), None).await;
        assert!(matches!(result, Err(Error::JavaMissing(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reachable_binary_without_banner_resolves_none() {
        // `sh -version` runs (or exits complaining) without a java banner,
        // exercising the "reachable but unparseable" channel.
        let result = java_version(Path::new("sh"), Some(Duration::from_secs(10))).await;
        assert!(matches!(result, Ok(None)));
    }
}
