//! Installing, removing and listing host packages through `pip`.

use std::process::{Output, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::ToolingError;

const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(60);
const LIST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

/// Runs `<python> -m pip ...` subprocesses.
#[derive(Debug, Clone)]
pub struct PackageManager {
    python: String,
}

impl PackageManager {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub async fn install(&self, name: &str) -> String {
        match self.pip(&["install", name], INSTALL_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                format!("✓ Successfully installed {}", name)
            }
            Ok(output) => format!(
                "✗ Failed to install {}:\n{}",
                name,
                String::from_utf8_lossy(&output.stderr)
            ),
            Err(err) => format!("✗ Error installing {}: {}", name, err),
        }
    }

    pub async fn uninstall(&self, name: &str) -> String {
        match self.pip(&["uninstall", "-y", name], UNINSTALL_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                format!("✓ Successfully uninstalled {}", name)
            }
            Ok(_) => format!("✗ Failed to uninstall {}", name),
            Err(err) => format!("✗ Error uninstalling {}: {}", name, err),
        }
    }

    /// Installed packages sorted case-insensitively by name.
    ///
    /// A failure is reported as a single `Error` entry carrying the reason.
    pub async fn list(&self) -> Vec<Package> {
        match self.installed().await {
            Ok(packages) => packages,
            Err(err) => vec![Package {
                name: "Error".to_string(),
                version: err.to_string(),
            }],
        }
    }

    async fn installed(&self) -> Result<Vec<Package>, ToolingError> {
        let output = self.pip(&["list", "--format=json"], LIST_TIMEOUT).await?;
        if !output.status.success() {
            return Err(ToolingError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let mut packages: Vec<Package> = serde_json::from_slice(&output.stdout)?;
        sort_packages(&mut packages);
        Ok(packages)
    }

    async fn pip(&self, args: &[&str], timeout: Duration) -> Result<Output, ToolingError> {
        debug!(python = %self.python, ?args, "running pip");
        let mut command = Command::new(&self.python);
        command
            .arg("-m")
            .arg("pip")
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match tokio::time::timeout(timeout, command.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(ToolingError::Timeout(timeout.as_secs())),
        }
    }
}

pub fn sort_packages(packages: &mut [Package]) {
    packages.sort_by_key(|package| package.name.to_lowercase());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn package(name: &str, version: &str) -> Package {
        Package {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn test_sort_ignores_case() {
        let mut packages = vec![
            package("requests", "2.31.0"),
            package("Flask", "3.0.0"),
            package("numpy", "1.26.4"),
            package("Babel", "2.14.0"),
        ];
        sort_packages(&mut packages);
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Babel", "Flask", "numpy", "requests"]);
    }

    #[test]
    fn test_parse_pip_json() {
        let json =
            r#"[{"name": "six", "version": "1.16.0"}, {"name": "attrs", "version": "23.2.0"}]"#;
        let mut packages: Vec<Package> = serde_json::from_str(json).unwrap();
        sort_packages(&mut packages);
        assert_eq!(
            packages,
            vec![package("attrs", "23.2.0"), package("six", "1.16.0")]
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let manager = PackageManager::new("pygenius-no-such-python");

        let installed = manager.install("requests").await;
        assert!(
            installed.starts_with("✗ Error installing requests: "),
            "got: {}",
            installed
        );

        let removed = manager.uninstall("requests").await;
        assert!(removed.starts_with("✗ Error uninstalling requests: "));

        let listed = manager.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Error");
    }
}
