//! Thin async wrapper over the `docker` CLI.

use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::RuntimeError;
use crate::Result;

/// Subset of `docker container inspect --format '{{json .State}}'`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub running: bool,
    pub status: String,
}

/// Invokes the docker binary and turns non-zero exits into errors.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different docker-compatible binary (e.g. `podman`).
    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    /// Run `docker <args>` and return trimmed stdout.
    pub async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        let command = redact(&self.binary, &args);
        debug!(command = %command, "invoking docker");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RuntimeError::DockerNotFound,
                _ => RuntimeError::Io(e),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(RuntimeError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run `docker <args>` and report only whether it exited zero.
    async fn succeeds(&self, args: &[&str]) -> Result<bool> {
        match self.run(args).await {
            Ok(_) => Ok(true),
            Err(RuntimeError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check the daemon is reachable.
    pub async fn version(&self) -> Result<String> {
        self.run(&["version", "--format", "{{.Server.Version}}"]).await
    }

    pub async fn network_exists(&self, name: &str) -> Result<bool> {
        self.succeeds(&["network", "inspect", name]).await
    }

    pub async fn create_network(&self, name: &str) -> Result<()> {
        self.run(&["network", "create", name]).await.map(|_| ())
    }

    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        self.succeeds(&["image", "inspect", image]).await
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        self.run(&["pull", "--quiet", image]).await.map(|_| ())
    }

    /// State of a named container, or `None` if it does not exist.
    pub async fn container_state(&self, name: &str) -> Result<Option<ContainerState>> {
        match self
            .run(&["container", "inspect", "--format", "{{json .State}}", name])
            .await
        {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(RuntimeError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn start(&self, container: &str) -> Result<()> {
        self.run(&["start", container]).await.map(|_| ())
    }

    pub async fn stop(&self, container: &str) -> Result<()> {
        self.run(&["stop", container]).await.map(|_| ())
    }

    pub async fn remove(&self, container: &str) -> Result<()> {
        self.run(&["rm", container]).await.map(|_| ())
    }
}

/// Render a failed command for error messages, hiding `--env`/`--password` values.
fn redact(binary: &str, args: &[&str]) -> String {
    let mut out = vec![binary.to_string()];
    let mut hide_next = false;
    for &arg in args {
        if hide_next {
            let key = arg.split_once('=').map(|(k, _)| k).unwrap_or(arg);
            out.push(format!("{}=***", key));
            hide_next = false;
        } else if arg == "--env" {
            out.push(arg.to_string());
            hide_next = true;
        } else if arg.starts_with("--password=") {
            out.push("--password=***".to_string());
        } else {
            out.push(arg.to_string());
        }
    }
    out.join(" ")
}

/// Check if the docker CLI is installed and can reach a daemon
pub async fn is_docker_available() -> bool {
    DockerCli::new().version().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_hides_env_values_and_passwords() {
        let rendered = redact(
            "docker",
            &[
                "run",
                "--env",
                "DB_USER_PASSWORD=secret",
                "mysqladmin",
                "--password=rootpwd",
                "svc:v1",
            ],
        );
        assert_eq!(
            rendered,
            "docker run --env DB_USER_PASSWORD=*** mysqladmin --password=*** svc:v1"
        );
    }

    #[test]
    fn test_container_state_parses_inspect_output() {
        let state: ContainerState =
            serde_json::from_str(r#"{"Status":"running","Running":true,"Pid":42}"#).unwrap();
        assert!(state.running);
        assert_eq!(state.status, "running");
    }

    #[tokio::test]
    async fn test_missing_binary_is_docker_not_found() {
        let cli = DockerCli::with_binary("zdt-no-such-docker-binary");
        let err = cli.version().await.unwrap_err();
        assert!(matches!(err, RuntimeError::DockerNotFound));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_existence_checks() {
        let cli = DockerCli::with_binary("zdt-no-such-docker-binary");
        assert!(matches!(
            cli.network_exists("net").await,
            Err(RuntimeError::DockerNotFound)
        ));
    }
}
