//! Runtime configuration
//!
//! Every value can come from the environment; anything unset falls back to
//! the defaults the sample service images are built for.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use zdt_core::{ReadinessPolicy, VersionSpec};

/// Image repository the service versions are tagged under.
pub const DEFAULT_IMAGE: &str = "zero-downtime-training";
/// Docker network shared by the store and every version.
pub const DEFAULT_NETWORK: &str = "zero-downtime-training";
pub const DEFAULT_STORE_CONTAINER: &str = "zdt-mysql";
pub const DEFAULT_STORE_IMAGE: &str = "mysql:latest";
/// Port the store listens on inside the network.
pub const STORE_PORT: u16 = 3306;
/// Port every service image listens on inside its container.
pub const CONTAINER_PORT: u16 = 80;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Image repository; a version runs as `<image>:<tag>`
    pub image: String,
    /// Shared docker network
    pub network: String,
    /// Name of the backing store container (also its hostname on the network)
    pub store_container: String,
    /// Backing store image
    pub store_image: String,
    pub db_user: String,
    pub db_password: String,
    pub db_schema: String,
    pub store_root_password: String,
    /// How long `prepare` waits for the store to accept connections
    pub store_readiness: ReadinessPolicy,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            image: env_or("ZDT_IMAGE", DEFAULT_IMAGE),
            network: env_or("ZDT_NETWORK", DEFAULT_NETWORK),
            store_container: env_or("ZDT_STORE_CONTAINER", DEFAULT_STORE_CONTAINER),
            store_image: env_or("ZDT_STORE_IMAGE", DEFAULT_STORE_IMAGE),
            db_user: env_or("DB_USER_NAME", "zdt"),
            db_password: env_or("DB_USER_PASSWORD", "zdtpwd"),
            db_schema: env_or("DB_SCHEMA", "zdt"),
            store_root_password: env_or("ZDT_STORE_ROOT_PASSWORD", "rootpwd"),
            // A cold mysql container takes a while to initialise its data dir.
            store_readiness: ReadinessPolicy::new(30, Duration::from_secs(2)),
        }
    }
}

impl RuntimeConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    pub fn with_network(mut self, network: &str) -> Self {
        self.network = network.to_string();
        self
    }

    pub fn with_store_container(mut self, name: &str) -> Self {
        self.store_container = name.to_string();
        self
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.db_user = user.to_string();
        self.db_password = password.to_string();
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.db_schema = schema.to_string();
        self
    }

    pub fn with_store_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.store_readiness = policy;
        self
    }

    /// Image reference for `version`.
    pub fn image_ref(&self, version: &VersionSpec) -> String {
        format!("{}:{}", self.image, version.tag)
    }

    /// Environment injected into a service container.
    pub fn app_env(&self, version: &VersionSpec) -> Vec<(&'static str, String)> {
        vec![
            ("DB_HOST", self.store_container.clone()),
            ("DB_PORT", STORE_PORT.to_string()),
            ("DB_USER_NAME", self.db_user.clone()),
            ("DB_USER_PASSWORD", self.db_password.clone()),
            ("DB_SCHEMA", self.db_schema.clone()),
            ("SERVER_PORT", CONTAINER_PORT.to_string()),
            ("APP_VERSION", version.tag.clone()),
        ]
    }

    /// `docker run` arguments for a service version.
    pub fn app_run_args(&self, version: &VersionSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--network".to_string(),
            self.network.clone(),
            "--publish".to_string(),
            format!("{}:{}", version.port, CONTAINER_PORT),
            "--label".to_string(),
            format!("zdt.version={}", version.tag),
        ];
        for (key, value) in self.app_env(version) {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.image_ref(version));
        args
    }

    /// `docker run` arguments for the backing store.
    pub fn store_run_args(&self) -> Vec<String> {
        let env = [
            ("MYSQL_ROOT_PASSWORD", &self.store_root_password),
            ("MYSQL_DATABASE", &self.db_schema),
            ("MYSQL_USER", &self.db_user),
            ("MYSQL_PASSWORD", &self.db_password),
        ];
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--name".to_string(),
            self.store_container.clone(),
            "--network".to_string(),
            self.network.clone(),
        ];
        for (key, value) in env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.store_image.clone());
        args
    }

    /// `docker exec` arguments that succeed once the store accepts connections.
    pub fn store_ping_args(&self) -> Vec<String> {
        vec![
            "exec".to_string(),
            self.store_container.clone(),
            "mysqladmin".to_string(),
            "ping".to_string(),
            "--host=127.0.0.1".to_string(),
            "--user=root".to_string(),
            format!("--password={}", self.store_root_password),
            "--silent".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RuntimeConfig {
        RuntimeConfig::default()
            .with_image("svc")
            .with_network("net")
            .with_store_container("db")
            .with_credentials("u", "p")
            .with_schema("assets")
    }

    #[test]
    fn test_app_env_points_at_store() {
        let env = config().app_env(&VersionSpec::new("v2", 8082));
        assert!(env.contains(&("DB_HOST", "db".to_string())));
        assert!(env.contains(&("DB_PORT", "3306".to_string())));
        assert!(env.contains(&("DB_USER_NAME", "u".to_string())));
        assert!(env.contains(&("DB_USER_PASSWORD", "p".to_string())));
        assert!(env.contains(&("DB_SCHEMA", "assets".to_string())));
        assert!(env.contains(&("SERVER_PORT", "80".to_string())));
        assert!(env.contains(&("APP_VERSION", "v2".to_string())));
    }

    #[test]
    fn test_app_run_args_publish_host_port() {
        let args = config().app_run_args(&VersionSpec::new("v2", 8082));
        assert_eq!(&args[..2], &["run", "--detach"]);
        let publish = args.iter().position(|a| a == "--publish").unwrap();
        assert_eq!(args[publish + 1], "8082:80");
        let network = args.iter().position(|a| a == "--network").unwrap();
        assert_eq!(args[network + 1], "net");
        assert_eq!(args.last().map(String::as_str), Some("svc:v2"));
    }

    #[test]
    fn test_store_run_args_are_named_and_networked() {
        let args = config().store_run_args();
        assert!(args.windows(2).any(|w| w == ["--name", "db"]));
        assert!(args.windows(2).any(|w| w == ["--network", "net"]));
        assert!(args.contains(&"MYSQL_DATABASE=assets".to_string()));
        assert!(args.contains(&"MYSQL_USER=u".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(DEFAULT_STORE_IMAGE));
    }

    #[test]
    fn test_store_ping_targets_store_container() {
        let args = config().store_ping_args();
        assert_eq!(&args[..4], &["exec", "db", "mysqladmin", "ping"]);
    }
}
