use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::transport::Transport;

/// Name of the ingestion service in [`RpcConfig::services`].
pub const PARSE_SERVICE: &str = "parse";

/// Name of the record service in [`RpcConfig::services`].
pub const POST_SERVICE: &str = "post";

/// Endpoints of the backend services.
///
/// Parsed from `config/postgate.toml`:
///
/// ```toml
/// [services.parse]
/// endpoint = "tcp://127.0.0.1:8081"
///
/// [services.post]
/// endpoint = "tcp://127.0.0.1:8082"
/// ```
///
/// `POSTGATE_SERVICE_<NAME>_ENDPOINT` overrides the endpoint of a service.
/// Call deadlines are not configured here; callers pass one per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

/// Configuration for a named request/reply service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// The endpoint where the service binds its ROUTER socket.
    pub endpoint: String,
}

impl RpcConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RpcError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RpcError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load from `path` when it exists, otherwise fall back to [`RpcConfig::local`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RpcError> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!(path = %path.display(), "loading rpc config");
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "rpc config not found, using local endpoints");
            let mut config = Self::local();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Both services on loopback TCP, ports 8081 (parse) and 8082 (post).
    pub fn local() -> Self {
        let mut services = HashMap::new();
        services.insert(
            PARSE_SERVICE.to_string(),
            ServiceConfig {
                endpoint: "tcp://127.0.0.1:8081".into(),
            },
        );
        services.insert(
            POST_SERVICE.to_string(),
            ServiceConfig {
                endpoint: "tcp://127.0.0.1:8082".into(),
            },
        );
        Self { services }
    }

    /// Resolve a named service's endpoint to a [`Transport`].
    pub fn service_transport(&self, name: &str) -> Result<Transport, RpcError> {
        let svc = self
            .services
            .get(name)
            .ok_or_else(|| RpcError::Config(format!("service '{name}' is not configured")))?;
        svc.endpoint.parse().map_err(RpcError::Config)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Convention: `POSTGATE_SERVICE_<NAME>_ENDPOINT` overrides
    /// `services.<name>.endpoint`, creating the entry if needed.
    fn apply_env_overrides(&mut self) {
        for name in [PARSE_SERVICE, POST_SERVICE] {
            let key = format!("POSTGATE_SERVICE_{}_ENDPOINT", name.to_uppercase());
            if let Ok(endpoint) = std::env::var(&key) {
                self.services
                    .entry(name.to_string())
                    .and_modify(|svc| svc.endpoint = endpoint.clone())
                    .or_insert(ServiceConfig { endpoint });
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Every endpoint must parse.
    pub fn validate(&self) -> Result<(), RpcError> {
        for (name, svc) in &self.services {
            svc.endpoint
                .parse::<Transport>()
                .map_err(|e| RpcError::Config(format!("service '{name}': {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_services_section() {
        let config = RpcConfig::from_toml(
            r#"
            [services.parse]
            endpoint = "tcp://10.0.0.5:9001"

            [services.post]
            endpoint = "ipc:///tmp/postgate/post.sock"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.service_transport(PARSE_SERVICE).unwrap(),
            Transport::tcp("10.0.0.5", 9001)
        );
        assert_eq!(
            config.service_transport(POST_SERVICE).unwrap(),
            Transport::ipc("post")
        );
    }

    #[test]
    fn local_uses_loopback_ports() {
        let config = RpcConfig::local();
        assert_eq!(
            config.service_transport(PARSE_SERVICE).unwrap().endpoint(),
            "tcp://127.0.0.1:8081"
        );
        assert_eq!(
            config.service_transport(POST_SERVICE).unwrap().endpoint(),
            "tcp://127.0.0.1:8082"
        );
    }

    #[test]
    fn unknown_service_is_a_config_error() {
        let err = RpcConfig::local().service_transport("billing").unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }

    #[test]
    fn rejects_bad_endpoint() {
        let bad_endpoint = RpcConfig::from_toml(
            r#"
            [services.parse]
            endpoint = "udp://somewhere"
            "#,
        );
        assert!(matches!(bad_endpoint, Err(RpcError::Config(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = RpcConfig::from_toml("services = 3").unwrap_err();
        assert!(matches!(err, RpcError::ConfigParse(_)));
    }
}
