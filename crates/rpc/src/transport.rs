use std::path::Path;

use serde::{Deserialize, Serialize};

/// Directory holding every IPC socket.
const IPC_DIR: &str = "/tmp/postgate";

/// Transport layer for ZeroMQ connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket, for services sharing a host with the gateway.
    Ipc(String),

    /// TCP transport; the default for the backend services.
    Tcp { host: String, port: u16 },
}

impl Transport {
    /// Create an IPC transport with the given socket name.
    ///
    /// The name is used as a path component under `/tmp/postgate/`.
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(name.to_string())
    }

    /// Create a TCP transport with the given host and port.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Generate the ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(name) => format!("ipc://{IPC_DIR}/{name}.sock"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    /// For IPC transports, ensure the parent directory exists.
    ///
    /// ZeroMQ requires the directory to exist before binding an IPC socket.
    /// This is a no-op for TCP transports.
    pub fn ensure_ipc_dir(&self) -> std::io::Result<()> {
        if let Self::Ipc(_) = self {
            let endpoint = self.endpoint();
            // Strip the "ipc://" prefix to get the filesystem path.
            let path = endpoint.strip_prefix("ipc://").unwrap_or(&endpoint);
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Remove a stale IPC socket file left over from a previous run.
    ///
    /// A leftover `.sock` file makes the next bind fail with `EADDRINUSE`.
    /// No-op for TCP transports or if the file doesn't exist.
    pub fn remove_stale_socket(&self) -> std::io::Result<()> {
        if let Self::Ipc(_) = self {
            let endpoint = self.endpoint();
            let path = endpoint.strip_prefix("ipc://").unwrap_or(&endpoint);
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path, "removed stale IPC socket");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    /// Parse `ipc:///tmp/postgate/<name>.sock` or `tcp://host:port`.
    ///
    /// IPC sockets must live directly in `/tmp/postgate/`; any other path is
    /// rejected rather than relocated.
    fn from_str(endpoint: &str) -> Result<Self, Self::Err> {
        if let Some(path) = endpoint.strip_prefix("ipc://") {
            let name = path
                .strip_prefix(IPC_DIR)
                .and_then(|rest| rest.strip_prefix('/'))
                .and_then(|rest| rest.strip_suffix(".sock"))
                .filter(|name| !name.is_empty() && !name.contains('/'))
                .ok_or_else(|| {
                    format!("ipc endpoint '{endpoint}' must be {IPC_DIR}/<name>.sock")
                })?;
            Ok(Transport::ipc(name))
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| format!("tcp endpoint '{endpoint}' is missing a port"))?;
            let port = port
                .parse()
                .map_err(|_| format!("tcp endpoint '{endpoint}' has an invalid port"))?;
            Ok(Transport::tcp(host, port))
        } else {
            Err(format!(
                "unsupported endpoint '{endpoint}', expected ipc:// or tcp://"
            ))
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
