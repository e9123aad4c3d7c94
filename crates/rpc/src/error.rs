use thiserror::Error;

use crate::services::ServiceError;

/// Errors that can occur in the RPC layer.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    /// The socket's background event loop has stopped.
    #[error("socket closed")]
    Closed,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote service answered with an error; the message is passed through verbatim.
    #[error("{}", .0.message)]
    Service(ServiceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
