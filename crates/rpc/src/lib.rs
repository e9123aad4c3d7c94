pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod reqrep;
pub mod runner;
pub mod services;
pub mod topics;
pub mod traits;
pub mod transport;

pub use client::ServiceClient;
pub use config::{RpcConfig, ServiceConfig};
pub use error::RpcError;
pub use message::Message;
pub use reqrep::{ReplyToken, ZmqRequestClient, ZmqRequestServer};
pub use runner::{shutdown_signal, ServiceRunner};
pub use services::ServiceError;
pub use traits::{RequestHandler, RequestSender, Service};
pub use transport::Transport;
