use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("update must set at least one of title or body")]
    EmptyUpdate,

    #[error("invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}
