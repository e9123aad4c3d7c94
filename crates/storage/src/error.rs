use thiserror::Error;

use postgate_core::CoreError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(i32),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map to an HTTP-style status code for error replies.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Invalid(_) => 400,
            Self::Database(_) => 500,
        }
    }
}
