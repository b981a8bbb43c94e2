use crate::route::RouteError;
use thiserror::Error;

/// Navigation engine error types
#[derive(Error, Debug, Clone)]
pub enum NavError {
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    #[error("Navigation session is no longer active")]
    SessionEnded,

    #[error("Location source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type NavResult<T> = Result<T, NavError>;
