#![forbid(unsafe_code)]

use thiserror::Error;

use vigil_core::GraphError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("observed root must be an object or array")]
    NotComposite,

    #[error("engine worker is not running")]
    WorkerUnavailable,

    #[error("engine worker disconnected")]
    WorkerDisconnected,

    #[error("component {name:?} did not construct an object or array")]
    InvalidComponent { name: &'static str },
}
