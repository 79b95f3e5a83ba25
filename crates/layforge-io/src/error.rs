use std::io;

use thiserror::Error;

use layforge_core::LayoutError;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Project has no {0} configured")]
    MissingSetting(&'static str),
}

pub type IoResult<T> = Result<T, IoError>;
