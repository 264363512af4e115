use thiserror::Error;
use fbdetect_lib::FbError;

pub type Result<T> = ::std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Detector(#[from] FbError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Can't load configuration: {0}")]
    Config(#[from] ini::Error),
    #[error("Trace line {line}: {msg}")]
    Trace { line: usize, msg: String },
    #[error("Usage: fbdetect_app <trace> [--config <ini>] [--rdram <bin>] [--events]")]
    Usage,
}
