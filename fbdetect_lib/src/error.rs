use thiserror::Error;

pub type FbResult<T> = ::std::result::Result<T, FbError>;

#[derive(Error, Debug)]
pub enum FbError {
    #[error("Console memory read out of bounds: 0x{addr:08x} (+{len}) with only {size} bytes")]
    MemoryOutOfBounds { addr: u32, len: usize, size: usize },
    #[error("Unknown microcode id: {0}")]
    UnknownUcode(u32),
    #[error("Bad savestate: {0}")]
    BadSavestate(String),
    #[error("Couldn't serialize savestate: {0}")]
    Serialization(String),
}
