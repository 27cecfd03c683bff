use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("Invalid machine config: {0}")]
    InvalidConfig(String),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Unknown quirk: {0}")]
    UnknownQuirk(String),
}
