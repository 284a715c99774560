use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("failed to load configuration")]
    Config,
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    /// Turned away by the plan before anything ran.
    #[display("{_0}")]
    Rejected(#[error(not(source))] String),
    #[display("failed to read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("failed to write {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    #[display("failed to build archive")]
    Archive,
    #[display("project store error")]
    Projects,
    #[display("{_0} of {_1} files failed")]
    FilesFailed(#[error(not(source))] usize, #[error(not(source))] usize),
}
