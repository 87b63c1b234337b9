//! Error types for the drone controller

use thiserror::Error;

/// Core error type for command parsing
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl CoreError {
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand(name.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by a drone link while sending commands
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link closed")]
    Closed,
}

pub type LinkResult<T> = Result<T, LinkError>;
