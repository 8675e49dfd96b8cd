pub mod command;
pub mod my_plugin;
pub mod registry;

pub use my_plugin::MyPlugin;
pub use registry::CommandRegistry;

use thiserror::Error;

use crate::rpc::RpcError;

/// The editor capability a plugin is constructed with.
#[cfg_attr(test, mockall::automock)]
pub trait Host {
    /// Append `text` to the editor's message area.
    fn out_write(&self, text: &str) -> Result<(), RpcError>;
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("command already registered: {0}")]
    Duplicate(String),

    #[error("{name}: wrong number of arguments (expected {expected}, got {got})")]
    Arity {
        name: String,
        expected: command::Nargs,
        got: usize,
    },

    #[error(transparent)]
    Host(#[from] RpcError),
}
