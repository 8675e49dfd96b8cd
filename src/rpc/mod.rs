//! msgpack-rpc over stdio, the channel Neovim speaks to remote plugins.
//!
//! Reference: `:help msgpack-rpc` and `:help remote-plugin`.

pub mod message;
pub mod session;

pub use message::Message;
pub use session::Nvim;

use thiserror::Error;

/// Errors that can occur while talking to Neovim.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to communicate with nvim: {0}")]
    Io(#[from] std::io::Error),

    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("msgpack encode error: {0}")]
    Encode(String),

    #[error("msgpack-rpc protocol error: {0}")]
    Protocol(String),

    #[error("nvim returned error: {0}")]
    Remote(String),

    #[error("timeout waiting for nvim response to {method}")]
    Timeout { method: String },

    #[error("rpc channel closed")]
    Closed,
}
