use thiserror::Error;

use crate::socket::SocketMode;

/// Why a connection attempt was refused. Never fatal: the link is simply not made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("socket handle is stale")]
    StaleSocket,
    #[error("source socket is in {0:?} mode")]
    NotASource(SocketMode),
    #[error("sink socket is in {0:?} mode")]
    NotASink(SocketMode),
    #[error("key mismatch: sink expects {sink_key}, source offers {source_key}")]
    KeyMismatch { sink_key: u32, source_key: u32 },
}

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("Config parsing error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Node class is not registered: {0}")]
    UnknownClass(String),
    #[error("Unknown node: {0}")]
    UnknownNode(u32),
    #[error("Invalid property {name}: {value}")]
    InvalidProperty { name: String, value: String },
    #[error("Invalid signal handler: {0}")]
    InvalidHandler(String),
    #[error("Malformed document: {0}")]
    Malformed(String),
    #[error("Connection refused: {0}")]
    Connect(#[from] ConnectError),
}

impl From<std::str::Utf8Error> for ViewError {
    fn from(err: std::str::Utf8Error) -> Self {
        ViewError::Malformed(err.to_string())
    }
}
