use std::io;

use thiserror::Error;
use tokio::time::error::Elapsed;

/// Everything that can go wrong while querying a server or decoding
/// its responses. All variants are terminal for the current query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to bind local socket: {0}")]
    FailedPortBind(#[source] io::Error),

    #[error("could not resolve or reach host: {0}")]
    UnknownHost(#[source] io::Error),

    #[error("failed to send request packet: {0}")]
    SendError(#[source] io::Error),

    #[error("failed to receive response packet: {0}")]
    ReceiveError(#[source] io::Error),

    #[error("timed out waiting for a response")]
    Timeout(#[from] Elapsed),

    #[error("unknown packet header: {0:#010x}")]
    InvalidHeader(i32),

    #[error("unexpected message type: {0:#04x}")]
    UnexpectedMessageType(u8),

    #[error("compressed multi-packet responses are not supported")]
    UnsupportedCompression,

    #[error("suspicious fragment count: {0}")]
    InvalidFragmentCount(u8),

    #[error("multi-packet response is missing fragments")]
    IncompleteMultiPacket,

    #[error("server keeps responding with a challenge")]
    ChallengeLoopExceeded,

    #[error("malformed response: {0}")]
    MalformedResponse(#[source] Box<QueryError>),

    #[error("response truncated at offset {0}")]
    TruncatedBuffer(usize),
}

/// Failures while reading or writing the configuration file. Bad *values*
/// inside a parseable file are fixed in place and never surface here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}
