//! Error codes and crate errors.

use std::io;

use thiserror::Error;

/// HTTP/2 error codes (RFC 7540 Section 7).
///
/// Carried in GOAWAY and RST_STREAM payloads; opaque reason values as far as
/// the connection core is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }
}

/// Errors returned by the connection control plane.
#[derive(Debug, Error)]
pub enum Error {
    /// `submit_request` called with an empty header list.
    #[error("header list is empty")]
    EmptyHeaders,
    /// The next self-initiated stream id would exceed 2^31 - 1.
    #[error("stream IDs exhausted")]
    StreamIdExhausted,
    /// The concurrent stream ceiling has been reached.
    #[error("concurrent stream limit reached ({0})")]
    StreamOverflow(u32),
    /// GOAWAY has been sent or received; no new streams may be opened.
    #[error("connection is shutting down (GOAWAY)")]
    GoingAway,
    /// Encoded header block does not fit in one frame.
    #[error("header block exceeds maximum frame size")]
    HeaderBlockTooLarge,
    /// DATA payload does not fit in one frame.
    #[error("payload exceeds maximum frame size")]
    PayloadTooLarge,
    /// A settings parameter is outside its legal range.
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
    /// WINDOW_UPDATE increment of zero or beyond 2^31 - 1.
    #[error("window increment out of range")]
    WindowIncrement,
    /// A flow-control window would exceed 2^31 - 1.
    #[error("flow control window overflow")]
    FlowControlOverflow,
    /// Operation on a stream that has already fully closed.
    #[error("stream {0} is closed")]
    StreamClosed(u32),
    /// Operation on a stream id with no registry entry.
    #[error("unknown stream {0}")]
    UnknownStream(u32),
    /// Transport write or read failure, propagated verbatim.
    #[error("transport: {0}")]
    Io(#[from] io::Error),
}
