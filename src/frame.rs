//! HTTP/2 frame construction and encoding (RFC 7540 Section 4).
//!
//! HTTP/2 frames have a fixed 9-byte header:
//! ```text
//! +-----------------------------------------------+
//! |                 Length (24)                    |
//! +---------------+---------------+---------------+
//! |   Type (8)    |   Flags (8)   |
//! +-+-------------+---------------+------...------+
//! |R|                 Stream Identifier (31)       |
//! +-+---------------------------------------------+
//! |                   Frame Payload ...            |
//! +-----------------------------------------------+
//! ```
//!
//! This is the outbound half only: the connection core batches these frames
//! into a single transport write. Inbound frame decoding is the host's
//! responsibility.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, ErrorCode};
use crate::settings::{Settings, DEFAULT_MAX_FRAME_SIZE};

/// Frame header size in bytes.
pub const FRAME_HEADER_LEN: usize = 9;

// Frame type constants (RFC 7540 Section 6).
pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;

// Flag constants.
pub const FLAG_NONE: u8 = 0x0;
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

/// A request or response header, name and value as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: &[u8], value: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            value: value.to_vec(),
        }
    }
}

/// Stream priority information (dependency and weight).
#[derive(Debug, Clone, Copy)]
pub struct Priority {
    pub exclusive: bool,
    pub dependency: u32,
    pub weight: u8,
}

/// An outbound HTTP/2 frame awaiting transmission.
#[derive(Debug, Clone)]
pub enum Frame {
    /// DATA frame (type 0x0): carries request body bytes.
    Data {
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    },
    /// HEADERS frame (type 0x1): encoded header block, always END_HEADERS.
    Headers {
        stream_id: u32,
        block: Vec<u8>,
        end_stream: bool,
        priority: Option<Priority>,
        pad: u8,
    },
    /// RST_STREAM frame (type 0x3): abnormal stream termination.
    RstStream {
        stream_id: u32,
        error_code: ErrorCode,
    },
    /// SETTINGS frame (type 0x4): advertised parameters, or an ACK.
    Settings { ack: bool, settings: Settings },
    /// GOAWAY frame (type 0x7): graceful shutdown.
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: Vec<u8>,
    },
    /// WINDOW_UPDATE frame (type 0x8): flow control credit.
    WindowUpdate { stream_id: u32, increment: u32 },
}

impl Frame {
    /// Build a SETTINGS frame advertising `settings`.
    pub fn settings(settings: Settings) -> Result<Frame, Error> {
        settings.validate()?;
        Ok(Frame::Settings {
            ack: false,
            settings,
        })
    }

    /// Build a SETTINGS ACK frame.
    pub fn settings_ack() -> Frame {
        Frame::Settings {
            ack: true,
            settings: Settings::default(),
        }
    }

    /// Build a WINDOW_UPDATE frame. The increment must be 1..=2^31-1.
    pub fn window_update(stream_id: u32, increment: u32) -> Result<Frame, Error> {
        if increment == 0 || increment > 0x7fff_ffff {
            return Err(Error::WindowIncrement);
        }
        Ok(Frame::WindowUpdate {
            stream_id,
            increment,
        })
    }

    /// Build a GOAWAY frame carrying the highest processed stream id.
    pub fn goaway(
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: &[u8],
    ) -> Result<Frame, Error> {
        if 8 + debug_data.len() > DEFAULT_MAX_FRAME_SIZE as usize {
            return Err(Error::PayloadTooLarge);
        }
        Ok(Frame::GoAway {
            last_stream_id,
            error_code,
            debug_data: debug_data.to_vec(),
        })
    }

    /// Build a HEADERS frame from a header list.
    ///
    /// The block is emitted as literal never-indexed fields (RFC 7541
    /// Section 6.2.3): wire-valid HPACK that needs no dynamic table.
    pub fn headers(
        stream_id: u32,
        fields: &[HeaderField],
        end_stream: bool,
        priority: Option<Priority>,
        pad: u8,
    ) -> Result<Frame, Error> {
        let block = encode_header_block(fields);
        let payload_len = block.len()
            + if priority.is_some() { 5 } else { 0 }
            + if pad > 0 { 1 + pad as usize } else { 0 };
        if payload_len > DEFAULT_MAX_FRAME_SIZE as usize {
            return Err(Error::HeaderBlockTooLarge);
        }
        Ok(Frame::Headers {
            stream_id,
            block,
            end_stream,
            priority,
            pad,
        })
    }

    /// Build a DATA frame.
    pub fn data(stream_id: u32, payload: Bytes, end_stream: bool) -> Result<Frame, Error> {
        if payload.len() > DEFAULT_MAX_FRAME_SIZE as usize {
            return Err(Error::PayloadTooLarge);
        }
        Ok(Frame::Data {
            stream_id,
            payload,
            end_stream,
        })
    }

    /// Build a RST_STREAM frame.
    pub fn rst_stream(stream_id: u32, error_code: ErrorCode) -> Frame {
        Frame::RstStream {
            stream_id,
            error_code,
        }
    }

    /// The stream this frame belongs to; 0 for connection-level frames.
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. } => *stream_id,
            Frame::Settings { .. } | Frame::GoAway { .. } => 0,
        }
    }

    /// Wire frame type.
    pub fn frame_type(&self) -> u8 {
        match self {
            Frame::Data { .. } => FRAME_DATA,
            Frame::Headers { .. } => FRAME_HEADERS,
            Frame::RstStream { .. } => FRAME_RST_STREAM,
            Frame::Settings { .. } => FRAME_SETTINGS,
            Frame::GoAway { .. } => FRAME_GOAWAY,
            Frame::WindowUpdate { .. } => FRAME_WINDOW_UPDATE,
        }
    }

    /// Encoded payload length, excluding the 9-byte header.
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Data { payload, .. } => payload.len(),
            Frame::Headers {
                block,
                priority,
                pad,
                ..
            } => {
                block.len()
                    + if priority.is_some() { 5 } else { 0 }
                    + if *pad > 0 { 1 + *pad as usize } else { 0 }
            }
            Frame::RstStream { .. } | Frame::WindowUpdate { .. } => 4,
            Frame::Settings { ack, .. } => {
                if *ack {
                    0
                } else {
                    // Three fixed 6-byte (id, value) pairs.
                    18
                }
            }
            Frame::GoAway { debug_data, .. } => 8 + debug_data.len(),
        }
    }

    /// Encode this frame (header + payload) into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Frame::Data {
                stream_id,
                payload,
                end_stream,
            } => {
                let flags = if *end_stream { FLAG_END_STREAM } else { FLAG_NONE };
                encode_frame_header(buf, payload.len() as u32, FRAME_DATA, flags, *stream_id);
                buf.put_slice(payload);
            }
            Frame::Headers {
                stream_id,
                block,
                end_stream,
                priority,
                pad,
            } => {
                let mut flags = FLAG_END_HEADERS;
                if *end_stream {
                    flags |= FLAG_END_STREAM;
                }
                if priority.is_some() {
                    flags |= FLAG_PRIORITY;
                }
                if *pad > 0 {
                    flags |= FLAG_PADDED;
                }
                encode_frame_header(
                    buf,
                    self.payload_len() as u32,
                    FRAME_HEADERS,
                    flags,
                    *stream_id,
                );
                if *pad > 0 {
                    buf.put_u8(*pad);
                }
                if let Some(pri) = priority {
                    let dep = if pri.exclusive {
                        pri.dependency | 0x8000_0000
                    } else {
                        pri.dependency
                    };
                    buf.put_u32(dep);
                    buf.put_u8(pri.weight);
                }
                buf.put_slice(block);
                if *pad > 0 {
                    buf.put_bytes(0, *pad as usize);
                }
            }
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                encode_frame_header(buf, 4, FRAME_RST_STREAM, FLAG_NONE, *stream_id);
                buf.put_u32(*error_code as u32);
            }
            Frame::Settings { ack, settings } => {
                if *ack {
                    encode_frame_header(buf, 0, FRAME_SETTINGS, FLAG_ACK, 0);
                } else {
                    let payload = settings.encode_to_vec();
                    encode_frame_header(buf, payload.len() as u32, FRAME_SETTINGS, FLAG_NONE, 0);
                    buf.put_slice(&payload);
                }
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                encode_frame_header(
                    buf,
                    (8 + debug_data.len()) as u32,
                    FRAME_GOAWAY,
                    FLAG_NONE,
                    0,
                );
                buf.put_u32(*last_stream_id & 0x7fff_ffff);
                buf.put_u32(*error_code as u32);
                buf.put_slice(debug_data);
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                encode_frame_header(buf, 4, FRAME_WINDOW_UPDATE, FLAG_NONE, *stream_id);
                buf.put_u32(*increment & 0x7fff_ffff);
            }
        }
    }
}

/// Encode a 9-byte frame header.
pub fn encode_frame_header(
    buf: &mut BytesMut,
    payload_len: u32,
    frame_type: u8,
    flags: u8,
    stream_id: u32,
) {
    buf.put_u8((payload_len >> 16) as u8);
    buf.put_u8((payload_len >> 8) as u8);
    buf.put_u8(payload_len as u8);
    buf.put_u8(frame_type);
    buf.put_u8(flags);
    buf.put_u32(stream_id & 0x7fff_ffff); // clear reserved bit
}

/// Decoded frame header.
#[derive(Debug)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

/// Decode a 9-byte frame header from the start of `buf`.
/// Returns `None` if the buffer is too short.
pub fn decode_frame_header(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < FRAME_HEADER_LEN {
        return None;
    }
    let length = (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]);
    let frame_type = buf[3];
    let flags = buf[4];
    let stream_id = (u32::from(buf[5]) << 24)
        | (u32::from(buf[6]) << 16)
        | (u32::from(buf[7]) << 8)
        | u32::from(buf[8]);
    Some(FrameHeader {
        length,
        frame_type,
        flags,
        stream_id: stream_id & 0x7fff_ffff,
    })
}

/// Encode a header list as literal never-indexed fields
/// (RFC 7541 Section 6.2.3).
fn encode_header_block(fields: &[HeaderField]) -> Vec<u8> {
    let mut block = Vec::new();
    for field in fields {
        block.push(0x10);
        encode_integer(&mut block, field.name.len(), 7);
        block.extend_from_slice(&field.name);
        encode_integer(&mut block, field.value.len(), 7);
        block.extend_from_slice(&field.value);
    }
    block
}

/// HPACK prefix-integer encoding (RFC 7541 Section 5.1). The prefix bits of
/// the first byte are assumed already written as part of the opcode; callers
/// pass `prefix` as the number of value bits in that byte.
fn encode_integer(buf: &mut Vec<u8>, value: usize, prefix: u8) {
    let max_prefix = (1usize << prefix) - 1;
    if value < max_prefix {
        buf.push(value as u8);
        return;
    }
    buf.push(max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 128 {
        buf.push((rest % 128 + 128) as u8);
        rest /= 128;
    }
    buf.push(rest as u8);
}
