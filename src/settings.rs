//! HTTP/2 SETTINGS parameters (RFC 7540 Section 6.5.1).

use crate::error::Error;

// Settings identifiers.
const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;

/// Default concurrent stream ceiling advertised by this endpoint.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 128;

/// Largest frame payload this endpoint accepts (advertised in SETTINGS).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 0xff_ffff;

/// Settings advertised by this endpoint in the handshake SETTINGS frame.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3).
    pub max_concurrent_streams: u32,
    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4): per-stream receive credit for
    /// future streams. Must not exceed 2^31 - 1.
    pub initial_window_size: u32,
    /// SETTINGS_MAX_FRAME_SIZE (0x5). Must lie in 16384..=16777215.
    pub max_frame_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_size: 65535,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Settings {
    /// Validate parameter ranges before building a SETTINGS frame.
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_window_size > 0x7fff_ffff {
            return Err(Error::InvalidSettings("INITIAL_WINDOW_SIZE > 2^31 - 1"));
        }
        if !(16_384..=16_777_215).contains(&self.max_frame_size) {
            return Err(Error::InvalidSettings("MAX_FRAME_SIZE out of range"));
        }
        Ok(())
    }

    /// Encode settings as a sequence of 6-byte (id: u16, value: u32) pairs.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_setting(
            buf,
            SETTINGS_MAX_CONCURRENT_STREAMS,
            self.max_concurrent_streams,
        );
        encode_setting(buf, SETTINGS_INITIAL_WINDOW_SIZE, self.initial_window_size);
        encode_setting(buf, SETTINGS_MAX_FRAME_SIZE, self.max_frame_size);
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

fn encode_setting(buf: &mut Vec<u8>, id: u16, value: u32) {
    buf.push((id >> 8) as u8);
    buf.push(id as u8);
    buf.push((value >> 24) as u8);
    buf.push((value >> 16) as u8);
    buf.push((value >> 8) as u8);
    buf.push(value as u8);
}
