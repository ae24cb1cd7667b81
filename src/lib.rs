//! HTTP/2 connection-level control plane.
//!
//! `H2Connection` owns one transport link and the streams multiplexed over
//! it. It allocates stream ids, enforces the concurrency ceiling and flow
//! control windows, batches outbound frames into one write per flush cycle,
//! and drives the GOAWAY shutdown handshake. It does not decode inbound
//! frames: the host's decoder feeds control events back through the
//! `handle_*` methods.
//!
//! # Architecture
//!
//! ```text
//!   application
//!        | submit_request / send_data / close
//!   +----v------------+
//!   | H2Connection    |  stream registry + flow control + frame queue
//!   |   flush_queue() |  one Transport::send per flush cycle
//!   +----v------------+
//!   | Transport       |  host-provided byte pipe (TCP, TLS, in-memory)
//!   +-----------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use h2_mux::{ConnConfig, H2Connection, HeaderField};
//!
//! let mut conn = H2Connection::new(ConnConfig::default(), transport);
//! conn.init()?;
//!
//! let stream_id = conn.submit_request(&[
//!     HeaderField::new(b":method", b"GET"),
//!     HeaderField::new(b":path", b"/"),
//!     HeaderField::new(b":scheme", b"https"),
//!     HeaderField::new(b":authority", b"example.com"),
//! ], true, None, 0)?;
//!
//! // Event loop: poll the transport per the readiness predicates.
//! while conn.want_write() {
//!     conn.flush_queue()?;
//! }
//! if conn.want_read() {
//!     let n = conn.recv(&mut buf)?;
//!     // decode frames, then feed control events back:
//!     // conn.handle_window_update(..), conn.handle_goaway(..), ...
//! }
//! ```

pub mod connection;
pub mod error;
pub mod flowcontrol;
pub mod frame;
pub mod metrics;
pub mod queue;
pub mod settings;
pub mod stream;

pub use connection::{ConnConfig, H2Connection, Transport};
pub use error::{Error, ErrorCode};
pub use flowcontrol::FlowControl;
pub use frame::{Frame, HeaderField, Priority};
pub use settings::Settings;
pub use stream::{H2Stream, StreamState};
