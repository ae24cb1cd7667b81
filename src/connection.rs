//! HTTP/2 connection-level control plane.
//!
//! `H2Connection` owns one transport link and everything multiplexed over
//! it: stream admission and identifiers, connection- and stream-level flow
//! control, the outbound frame queue, and the GOAWAY shutdown handshake.
//! Frames queue up between flushes and go out in a single transport write
//! per flush cycle. Inbound bytes are decoded by the host, which feeds
//! control events back through the `handle_*` methods.

use std::collections::HashMap;
use std::io;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, ErrorCode};
use crate::flowcontrol::{FlowControl, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};
use crate::frame::{Frame, HeaderField, Priority, FRAME_DATA, FRAME_HEADER_LEN};
use crate::metrics;
use crate::queue::FrameQueue;
use crate::settings::{Settings, DEFAULT_MAX_CONCURRENT_STREAMS, DEFAULT_MAX_FRAME_SIZE};
use crate::stream::{H2Stream, PriorityRoot, StreamState, DEFAULT_WEIGHT};

/// First stream id this endpoint assigns. Odd ids are client-initiated;
/// id 1 is reserved for the HTTP/1.1 Upgrade path and never allocated here.
const FIRST_STREAM_ID: u32 = 3;

/// Largest legal stream id (31-bit space).
const MAX_STREAM_ID: u32 = 0x7fff_ffff;

/// The byte pipe under the connection. The implementing value is the opaque
/// per-connection context; both calls may block or suspend the caller, but
/// never run concurrently with another operation on the same connection.
pub trait Transport {
    /// Read available bytes into `buf`, returning the count.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write the whole buffer, or fail.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Connection configuration. Plain fields; `Default` gives the values the
/// endpoint advertises when the host sets nothing.
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Admission ceiling for concurrently tracked streams.
    pub max_concurrent_streams: u32,
    /// Desired per-stream receive credit before the caller starts consuming
    /// response bodies. Seeds the advertised initial window unless
    /// `init_window` overrides it.
    pub preread_size: u32,
    /// Explicit per-stream initial receive window for future streams.
    pub init_window: Option<u32>,
    /// Largest frame payload this endpoint accepts.
    pub max_frame_size: u32,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            preread_size: DEFAULT_WINDOW_SIZE as u32,
            init_window: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Client-side HTTP/2 connection core.
pub struct H2Connection<T: Transport> {
    transport: T,

    /// Connection-level outbound credit, replenished by peer WINDOW_UPDATEs.
    send_window: FlowControl,
    /// Connection-level inbound credit; raised to 2^31-1 by `init` so that
    /// pacing happens purely at stream granularity.
    recv_window: FlowControl,

    /// Per-stream receive credit advertised for future streams.
    init_window: u32,
    preread_size: u32,
    max_frame_size: u32,
    /// Admission ceiling; the same field `submit_request` checks.
    max_concurrent_streams: u32,

    /// Next self-initiated stream id. Odd, monotonic, starts at 3.
    next_stream_id: u32,
    /// Highest stream id processed from the peer; reported in GOAWAY.
    last_stream_id: u32,

    /// Registry of admitted streams, keyed by stream id.
    streams: HashMap<u32, H2Stream>,
    total_streams: u32,
    idle_streams: u32,
    closed_streams: u32,

    goaway_sent: bool,
    goaway_received: bool,
    /// Last-stream-id and error code from the peer's GOAWAY, if received.
    peer_goaway: Option<(u32, ErrorCode)>,

    outbound: FrameQueue,
    /// Scratch buffer for one flush cycle. Owned per connection: cleared and
    /// refilled each flush, capacity retained across cycles.
    out_buf: BytesMut,

    /// Root of the stream-priority dependency tree.
    root: PriorityRoot,
    /// Peer's INITIAL_WINDOW_SIZE as last applied, for SETTINGS deltas.
    remote_init_window: u32,
}

impl<T: Transport> H2Connection<T> {
    /// Create a connection over `transport`. No frames are queued until
    /// [`init`](Self::init).
    pub fn new(config: ConnConfig, transport: T) -> Self {
        let init_window = config.init_window.unwrap_or(config.preread_size);
        Self {
            transport,
            send_window: FlowControl::default(),
            recv_window: FlowControl::default(),
            init_window,
            preread_size: config.preread_size,
            max_frame_size: config.max_frame_size,
            max_concurrent_streams: config.max_concurrent_streams,
            next_stream_id: FIRST_STREAM_ID,
            last_stream_id: 0,
            streams: HashMap::new(),
            total_streams: 0,
            idle_streams: 0,
            closed_streams: 0,
            goaway_sent: false,
            goaway_received: false,
            peer_goaway: None,
            outbound: FrameQueue::new(),
            out_buf: BytesMut::new(),
            root: PriorityRoot::new(),
            remote_init_window: DEFAULT_WINDOW_SIZE as u32,
        }
    }

    /// Perform the initialization handshake: queue the SETTINGS
    /// advertisement and the connection WINDOW_UPDATE that raises the local
    /// receive window to the maximum, then flush both in one write.
    ///
    /// The receive window is raised locally as soon as the update frame is
    /// queued; WINDOW_UPDATE is purely additive, so claiming the credit
    /// before delivery is sound from the sender's perspective.
    pub fn init(&mut self) -> Result<(), Error> {
        self.queue_handshake()?;
        self.flush_queue()
    }

    pub(crate) fn queue_handshake(&mut self) -> Result<(), Error> {
        let settings = Settings {
            max_concurrent_streams: self.max_concurrent_streams,
            initial_window_size: self.init_window,
            max_frame_size: self.max_frame_size,
        };
        self.frame_queue(Frame::settings(settings)?);

        let increment = self.recv_window.raise_to_max();
        self.frame_queue(Frame::window_update(0, increment)?);
        Ok(())
    }

    /// Append a frame to the outbound queue. O(1); unbounded apart from
    /// memory. Backpressure is the caller's job: stop producing while
    /// `want_write` is already true and the transport is slow.
    pub fn frame_queue(&mut self, frame: Frame) {
        self.outbound.push(frame);
    }

    /// Drain the entire outbound queue into the scratch buffer and issue
    /// exactly one transport write.
    ///
    /// Per-frame policy while draining:
    /// - connection-level frames (stream id 0) are always sent;
    /// - stream-scoped frames whose stream is gone from the registry are
    ///   stale and dropped silently;
    /// - DATA for an exhausted stream is dropped; the stream collaborator
    ///   re-queues once the window is replenished;
    /// - DATA for a live stream is charged `payload + 9` against the
    ///   stream's send window, and a non-positive result exhausts the
    ///   stream. The charge governs future frames: the current one still
    ///   goes out.
    ///
    /// The queue is empty afterwards regardless of outcome; a failed write
    /// propagates verbatim and nothing is retried here.
    pub fn flush_queue(&mut self) -> Result<(), Error> {
        if self.outbound.is_empty() {
            return Ok(());
        }

        self.out_buf.clear();
        // Length-based capacity hint: one header-sized slot per queued frame.
        self.out_buf.reserve(self.outbound.len() * FRAME_HEADER_LEN);

        let mut flushed = 0u64;
        for frame in self.outbound.drain() {
            let sid = frame.stream_id();
            if sid != 0 {
                let Some(stream) = self.streams.get_mut(&sid) else {
                    metrics::FRAMES_DROPPED.increment();
                    continue;
                };
                if frame.frame_type() == FRAME_DATA {
                    if stream.exhausted {
                        metrics::FRAMES_DROPPED.increment();
                        continue;
                    }
                    let frame_size = (frame.payload_len() + FRAME_HEADER_LEN) as i64;
                    if stream.send_window.debit(frame_size) <= 0 {
                        stream.exhausted = true;
                    }
                }
            }
            frame.encode(&mut self.out_buf);
            flushed += 1;
        }

        metrics::FRAMES_FLUSHED.add(flushed);
        metrics::BYTES_FLUSHED.add(self.out_buf.len() as u64);
        self.transport.send(&self.out_buf)?;
        Ok(())
    }

    /// Open a new self-initiated stream and queue its HEADERS frame.
    ///
    /// Preconditions, checked in order: non-empty headers, stream-id space
    /// not exhausted, admission below the concurrency ceiling, no GOAWAY in
    /// either direction. Returns the allocated stream id.
    pub fn submit_request(
        &mut self,
        headers: &[HeaderField],
        no_body: bool,
        priority: Option<Priority>,
        pad: u8,
    ) -> Result<u32, Error> {
        if headers.is_empty() {
            return Err(Error::EmptyHeaders);
        }
        if self.next_stream_id > MAX_STREAM_ID {
            return Err(Error::StreamIdExhausted);
        }
        if self.total_streams >= self.max_concurrent_streams {
            return Err(Error::StreamOverflow(self.max_concurrent_streams));
        }
        if self.goaway_sent || self.goaway_received {
            return Err(Error::GoingAway);
        }

        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        // Header submission can still fail (block too large); the id is
        // burned but the stream is never registered.
        let frame = Frame::headers(stream_id, headers, no_body, priority, pad)?;
        self.frame_queue(frame);

        let weight = priority.map(|p| p.weight).unwrap_or(DEFAULT_WEIGHT);
        let send_window = i64::from(self.remote_init_window);
        self.streams
            .insert(stream_id, H2Stream::new(stream_id, weight, send_window));
        self.total_streams += 1;
        self.idle_streams += 1;
        metrics::STREAMS_SUBMITTED.increment();

        Ok(stream_id)
    }

    /// Queue a DATA frame for `stream_id`. Flow-control accounting happens
    /// at flush time, not here.
    pub fn send_data(
        &mut self,
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    ) -> Result<(), Error> {
        let stream = self
            .streams
            .get(&stream_id)
            .ok_or(Error::UnknownStream(stream_id))?;
        if stream.state == StreamState::Closed {
            return Err(Error::StreamClosed(stream_id));
        }
        let frame = Frame::data(stream_id, payload, end_stream)?;
        self.frame_queue(frame);
        Ok(())
    }

    /// Queue RST_STREAM and mark the stream's lifecycle finished.
    pub fn reset_stream(&mut self, stream_id: u32, error_code: ErrorCode) {
        self.frame_queue(Frame::rst_stream(stream_id, error_code));
        self.mark_stream_closed(stream_id);
    }

    /// Whether the driving event loop should poll the transport for reads.
    ///
    /// False once this endpoint has sent GOAWAY: no further inbound
    /// processing is solicited after initiating shutdown. Otherwise true
    /// while any stream is actively exchanging data, or until the peer's
    /// own GOAWAY arrives.
    pub fn want_read(&self) -> bool {
        if self.goaway_sent {
            return false;
        }
        let active = self.total_streams - self.idle_streams - self.closed_streams;
        active > 0 || !self.goaway_received
    }

    /// Whether the driving event loop should poll the transport for writes:
    /// the queue is non-empty and shutdown has not been initiated.
    pub fn want_write(&self) -> bool {
        !self.goaway_sent && !self.outbound.is_empty()
    }

    /// Begin graceful shutdown: queue a GOAWAY carrying `last_stream_id`
    /// and `error_code` plus optional debug data.
    ///
    /// Idempotent: once GOAWAY has been sent, further calls are no-ops and
    /// queue nothing.
    pub fn close(&mut self, error_code: ErrorCode, debug_data: &[u8]) -> Result<(), Error> {
        if self.goaway_sent {
            return Ok(());
        }
        let frame = Frame::goaway(self.last_stream_id, error_code, debug_data)?;
        self.frame_queue(frame);
        self.goaway_sent = true;
        metrics::GOAWAY_SENT.increment();
        Ok(())
    }

    // -- Inbound control events, fed by the host's frame decoder --

    /// Apply a peer WINDOW_UPDATE. Stream id 0 replenishes the connection
    /// send window; otherwise the stream's window, clearing `exhausted`
    /// once credit is positive again. Updates for unknown streams are
    /// stale and ignored.
    pub fn handle_window_update(&mut self, stream_id: u32, increment: u32) -> Result<(), Error> {
        if increment == 0 || i64::from(increment) > MAX_WINDOW_SIZE {
            return Err(Error::WindowIncrement);
        }
        if stream_id == 0 {
            self.send_window.increase(increment)?;
        } else if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.send_window.increase(increment)?;
            if stream.send_window.window() > 0 {
                stream.exhausted = false;
            }
        }
        Ok(())
    }

    /// Apply the peer's SETTINGS: adjust every non-closed stream's send
    /// window by the INITIAL_WINDOW_SIZE delta (RFC 7540 Section 6.9.2) and
    /// queue a SETTINGS ACK.
    pub fn handle_settings(&mut self, remote: &Settings) -> Result<(), Error> {
        remote.validate()?;
        let delta =
            i64::from(remote.initial_window_size) - i64::from(self.remote_init_window);
        self.remote_init_window = remote.initial_window_size;

        if delta != 0 {
            for stream in self.streams.values_mut() {
                if stream.state != StreamState::Closed {
                    stream.send_window.adjust(delta)?;
                    if stream.send_window.window() > 0 {
                        stream.exhausted = false;
                    }
                }
            }
        }

        self.frame_queue(Frame::settings_ack());
        Ok(())
    }

    /// Record the peer's GOAWAY. New stream submission fails from here on.
    pub fn handle_goaway(&mut self, last_stream_id: u32, error_code: ErrorCode) {
        self.goaway_received = true;
        self.peer_goaway = Some((last_stream_id, error_code));
    }

    /// Note that `stream_id` has started carrying traffic: it leaves the
    /// idle count and advances `last_stream_id`.
    pub fn mark_stream_active(&mut self, stream_id: u32) {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            if stream.state == StreamState::Idle {
                stream.state = StreamState::Open;
                self.idle_streams -= 1;
            }
            if stream_id > self.last_stream_id {
                self.last_stream_id = stream_id;
            }
        }
    }

    /// Note that `stream_id`'s lifecycle has finished. The registry entry
    /// survives until [`remove_stream`](Self::remove_stream).
    pub fn mark_stream_closed(&mut self, stream_id: u32) {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            match stream.state {
                StreamState::Closed => return,
                StreamState::Idle => self.idle_streams -= 1,
                StreamState::Open => {}
            }
            stream.state = StreamState::Closed;
            self.closed_streams += 1;
            metrics::STREAMS_CLOSED.increment();
        }
    }

    /// Drop the registry entry for a fully closed stream. Frames still
    /// queued for it become stale and are discarded at the next flush.
    pub fn remove_stream(&mut self, stream_id: u32) {
        self.streams.remove(&stream_id);
    }

    /// Read from the transport into `buf`. Thin passthrough so the host's
    /// decoder and this core share one transport.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        Ok(self.transport.recv(buf)?)
    }

    // -- Accessors --

    pub fn stream(&self, stream_id: u32) -> Option<&H2Stream> {
        self.streams.get(&stream_id)
    }

    pub fn stream_mut(&mut self, stream_id: u32) -> Option<&mut H2Stream> {
        self.streams.get_mut(&stream_id)
    }

    /// Connection-level outbound credit.
    pub fn send_window(&self) -> i64 {
        self.send_window.window()
    }

    /// Connection-level inbound credit.
    pub fn recv_window(&self) -> i64 {
        self.recv_window.window()
    }

    /// Per-stream receive credit advertised for future streams.
    pub fn init_window(&self) -> u32 {
        self.init_window
    }

    pub fn preread_size(&self) -> u32 {
        self.preread_size
    }

    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id
    }

    pub fn last_stream_id(&self) -> u32 {
        self.last_stream_id
    }

    pub fn total_streams(&self) -> u32 {
        self.total_streams
    }

    pub fn idle_streams(&self) -> u32 {
        self.idle_streams
    }

    pub fn closed_streams(&self) -> u32 {
        self.closed_streams
    }

    pub fn goaway_sent(&self) -> bool {
        self.goaway_sent
    }

    pub fn goaway_received(&self) -> bool {
        self.goaway_received
    }

    /// Last-stream-id and error code from the peer's GOAWAY, if any.
    pub fn peer_goaway(&self) -> Option<(u32, ErrorCode)> {
        self.peer_goaway
    }

    /// Number of frames awaiting the next flush.
    pub fn queued_frames(&self) -> usize {
        self.outbound.len()
    }

    /// Inspect queued frames in FIFO order without draining them.
    pub fn queued(&self) -> impl Iterator<Item = &Frame> {
        self.outbound.iter()
    }

    pub fn priority_root(&self) -> &PriorityRoot {
        &self.root
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{
        decode_frame_header, FRAME_GOAWAY, FRAME_HEADERS, FRAME_SETTINGS, FRAME_WINDOW_UPDATE,
    };

    struct MockTransport {
        sent: Vec<Vec<u8>>,
        fail_next: bool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                fail_next: false,
            }
        }
    }

    impl Transport for MockTransport {
        fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.fail_next {
                self.fail_next = false;
                return Err(io::Error::other("send failed"));
            }
            self.sent.push(buf.to_vec());
            Ok(())
        }
    }

    fn conn() -> H2Connection<MockTransport> {
        H2Connection::new(ConnConfig::default(), MockTransport::new())
    }

    fn get_headers() -> Vec<HeaderField> {
        vec![
            HeaderField::new(b":method", b"GET"),
            HeaderField::new(b":path", b"/"),
            HeaderField::new(b":scheme", b"https"),
            HeaderField::new(b":authority", b"example.com"),
        ]
    }

    /// Split one flushed write into (type, stream_id, payload_len) triples.
    fn parse_wire(mut buf: &[u8]) -> Vec<(u8, u32, u32)> {
        let mut frames = Vec::new();
        while let Some(header) = decode_frame_header(buf) {
            frames.push((header.frame_type, header.stream_id, header.length));
            buf = &buf[FRAME_HEADER_LEN + header.length as usize..];
        }
        assert!(buf.is_empty(), "trailing bytes after last frame");
        frames
    }

    #[test]
    fn handshake_queues_settings_then_window_update() {
        let mut conn = conn();
        conn.queue_handshake().unwrap();

        // Exactly two frames, before any flush.
        assert_eq!(conn.queued_frames(), 2);
        let types: Vec<u8> = conn.queued().map(|f| f.frame_type()).collect();
        assert_eq!(types, vec![FRAME_SETTINGS, FRAME_WINDOW_UPDATE]);

        // Receive window raised optimistically, before the flush.
        assert_eq!(conn.recv_window(), MAX_WINDOW_SIZE);
    }

    #[test]
    fn init_flushes_one_write_with_both_frames() {
        let mut conn = conn();
        conn.init().unwrap();
        assert_eq!(conn.transport_mut().sent.len(), 1);

        let frames = parse_wire(&conn.transport_mut().sent[0].clone());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, FRAME_SETTINGS);
        assert_eq!(frames[1].0, FRAME_WINDOW_UPDATE);
        assert_eq!(frames[1].1, 0);
        assert!(!conn.want_write());
    }

    #[test]
    fn init_window_seeded_from_preread_unless_overridden() {
        let transport = MockTransport::new();
        let config = ConnConfig {
            preread_size: 4096,
            ..Default::default()
        };
        let conn = H2Connection::new(config, transport);
        assert_eq!(conn.init_window(), 4096);

        let config = ConnConfig {
            preread_size: 4096,
            init_window: Some(1 << 20),
            ..Default::default()
        };
        let conn = H2Connection::new(config, MockTransport::new());
        assert_eq!(conn.init_window(), 1 << 20);
    }

    #[test]
    fn stream_ids_start_at_three_and_advance_by_two() {
        let mut conn = conn();
        let ids: Vec<u32> = (0..5)
            .map(|_| conn.submit_request(&get_headers(), true, None, 0).unwrap())
            .collect();
        assert_eq!(ids, vec![3, 5, 7, 9, 11]);
        for id in ids {
            assert_eq!(id % 2, 1);
        }
        assert_eq!(conn.next_stream_id(), 13);
    }

    #[test]
    fn fresh_submit_scenario() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), true, None, 0).unwrap();
        assert_eq!(id, 3);
        assert_eq!(conn.total_streams(), 1);
        assert_eq!(conn.idle_streams(), 1);
        assert_eq!(conn.queued_frames(), 1);
        assert_eq!(conn.queued().next().unwrap().frame_type(), FRAME_HEADERS);
    }

    #[test]
    fn empty_headers_rejected() {
        let mut conn = conn();
        assert!(matches!(
            conn.submit_request(&[], true, None, 0),
            Err(Error::EmptyHeaders)
        ));
        assert_eq!(conn.total_streams(), 0);
        assert_eq!(conn.queued_frames(), 0);
    }

    #[test]
    fn stream_overflow_rejected_idempotently() {
        let config = ConnConfig {
            max_concurrent_streams: 2,
            ..Default::default()
        };
        let mut conn = H2Connection::new(config, MockTransport::new());
        conn.submit_request(&get_headers(), true, None, 0).unwrap();
        conn.submit_request(&get_headers(), true, None, 0).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                conn.submit_request(&get_headers(), true, None, 0),
                Err(Error::StreamOverflow(2))
            ));
        }
        // Registry and id allocation untouched by the rejections.
        assert_eq!(conn.total_streams(), 2);
        assert_eq!(conn.next_stream_id(), 7);
        assert_eq!(conn.queued_frames(), 2);
    }

    #[test]
    fn stream_id_exhaustion() {
        let mut conn = conn();
        conn.next_stream_id = MAX_STREAM_ID + 2;
        assert!(matches!(
            conn.submit_request(&get_headers(), true, None, 0),
            Err(Error::StreamIdExhausted)
        ));
    }

    #[test]
    fn submit_after_goaway_rejected() {
        let mut conn = conn();
        conn.close(ErrorCode::NoError, b"").unwrap();
        assert!(matches!(
            conn.submit_request(&get_headers(), true, None, 0),
            Err(Error::GoingAway)
        ));

        let mut conn = self::conn();
        conn.handle_goaway(0, ErrorCode::NoError);
        assert!(matches!(
            conn.submit_request(&get_headers(), true, None, 0),
            Err(Error::GoingAway)
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut conn = conn();
        conn.close(ErrorCode::NoError, b"").unwrap();
        assert!(conn.goaway_sent());
        assert_eq!(conn.queued_frames(), 1);

        conn.close(ErrorCode::Cancel, b"again").unwrap();
        assert_eq!(conn.queued_frames(), 1); // no second GOAWAY
    }

    #[test]
    fn goaway_carries_last_stream_id_and_code() {
        let mut conn = conn();
        for _ in 0..3 {
            conn.submit_request(&get_headers(), true, None, 0).unwrap();
        }
        conn.mark_stream_active(7);
        assert_eq!(conn.last_stream_id(), 7);
        conn.flush_queue().unwrap();

        conn.close(ErrorCode::NoError, b"").unwrap();
        match conn.queued().next().unwrap() {
            Frame::GoAway {
                last_stream_id,
                error_code,
                ..
            } => {
                assert_eq!(*last_stream_id, 7);
                assert_eq!(*error_code, ErrorCode::NoError);
            }
            other => panic!("expected GoAway, got {other:?}"),
        };
    }

    #[test]
    fn flush_on_empty_queue_writes_nothing() {
        let mut conn = conn();
        conn.flush_queue().unwrap();
        assert!(conn.transport_mut().sent.is_empty());
    }

    #[test]
    fn want_write_tracks_queue_state() {
        let mut conn = conn();
        assert!(!conn.want_write());

        conn.frame_queue(Frame::settings_ack());
        assert!(conn.want_write());

        conn.flush_queue().unwrap();
        assert!(!conn.want_write());
    }

    #[test]
    fn want_write_false_after_goaway() {
        let mut conn = conn();
        conn.close(ErrorCode::NoError, b"").unwrap();
        // A GOAWAY frame is queued, but shutdown has been initiated.
        assert_eq!(conn.queued_frames(), 1);
        assert!(!conn.want_write());
    }

    #[test]
    fn want_read_transitions() {
        let mut conn = conn();
        // Fresh connection: keep reading until the peer's GOAWAY arrives.
        assert!(conn.want_read());

        conn.handle_goaway(0, ErrorCode::NoError);
        // Peer said goodbye and nothing is active.
        assert!(!conn.want_read());

        let mut conn = self::conn();
        let id = conn.submit_request(&get_headers(), true, None, 0).unwrap();
        conn.mark_stream_active(id);
        conn.handle_goaway(0, ErrorCode::NoError);
        // Stream still exchanging data.
        assert!(conn.want_read());

        conn.mark_stream_closed(id);
        assert!(!conn.want_read());

        let mut conn = self::conn();
        conn.close(ErrorCode::NoError, b"").unwrap();
        assert!(!conn.want_read());
    }

    #[test]
    fn connection_frames_bypass_registry_lookup() {
        let mut conn = conn();
        // Empty registry; every one of these is stream id 0 and must be sent.
        conn.frame_queue(Frame::settings(Settings::default()).unwrap());
        conn.frame_queue(Frame::window_update(0, 1000).unwrap());
        conn.frame_queue(Frame::goaway(0, ErrorCode::NoError, b"").unwrap());
        conn.flush_queue().unwrap();

        let frames = parse_wire(&conn.transport_mut().sent[0].clone());
        let types: Vec<u8> = frames.iter().map(|f| f.0).collect();
        assert_eq!(types, vec![FRAME_SETTINGS, FRAME_WINDOW_UPDATE, FRAME_GOAWAY]);
    }

    #[test]
    fn stale_stream_frames_dropped() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        conn.flush_queue().unwrap();

        conn.send_data(id, Bytes::from_static(b"late"), false).unwrap();
        conn.frame_queue(Frame::settings_ack());
        conn.remove_stream(id);
        conn.flush_queue().unwrap();

        // Only the connection-level frame survives.
        let frames = parse_wire(&conn.transport_mut().sent[1].clone());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, FRAME_SETTINGS);
    }

    #[test]
    fn data_exhausting_window_still_sent_once() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        conn.flush_queue().unwrap();
        conn.stream_mut(id).unwrap().send_window = FlowControl::new(10);

        conn.send_data(id, Bytes::from_static(b"hello"), false).unwrap();
        conn.flush_queue().unwrap();

        // frame_size = 5 + 9 = 14 > 10: window goes negative, stream is
        // exhausted, but this frame was transmitted.
        let frames = parse_wire(&conn.transport_mut().sent[1].clone());
        assert_eq!(frames, vec![(FRAME_DATA, id, 5)]);
        let stream = conn.stream(id).unwrap();
        assert!(stream.exhausted);
        assert_eq!(stream.send_window.window(), -4);
    }

    #[test]
    fn data_on_exhausted_stream_dropped() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        conn.flush_queue().unwrap();
        conn.stream_mut(id).unwrap().exhausted = true;

        conn.send_data(id, Bytes::from_static(b"stranded"), false).unwrap();
        conn.flush_queue().unwrap();

        // Write happened but carried nothing: the DATA frame was dropped
        // and the queue is empty, not re-queued.
        assert!(conn.transport_mut().sent[1].is_empty());
        assert_eq!(conn.queued_frames(), 0);
    }

    #[test]
    fn window_update_replenishes_and_unexhausts() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        conn.flush_queue().unwrap();

        let stream = conn.stream_mut(id).unwrap();
        stream.send_window = FlowControl::new(-20);
        stream.exhausted = true;

        conn.handle_window_update(id, 100).unwrap();
        let stream = conn.stream(id).unwrap();
        assert!(!stream.exhausted);
        assert_eq!(stream.send_window.window(), 80);
    }

    #[test]
    fn connection_window_update() {
        let mut conn = conn();
        let before = conn.send_window();
        conn.handle_window_update(0, 4096).unwrap();
        assert_eq!(conn.send_window(), before + 4096);

        assert!(matches!(
            conn.handle_window_update(0, 0),
            Err(Error::WindowIncrement)
        ));
    }

    #[test]
    fn settings_delta_applied_to_open_streams() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        assert_eq!(conn.stream(id).unwrap().send_window.window(), 65535);

        let remote = Settings {
            initial_window_size: 70000,
            ..Default::default()
        };
        conn.handle_settings(&remote).unwrap();
        assert_eq!(conn.stream(id).unwrap().send_window.window(), 65535 + 4465);

        // ACK queued.
        assert!(conn
            .queued()
            .any(|f| matches!(f, Frame::Settings { ack: true, .. })));
    }

    #[test]
    fn transport_error_propagates_and_queue_is_cleared() {
        let mut conn = conn();
        conn.frame_queue(Frame::settings_ack());
        conn.transport_mut().fail_next = true;

        assert!(matches!(conn.flush_queue(), Err(Error::Io(_))));
        // Drained before the write: nothing left to retry.
        assert_eq!(conn.queued_frames(), 0);

        // Subsequent flushes succeed with fresh frames.
        conn.frame_queue(Frame::settings_ack());
        conn.flush_queue().unwrap();
        assert_eq!(conn.transport_mut().sent.len(), 1);
    }

    #[test]
    fn reset_stream_queues_rst_and_closes() {
        let mut conn = conn();
        let id = conn.submit_request(&get_headers(), false, None, 0).unwrap();
        conn.flush_queue().unwrap();

        conn.reset_stream(id, ErrorCode::Cancel);
        assert_eq!(conn.closed_streams(), 1);
        assert_eq!(conn.stream(id).unwrap().state, StreamState::Closed);

        conn.flush_queue().unwrap();
        let frames = parse_wire(&conn.transport_mut().sent[1].clone());
        assert_eq!(frames[0].0, crate::frame::FRAME_RST_STREAM);
        assert_eq!(frames[0].1, id);
    }

    #[test]
    fn header_submission_failure_does_not_register_stream() {
        let mut conn = conn();
        let huge = vec![HeaderField::new(b"x", &vec![b'v'; DEFAULT_MAX_FRAME_SIZE as usize + 1])];
        assert!(matches!(
            conn.submit_request(&huge, true, None, 0),
            Err(Error::HeaderBlockTooLarge)
        ));
        assert_eq!(conn.total_streams(), 0);
        assert_eq!(conn.queued_frames(), 0);
    }

    #[test]
    fn counters_across_lifecycle() {
        let mut conn = conn();
        let a = conn.submit_request(&get_headers(), true, None, 0).unwrap();
        let b = conn.submit_request(&get_headers(), true, None, 0).unwrap();
        assert_eq!((conn.total_streams(), conn.idle_streams()), (2, 2));

        conn.mark_stream_active(a);
        assert_eq!(conn.idle_streams(), 1);

        conn.mark_stream_closed(a);
        conn.mark_stream_closed(a); // idempotent
        assert_eq!(conn.closed_streams(), 1);

        // Closing an idle stream adjusts both counters.
        conn.mark_stream_closed(b);
        assert_eq!((conn.idle_streams(), conn.closed_streams()), (0, 2));
    }
}
