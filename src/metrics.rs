//! Connection control-plane metrics.
//!
//! Process-wide counters exposed through the `metriken` registry, summed
//! across all connections.

use metriken::{metric, Counter};

#[metric(
    name = "h2_mux/streams/submitted",
    description = "Total streams opened via submit_request"
)]
pub static STREAMS_SUBMITTED: Counter = Counter::new();

#[metric(
    name = "h2_mux/streams/closed",
    description = "Total streams whose lifecycle finished"
)]
pub static STREAMS_CLOSED: Counter = Counter::new();

#[metric(
    name = "h2_mux/frames/flushed",
    description = "Frames encoded and handed to the transport"
)]
pub static FRAMES_FLUSHED: Counter = Counter::new();

#[metric(
    name = "h2_mux/frames/dropped",
    description = "Stale or exhausted-stream frames dropped during flush"
)]
pub static FRAMES_DROPPED: Counter = Counter::new();

#[metric(
    name = "h2_mux/bytes/flushed",
    description = "Bytes written to the transport by flush cycles"
)]
pub static BYTES_FLUSHED: Counter = Counter::new();

#[metric(
    name = "h2_mux/goaway/sent",
    description = "GOAWAY frames queued by close()"
)]
pub static GOAWAY_SENT: Counter = Counter::new();
