//! Per-stream state tracked by the connection core.

use crate::flowcontrol::FlowControl;

/// Default priority weight for streams that specify none
/// (RFC 7540 Section 5.3.5).
pub const DEFAULT_WEIGHT: u8 = 16;

/// Lifecycle phase of a stream, as the connection core observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Admitted but not yet carrying traffic.
    Idle,
    /// Actively exchanging data.
    Open,
    /// Lifecycle finished; the registry entry may still exist.
    Closed,
}

/// State the connection core reads and writes for one multiplexed stream.
#[derive(Debug)]
pub struct H2Stream {
    pub id: u32,
    pub state: StreamState,
    /// Outbound credit. The connection issues it (via WINDOW_UPDATE
    /// handling); flush-time DATA accounting consumes it.
    pub send_window: FlowControl,
    /// Set once `send_window` reaches zero or below; further DATA frames for
    /// this stream are withheld until the window is replenished.
    pub exhausted: bool,
    /// Priority weight within the dependency tree.
    pub weight: u8,
}

impl H2Stream {
    pub fn new(id: u32, weight: u8, initial_send_window: i64) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            send_window: FlowControl::new(initial_send_window),
            exhausted: false,
            weight,
        }
    }
}

/// Root of the stream-priority dependency tree. The connection owns it;
/// scheduling decisions against it belong to higher layers.
#[derive(Debug)]
pub struct PriorityRoot {
    pub weight: u8,
}

impl PriorityRoot {
    pub fn new() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl Default for PriorityRoot {
    fn default() -> Self {
        Self::new()
    }
}
