//! Outbound frame FIFO.
//!
//! The queue owns its frames outright: push transfers ownership in, drain
//! transfers it back out, and no frame can be aliased from two queues.

use std::collections::VecDeque;

use crate::frame::Frame;

/// FIFO of frames awaiting the next flush cycle.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    /// Append a frame to the tail. O(1).
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Remove and return every queued frame in FIFO order.
    ///
    /// The queue is empty afterwards even if the caller drops the iterator
    /// early; unsent frames are never carried into the next flush.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..)
    }

    /// Borrow the queued frames in order, head first. Test and host
    /// inspection only; transmission goes through `drain`.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn fifo_order_preserved() {
        let mut queue = FrameQueue::new();
        queue.push(Frame::settings_ack());
        queue.push(Frame::rst_stream(1, ErrorCode::Cancel));
        queue.push(Frame::window_update(0, 10).unwrap());
        assert_eq!(queue.len(), 3);

        let types: Vec<u8> = queue.drain().map(|f| f.frame_type()).collect();
        assert_eq!(
            types,
            vec![
                crate::frame::FRAME_SETTINGS,
                crate::frame::FRAME_RST_STREAM,
                crate::frame::FRAME_WINDOW_UPDATE
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn partial_drain_still_empties() {
        let mut queue = FrameQueue::new();
        queue.push(Frame::settings_ack());
        queue.push(Frame::settings_ack());
        {
            let mut iter = queue.drain();
            let _ = iter.next();
            // Iterator dropped with one frame unconsumed.
        }
        assert!(queue.is_empty());
    }
}
