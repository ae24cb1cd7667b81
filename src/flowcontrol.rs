//! Flow control window tracking (RFC 7540 Section 6.9).

use crate::error::Error;

/// Default initial window size (RFC 7540 Section 6.9.2).
pub const DEFAULT_WINDOW_SIZE: i64 = 65535;

/// Largest representable window: 2^31 - 1.
pub const MAX_WINDOW_SIZE: i64 = 0x7fff_ffff;

/// Tracks a send or receive flow control window.
///
/// The window is signed: DATA accounting at flush time may drive a stream's
/// send window to zero or below, which marks the stream exhausted rather
/// than failing.
#[derive(Debug, Clone)]
pub struct FlowControl {
    window: i64,
}

impl FlowControl {
    pub fn new(initial: i64) -> Self {
        Self { window: initial }
    }

    /// Current window size (may be negative).
    pub fn window(&self) -> i64 {
        self.window
    }

    /// Consume `amount` bytes from the window.
    /// Returns an error if the window would go below zero.
    pub fn consume(&mut self, amount: u32) -> Result<(), Error> {
        let new = self.window - i64::from(amount);
        if new < 0 {
            return Err(Error::FlowControlOverflow);
        }
        self.window = new;
        Ok(())
    }

    /// Subtract `amount` unconditionally and return the resulting window.
    ///
    /// Used by DATA-frame accounting during a flush: the frame being charged
    /// is still sent, and a non-positive result exhausts the stream.
    pub fn debit(&mut self, amount: i64) -> i64 {
        self.window -= amount;
        self.window
    }

    /// Add `increment` to the window (from WINDOW_UPDATE).
    /// Returns an error if the window would exceed 2^31 - 1.
    pub fn increase(&mut self, increment: u32) -> Result<(), Error> {
        let new = self.window + i64::from(increment);
        if new > MAX_WINDOW_SIZE {
            return Err(Error::FlowControlOverflow);
        }
        self.window = new;
        Ok(())
    }

    /// Adjust the window after a SETTINGS change to INITIAL_WINDOW_SIZE.
    /// `delta` is (new_initial - old_initial), which can be negative.
    pub fn adjust(&mut self, delta: i64) -> Result<(), Error> {
        let new = self.window + delta;
        if new > MAX_WINDOW_SIZE {
            return Err(Error::FlowControlOverflow);
        }
        self.window = new;
        Ok(())
    }

    /// Raise the window to the maximum representable value, returning the
    /// increment applied. Used for the connection-level receive window after
    /// the handshake.
    pub fn raise_to_max(&mut self) -> u32 {
        let increment = MAX_WINDOW_SIZE - self.window;
        self.window = MAX_WINDOW_SIZE;
        increment as u32
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_consume_and_increase() {
        let mut fc = FlowControl::default();
        assert_eq!(fc.window(), 65535);
        fc.consume(1000).unwrap();
        assert_eq!(fc.window(), 64535);
        fc.increase(500).unwrap();
        assert_eq!(fc.window(), 65035);
    }

    #[test]
    fn consume_underflow() {
        let mut fc = FlowControl::new(100);
        assert!(fc.consume(101).is_err());
        assert_eq!(fc.window(), 100); // unchanged
    }

    #[test]
    fn debit_goes_negative() {
        let mut fc = FlowControl::new(100);
        assert_eq!(fc.debit(150), -50);
        assert_eq!(fc.window(), -50);
    }

    #[test]
    fn increase_overflow() {
        let mut fc = FlowControl::new(MAX_WINDOW_SIZE);
        assert!(fc.increase(1).is_err());
    }

    #[test]
    fn adjust_negative() {
        let mut fc = FlowControl::new(65535);
        fc.adjust(-100).unwrap();
        assert_eq!(fc.window(), 65435);
    }

    #[test]
    fn raise_to_max_returns_increment() {
        let mut fc = FlowControl::default();
        let inc = fc.raise_to_max();
        assert_eq!(i64::from(inc), MAX_WINDOW_SIZE - DEFAULT_WINDOW_SIZE);
        assert_eq!(fc.window(), MAX_WINDOW_SIZE);
        // Second raise is a no-op.
        assert_eq!(fc.raise_to_max(), 0);
    }
}
