//! Byte-stream frame receiver.
//!
//! Reassembles frames from the raw serial byte stream. A byte with bit 7 set
//! is the only frame-start marker; the second byte of a frame is the length
//! field, from which the total frame length is `length field + 2`. The
//! receiver enforces framing and the inter-byte timeout only; it knows
//! nothing about command semantics.

use crate::constants::{FRAME_START_MASK, INTER_BYTE_TIMEOUT_MS, MAX_FRAME_SIZE};

/// Events surfaced while consuming the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// A complete frame, exactly as received (command through checksum).
    Frame(Vec<u8>),

    /// A partial frame was discarded because the inter-byte gap exceeded
    /// the timeout. The caller answers with a timeout NACK; the byte that
    /// exposed the timeout has already been re-handled from the idle state
    /// (a start byte begins a fresh frame, anything else is ignored).
    TimedOut,
}

/// Frame-boundary state machine over an incoming byte stream.
///
/// Idle until a start byte arrives, then accumulating until the buffer
/// reaches the length announced by the frame's length field. Timestamps are
/// caller-supplied milliseconds so the timeout is testable with a simulated
/// clock.
#[derive(Debug)]
pub struct FrameReceiver {
    buf: [u8; MAX_FRAME_SIZE],
    len: usize,
    last_byte_ms: u64,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    /// Create an idle receiver.
    pub fn new() -> Self {
        FrameReceiver {
            buf: [0; MAX_FRAME_SIZE],
            len: 0,
            last_byte_ms: 0,
        }
    }

    /// Whether a frame is currently being accumulated.
    pub fn is_accumulating(&self) -> bool {
        self.len > 0
    }

    /// Consume one byte from the transport.
    ///
    /// Returns at most one event: a complete frame ready for dispatch, or a
    /// timeout notification for a discarded partial frame.
    pub fn push_byte(&mut self, byte: u8, now_ms: u64) -> Option<ReceiverEvent> {
        let mut timed_out = false;
        if self.len > 0 && now_ms.saturating_sub(self.last_byte_ms) > INTER_BYTE_TIMEOUT_MS {
            log::debug!(
                "inter-byte timeout after {} buffered bytes, discarding partial frame",
                self.len
            );
            self.len = 0;
            timed_out = true;
        }

        if byte & FRAME_START_MASK != 0 {
            // A command byte unambiguously re-synchronizes the link,
            // silently abandoning any partial frame.
            self.buf[0] = byte;
            self.len = 1;
            self.last_byte_ms = now_ms;
            return timed_out.then_some(ReceiverEvent::TimedOut);
        }

        if self.len == 0 {
            // Idle: data bytes without a frame start are noise.
            return timed_out.then_some(ReceiverEvent::TimedOut);
        }

        self.buf[self.len] = byte;
        self.len += 1;
        self.last_byte_ms = now_ms;

        if self.len >= 2 {
            let total = self.buf[1] as usize + 2;
            if total > MAX_FRAME_SIZE {
                log::warn!("frame announces {} bytes, over the {} byte limit; discarding", total, MAX_FRAME_SIZE);
                self.len = 0;
                return None;
            }
            if self.len == total {
                let frame = self.buf[..total].to_vec();
                self.len = 0;
                return Some(ReceiverEvent::Frame(frame));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{checksum, FrameBuilder};
    use crate::constants::*;

    fn zero_request() -> Vec<u8> {
        FrameBuilder::command(CMD_ZERO)
            .finalize()
            .expect("should fit")
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn test_whole_frame_in_one_burst() {
        let mut receiver = FrameReceiver::new();
        let frame = zero_request();

        let mut events = Vec::new();
        for &byte in &frame {
            if let Some(event) = receiver.push_byte(byte, 0) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![ReceiverEvent::Frame(frame)]);
    }

    #[test]
    fn test_framing_is_chunking_independent() {
        // One byte every 20 ms must yield the same single dispatch.
        let mut receiver = FrameReceiver::new();
        let frame = zero_request();

        let mut events = Vec::new();
        for (i, &byte) in frame.iter().enumerate() {
            if let Some(event) = receiver.push_byte(byte, i as u64 * 20) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![ReceiverEvent::Frame(frame)]);
        assert!(!receiver.is_accumulating());
    }

    #[test]
    fn test_idle_ignores_data_bytes() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0x12, 0), None);
        assert_eq!(receiver.push_byte(0x7F, 5), None);
        assert!(!receiver.is_accumulating());
    }

    #[test]
    fn test_late_data_byte_times_out_and_is_ignored() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0xCA, 0), None);
        assert_eq!(receiver.push_byte(0x02, 100), None);

        // 600 ms of silence, then a data byte: one timeout, byte dropped.
        assert_eq!(receiver.push_byte(0x01, 700), Some(ReceiverEvent::TimedOut));
        assert!(!receiver.is_accumulating());
    }

    #[test]
    fn test_late_start_byte_times_out_and_starts_fresh() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0xCA, 0), None);

        // The late byte is itself a valid frame start: still exactly one
        // timeout, and the new frame proceeds normally.
        assert_eq!(receiver.push_byte(0x82, 600), Some(ReceiverEvent::TimedOut));
        assert!(receiver.is_accumulating());

        let tail = &zero_request()[1..];
        let mut events = Vec::new();
        for (i, &byte) in tail.iter().enumerate() {
            if let Some(event) = receiver.push_byte(byte, 610 + i as u64) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![ReceiverEvent::Frame(zero_request())]);
    }

    #[test]
    fn test_start_byte_within_window_resyncs_silently() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0xCA, 0), None);
        assert_eq!(receiver.push_byte(0x05, 10), None);

        // New command byte well inside the timeout window: the partial
        // frame is abandoned without any notification.
        assert_eq!(receiver.push_byte(0x82, 20), None);
        let mut events = Vec::new();
        for (i, &byte) in zero_request()[1..].iter().enumerate() {
            if let Some(event) = receiver.push_byte(byte, 30 + i as u64) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![ReceiverEvent::Frame(zero_request())]);
    }

    #[test]
    fn test_gap_at_exactly_500ms_is_not_a_timeout() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0xCA, 0), None);
        assert_eq!(receiver.push_byte(0x02, INTER_BYTE_TIMEOUT_MS), None);
        assert!(receiver.is_accumulating());
    }

    #[test]
    fn test_oversized_length_field_discards_frame() {
        let mut receiver = FrameReceiver::new();
        assert_eq!(receiver.push_byte(0x84, 0), None);
        assert_eq!(receiver.push_byte(0x7F, 1), None);
        assert!(!receiver.is_accumulating());

        // The link recovers on the next start byte.
        let frame = zero_request();
        let mut events = Vec::new();
        for (i, &byte) in frame.iter().enumerate() {
            if let Some(event) = receiver.push_byte(byte, 10 + i as u64) {
                events.push(event);
            }
        }
        assert_eq!(events, vec![ReceiverEvent::Frame(frame)]);
    }

    #[test]
    fn test_received_frame_verifies() {
        let mut receiver = FrameReceiver::new();
        let frame = zero_request();
        let mut received = None;
        for &byte in &frame {
            if let Some(ReceiverEvent::Frame(bytes)) = receiver.push_byte(byte, 0) {
                received = Some(bytes);
            }
        }
        let received = received.expect("frame should complete");
        assert_eq!(checksum(&received), 0);
    }
}
