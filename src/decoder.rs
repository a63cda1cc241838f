//! DCF77 pulse-width decoding.
//!
//! Each second the station drops the carrier for 100 ms (a zero bit) or
//! 200 ms (a one bit); second 59 is left high so the next carrier drop
//! arrives roughly 1800 ms after the previous one and marks the minute
//! boundary. [Decoder] debounces the raw carrier bit, measures the time
//! between edges, classifies pulses into bits and assembles them into a
//! [Frame], which is validated and published on each minute boundary.

use tracing::{debug, trace};

use crate::debounce::{Debounce, DEFAULT_HYSTERESIS};
use crate::frame::Frame;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Measured pulse times may fall short of nominal by up to this many ms.
const SLACK: u16 = 50;
/// Nominal carrier-high time of the minute-boundary gap.
const SYNC_HIGH_TIME: u16 = 1800;
/// Nominal carrier-low time encoding a zero bit.
const LOW_ZERO_TIME: u16 = 100;
/// Nominal carrier-low time encoding a one bit.
const LOW_ONE_TIME: u16 = 200;

/// Outcome of a single [`Decoder::sample`] call.
///
/// Variants are ordered so callers can threshold on how much of the frame
/// was decoded, e.g. `state >= DecoderState::HasTimeAndDate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecoderState {
    /// A minute boundary completed a frame that failed validation.
    InvalidResult,
    /// No new data.
    NoResult,
    /// A partial frame with valid time and date fields was published.
    HasTimeAndDate,
    /// A complete, fully validated frame was published.
    HasComplete,
}

/// Decodes a sampled DCF77 carrier bit stream into time frames.
///
/// Feed every receiver sample to [`Decoder::sample`] along with a wrapping
/// millisecond timestamp. The decoder is purely synchronous; one call
/// advances the debounce filter and, on a debounced edge, the frame state
/// machine exactly once.
pub struct Decoder {
    debounce: Debounce,
    /// Timestamp of the last accepted minute boundary.
    phase: u16,
    /// Timestamp of the previous debounced edge.
    last_t: u16,
    working: Frame,
    validated: Frame,
    /// Next bit position to write in the working frame.
    cursor: u8,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Decoder {
            debounce: Debounce::new(DEFAULT_HYSTERESIS),
            phase: 0,
            last_t: 0,
            working: Frame::default(),
            validated: Frame::default(),
            cursor: 0,
        }
    }

    /// Replaces the default debounce hysteresis (see [`Debounce::new`]).
    #[must_use]
    pub fn with_hysteresis(mut self, hysteresis: u8) -> Self {
        self.debounce = Debounce::new(hysteresis);
        self
    }

    /// Pushes one raw carrier sample into the decoder.
    ///
    /// `value` is true while the carrier amplitude is high; depending on the
    /// receiver circuitry the signal may need inverting. `t` is a wrapping
    /// millisecond timestamp, non-decreasing between calls.
    ///
    /// Returns [`DecoderState::HasTimeAndDate`] or
    /// [`DecoderState::HasComplete`] when a frame was validated and
    /// published, readable via [`Decoder::frame`].
    pub fn sample(&mut self, value: bool, t: u16) -> DecoderState {
        let event = self.debounce.sample(value, t);
        if !event.edge {
            return DecoderState::NoResult;
        }

        let dt = event.t.wrapping_sub(self.last_t);
        let mut zult = DecoderState::NoResult;
        if event.value {
            // Rising edge ends the carrier-low pulse; anything shorter than
            // a slack-adjusted zero bit is noise and records nothing.
            if dt > LOW_ZERO_TIME - SLACK {
                let one = dt > LOW_ONE_TIME - SLACK;
                if one {
                    self.working.set_bit(self.cursor);
                }
                trace!(bit = self.cursor, one, low_ms = dt, "bit");
                self.cursor = self.cursor.saturating_add(1);
            }
        } else if dt > SYNC_HIGH_TIME - SLACK {
            zult = self.sync(event.t);
        }
        self.last_t = event.t;

        zult
    }

    /// Handles the falling edge that terminates a minute-boundary gap.
    fn sync(&mut self, t: u16) -> DecoderState {
        let zult = if self.cursor < Frame::BITS {
            // Tuned in mid-minute: right-align the bits we did catch onto
            // their true frame positions and settle for time and date.
            self.working.shift_up(Frame::BITS - self.cursor);
            match self.working.validate_time_and_date() {
                Ok(()) => DecoderState::HasTimeAndDate,
                Err(err) => {
                    debug!(bits = self.cursor, %err, "partial frame failed validation");
                    DecoderState::InvalidResult
                }
            }
        } else {
            match self.working.validate() {
                Ok(()) => DecoderState::HasComplete,
                Err(err) => {
                    debug!(%err, "frame failed validation");
                    DecoderState::InvalidResult
                }
            }
        };

        if zult >= DecoderState::HasTimeAndDate {
            self.validated = self.working;
            self.phase = t;
            debug!(
                phase = t,
                complete = zult == DecoderState::HasComplete,
                "frame accepted"
            );
        }

        // Decoding always restarts at a minute boundary
        self.cursor = 0;
        self.working = Frame::default();

        zult
    }

    /// Timestamp of the last accepted minute boundary, in the same wrapping
    /// millisecond space as the `sample` timestamps.
    #[must_use]
    pub fn phase(&self) -> u16 {
        self.phase
    }

    /// The last validated frame.
    ///
    /// There is a single slot, overwritten by the next successful
    /// validation; copy out any fields that must outlive further decoding.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.validated
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_frame;
    use test_case::test_case;

    /// A decoder that has just seen a minute boundary, with the carrier low,
    /// returned together with the timestamp of the boundary edge.
    fn synced_decoder() -> (Decoder, u16) {
        let mut decoder = Decoder::new();
        decoder.sample(true, 1000);
        let state = decoder.sample(false, 3000);
        // The long first gap reads as a sync pulse; the empty frame it
        // completes cannot validate.
        assert_eq!(state, DecoderState::InvalidResult);
        (decoder, 3000)
    }

    #[test_case(49, 0, false; "noise is dropped")]
    #[test_case(51, 1, false; "zero lower bound")]
    #[test_case(100, 1, false; "nominal zero")]
    #[test_case(149, 1, false; "zero upper bound")]
    #[test_case(151, 1, true; "one lower bound")]
    #[test_case(200, 1, true; "nominal one")]
    #[test_case(1749, 1, true; "one upper bound")]
    fn classifies_low_pulse(low_ms: u16, bits: u8, one: bool) {
        let (mut decoder, t) = synced_decoder();
        let state = decoder.sample(true, t + low_ms);
        assert_eq!(state, DecoderState::NoResult);
        assert_eq!(decoder.cursor, bits);
        assert_eq!(decoder.working.bits(), u64::from(one));
    }

    #[test]
    fn gap_past_sync_threshold_resynchronizes() {
        let (mut decoder, t) = synced_decoder();
        decoder.sample(true, t + 100);
        assert_eq!(decoder.cursor, 1);
        let state = decoder.sample(false, t + 100 + 1751);
        assert_eq!(state, DecoderState::InvalidResult);
        assert_eq!(decoder.cursor, 0);
        assert_eq!(decoder.working.bits(), 0);
    }

    #[test]
    fn normal_second_gap_is_not_sync() {
        let (mut decoder, t) = synced_decoder();
        decoder.sample(true, t + 100);
        // next second's carrier drop, 900ms after the rising edge
        let state = decoder.sample(false, t + 1000);
        assert_eq!(state, DecoderState::NoResult);
        assert_eq!(decoder.cursor, 1);
    }

    #[test]
    fn valid_frame_updates_phase_and_slot() {
        let frame = test_frame(37, 14, 24, 1, 8, 26, true);
        let (mut decoder, mut t) = synced_decoder();
        for bit in 0..Frame::BITS {
            let low = if frame.bits() >> bit & 1 == 1 { 200 } else { 100 };
            decoder.sample(true, t.wrapping_add(low));
            t = t.wrapping_add(1000);
            if bit < Frame::BITS - 1 {
                decoder.sample(false, t);
            }
        }
        // minute gap: next falling edge lands two seconds after bit 58's
        t = t.wrapping_add(1000);
        let state = decoder.sample(false, t);
        assert_eq!(state, DecoderState::HasComplete);
        assert_eq!(decoder.phase(), t);
        assert_eq!(*decoder.frame(), frame);
    }

    #[test]
    fn invalid_frame_leaves_slot_untouched() {
        let good = test_frame(37, 14, 24, 1, 8, 26, true);
        let bad = Frame::from_bits(good.bits() ^ (1 << 28));
        let (mut decoder, mut t) = synced_decoder();
        for bit in 0..Frame::BITS {
            let low = if bad.bits() >> bit & 1 == 1 { 200 } else { 100 };
            decoder.sample(true, t.wrapping_add(low));
            t = t.wrapping_add(1000);
            if bit < Frame::BITS - 1 {
                decoder.sample(false, t);
            }
        }
        t = t.wrapping_add(1000);
        let phase_before = decoder.phase();
        let state = decoder.sample(false, t);
        assert_eq!(state, DecoderState::InvalidResult);
        assert_eq!(decoder.phase(), phase_before);
        assert_eq!(decoder.frame().bits(), 0);
    }

    #[test]
    fn state_ordering_supports_thresholds() {
        assert!(DecoderState::InvalidResult < DecoderState::NoResult);
        assert!(DecoderState::NoResult < DecoderState::HasTimeAndDate);
        assert!(DecoderState::HasTimeAndDate < DecoderState::HasComplete);
        assert!(DecoderState::HasComplete >= DecoderState::HasTimeAndDate);
    }

    #[test]
    fn runaway_bit_count_does_not_panic() {
        let (mut decoder, t) = synced_decoder();
        let mut t = t;
        // noise supplies far more bits than a frame holds before any sync
        for _ in 0..300 {
            t = t.wrapping_add(200);
            decoder.sample(true, t);
            t = t.wrapping_add(800);
            decoder.sample(false, t);
        }
        t = t.wrapping_add(200);
        decoder.sample(true, t);
        t = t.wrapping_add(2000);
        let state = decoder.sample(false, t);
        assert_eq!(state, DecoderState::InvalidResult);
        assert_eq!(decoder.cursor, 0);
    }
}
