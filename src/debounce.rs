//! Input signal conditioning.
//!
//! The receiver's demodulated carrier bit is noisy around pulse edges. The
//! [Debounce] filter runs a Q7 fixed-point one-pole low-pass over the raw
//! samples and feeds the filtered level into a Schmitt trigger, producing a
//! clean logical signal plus the timestamp of the raw transition that caused
//! each output edge. Downstream pulse-width measurement therefore sees true
//! edge timing rather than filter settling delay.

const FIXED_POINT_LOG2_BASE: u8 = 7;
const FIXED_POINT_BASE: u8 = 1 << FIXED_POINT_LOG2_BASE;
/// Filter feedback coefficient, 0.97 in Q7.
const FLT_F1: u8 = (FIXED_POINT_BASE as u16 * 97 / 100) as u8;
const FLT_F2: u8 = FIXED_POINT_BASE - FLT_F1;

/// Default hysteresis, mapping to roughly 25% of the rail span.
pub const DEFAULT_HYSTERESIS: u8 = 64;

/// One low-pass update for a constant input bit.
const fn filter_step(ctrl: bool, x: u8) -> u8 {
    let acc = x as u16 * FLT_F1 as u16
        + if ctrl {
            (FLT_F2 as u16) << FIXED_POINT_LOG2_BASE
        } else {
            0
        };
    (acc >> FIXED_POINT_LOG2_BASE) as u8
}

/// Fixed point the filter reaches for a constant input, starting from the
/// midpoint. Evaluated at compile time so the switching thresholds are
/// deterministic and platform independent.
const fn converge(ctrl: bool) -> u8 {
    let mut x = FIXED_POINT_BASE / 2;
    loop {
        let next = filter_step(ctrl, x);
        if next == x {
            return x;
        }
        x = next;
    }
}

pub(crate) const RAIL_HIGH: u8 = converge(true);
pub(crate) const RAIL_LOW: u8 = converge(false);

/// Output of one [`Debounce::sample`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebounceResult {
    /// Timestamp of the raw input transition behind the current output state.
    pub t: u16,
    /// Current debounced output.
    pub value: bool,
    /// True if the output flipped on this call.
    pub edge: bool,
}

/// Low-pass debounce filter with Schmitt-trigger hysteresis.
///
/// Timestamps are a wrapping millisecond counter; only differences between
/// consecutive calls matter, so the counter may roll over freely.
pub struct Debounce {
    low_pass: u8,
    last_t: u16,
    last_state_change: u16,
    hysteresis: u8,
    last_input: bool,
    result: DebounceResult,
}

impl Debounce {
    /// Creates a filter with the given hysteresis.
    ///
    /// `hysteresis` is a value between 0 and 255 mapped onto the span between
    /// the filter's two convergence rails. With the current output low the
    /// output switches high once the filtered level climbs past
    /// `RAIL_HIGH - hysteresis`; switching back requires falling below
    /// `RAIL_LOW + hysteresis`.
    #[must_use]
    pub fn new(hysteresis: u8) -> Self {
        Debounce {
            low_pass: FIXED_POINT_BASE / 2,
            last_t: 0,
            last_state_change: 0,
            hysteresis: ((hysteresis as u16 * (RAIL_HIGH - RAIL_LOW) as u16) >> 8) as u8,
            last_input: false,
            result: DebounceResult::default(),
        }
    }

    /// Processes a new raw sample at time `t` (wrapping milliseconds).
    ///
    /// The low-pass update is applied once per elapsed millisecond since the
    /// previous call, exiting early once the level stops changing.
    pub fn sample(&mut self, value: bool, t: u16) -> DebounceResult {
        let dt = t.wrapping_sub(self.last_t);
        let mut prev = self.low_pass;
        for _ in 0..dt {
            self.low_pass = filter_step(value, self.low_pass);
            if self.low_pass == prev {
                break;
            }
            prev = self.low_pass;
        }

        if value != self.last_input {
            self.last_state_change = t;
        }

        if self.low_pass > RAIL_HIGH - self.hysteresis && !self.result.value {
            self.result = DebounceResult {
                t: self.last_state_change,
                value: true,
                edge: true,
            };
        } else if self.low_pass < RAIL_LOW + self.hysteresis && self.result.value {
            self.result = DebounceResult {
                t: self.last_state_change,
                value: false,
                edge: true,
            };
        } else {
            self.result.edge = false;
        }

        self.last_t = t;
        self.last_input = value;

        self.result
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEFAULT_HYSTERESIS)
    }
}
