//! The 59-bit DCF77 data frame.
//!
//! One frame is transmitted per minute, one bit per second, with second 59
//! left silent as the minute marker. Bit 0 is the first bit received:
//!
//! | offset | width | field |
//! |--------|-------|-------|
//! | 0      | 1     | minute-start flag, always 0 |
//! | 1      | 14    | auxiliary/weather data |
//! | 15     | 1     | call bit (station irregularity) |
//! | 16     | 1     | CET/CEST change pending this hour |
//! | 17     | 1     | CEST |
//! | 18     | 1     | CET |
//! | 19     | 1     | leap second pending |
//! | 20     | 1     | time-start flag, always 1 |
//! | 21     | 7     | minute, BCD |
//! | 28     | 1     | minute parity (even) |
//! | 29     | 6     | hour, BCD |
//! | 35     | 1     | hour parity (even) |
//! | 36     | 6     | day of month, BCD |
//! | 42     | 3     | day of week, 1 = Monday |
//! | 45     | 5     | month, BCD |
//! | 50     | 8     | year of century, BCD |
//! | 58     | 1     | date parity (even, bits 36-57) |

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Even parity over the set bits of `x`.
fn parity(x: u64) -> bool {
    x.count_ones() & 1 == 1
}

/// Decodes a packed two-digit BCD value.
fn decode_bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0xf)
}

/// True if `x` is two-digit BCD not exceeding the maximum given as its two
/// digits, e.g. `(2, 3)` accepts 0x00 through 0x23.
fn valid_bcd(x: u8, max_hi: u8, max_lo: u8) -> bool {
    let hi = x >> 4;
    let lo = x & 0xf;
    if hi > 9 || lo > 9 {
        return false;
    }
    if hi > max_hi {
        return false;
    }
    !(hi == max_hi && lo > max_lo)
}

/// A received DCF77 frame, stored as the raw bit register.
///
/// Field values are extracted on demand by the accessor methods; nothing here
/// relies on the in-memory layout of the struct. Accessors do not validate,
/// use [`Frame::validate`] or obtain frames from
/// [`Decoder`](crate::Decoder), which only publishes validated frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame(u64);

impl Frame {
    /// Number of bits transmitted per minute.
    pub const BITS: u8 = 59;

    /// Constructs a frame from a raw bit register, bit 0 first-received.
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Frame(bits)
    }

    /// The raw bit register.
    #[must_use]
    pub fn bits(&self) -> u64 {
        self.0
    }

    pub(crate) fn set_bit(&mut self, bit: u8) {
        if bit < 64 {
            self.0 |= 1 << bit;
        }
    }

    pub(crate) fn shift_up(&mut self, count: u8) {
        self.0 <<= count;
    }

    fn field(&self, offset: u8, width: u8) -> u64 {
        (self.0 >> offset) & ((1 << width) - 1)
    }

    fn flag(&self, offset: u8) -> bool {
        self.field(offset, 1) == 1
    }

    /// The 14 bits of auxiliary data (civil warning and encrypted weather
    /// broadcasts), as received.
    #[must_use]
    pub fn aux_data(&self) -> u16 {
        self.field(1, 14) as u16
    }

    /// True when the station signals an irregularity.
    #[must_use]
    pub fn call_bit(&self) -> bool {
        self.flag(15)
    }

    /// True when CET/CEST switches at the end of this hour.
    #[must_use]
    pub fn daylight_saving_change_pending(&self) -> bool {
        self.flag(16)
    }

    /// True when the transmitted time is CEST.
    #[must_use]
    pub fn daylight_saving(&self) -> bool {
        self.flag(17)
    }

    /// True when this hour ends with a leap second.
    #[must_use]
    pub fn leap_second_pending(&self) -> bool {
        self.flag(19)
    }

    /// Minute, 0 to 59.
    #[must_use]
    pub fn minute(&self) -> u8 {
        decode_bcd(self.field(21, 7) as u8)
    }

    /// Hour, 0 to 23.
    #[must_use]
    pub fn hour(&self) -> u8 {
        decode_bcd(self.field(29, 6) as u8)
    }

    /// Day of month, 1 to 31.
    #[must_use]
    pub fn day(&self) -> u8 {
        decode_bcd(self.field(36, 6) as u8)
    }

    /// Day of week, 1 to 7 with 1 being Monday.
    #[must_use]
    pub fn day_of_week(&self) -> u8 {
        self.field(42, 3) as u8
    }

    /// Month, 1 to 12.
    #[must_use]
    pub fn month(&self) -> u8 {
        decode_bcd(self.field(45, 5) as u8)
    }

    /// Full year, assuming the 21st century.
    #[must_use]
    pub fn year(&self) -> u16 {
        2000 + u16::from(decode_bcd(self.field(50, 8) as u8))
    }

    /// Validates a complete 59-bit frame: constant flags, CET/CEST
    /// exclusivity, the three parity bits and all BCD ranges.
    ///
    /// # Errors
    /// [Error] naming the first check that failed.
    pub fn validate(&self) -> Result<()> {
        self.validate_impl(false)
    }

    /// Validates a partial frame containing only the time and date fields,
    /// skipping the minute-start flag and CET/CEST exclusivity since the
    /// leading bits were never received.
    ///
    /// # Errors
    /// [Error] naming the first check that failed.
    pub fn validate_time_and_date(&self) -> Result<()> {
        self.validate_impl(true)
    }

    fn validate_impl(&self, time_and_date_only: bool) -> Result<()> {
        if !time_and_date_only && self.flag(0) {
            return Err(Error::ConstantFlag { bit: 0 });
        }
        if !self.flag(20) {
            return Err(Error::ConstantFlag { bit: 20 });
        }
        // There can be only one!
        if !time_and_date_only && self.flag(17) == self.flag(18) {
            return Err(Error::TimezoneFlags);
        }

        if parity(self.field(21, 7)) != self.flag(28) {
            return Err(Error::Parity { field: "minute" });
        }
        if parity(self.field(29, 6)) != self.flag(35) {
            return Err(Error::Parity { field: "hour" });
        }
        if parity(self.field(36, 22)) != self.flag(58) {
            return Err(Error::Parity { field: "date" });
        }

        let minute = self.field(21, 7) as u8;
        if !valid_bcd(minute, 5, 9) {
            return Err(Error::InvalidBcd {
                field: "minute",
                value: minute,
            });
        }
        let hour = self.field(29, 6) as u8;
        if !valid_bcd(hour, 2, 3) {
            return Err(Error::InvalidBcd {
                field: "hour",
                value: hour,
            });
        }
        let day = self.field(36, 6) as u8;
        if !valid_bcd(day, 3, 1) {
            return Err(Error::InvalidBcd {
                field: "day",
                value: day,
            });
        }
        if day == 0 {
            return Err(Error::ZeroField { field: "day" });
        }
        if self.field(42, 3) == 0 {
            return Err(Error::ZeroField { field: "weekday" });
        }
        let month = self.field(45, 5) as u8;
        if !valid_bcd(month, 1, 2) {
            return Err(Error::InvalidBcd {
                field: "month",
                value: month,
            });
        }
        if month == 0 {
            return Err(Error::ZeroField { field: "month" });
        }
        let year = self.field(50, 8) as u8;
        if !valid_bcd(year, 9, 9) {
            return Err(Error::InvalidBcd {
                field: "year",
                value: year,
            });
        }
        Ok(())
    }
}

#[cfg(feature = "chrono")]
impl Frame {
    /// Converts the frame to a [`chrono::NaiveDateTime`] in the broadcast
    /// local time (CET or CEST per [`Frame::daylight_saving`]).
    ///
    /// Returns `None` for field combinations that do not name a real calendar
    /// date, which validation alone cannot rule out (e.g. February 31st).
    #[must_use]
    pub fn to_datetime(&self) -> Option<chrono::NaiveDateTime> {
        let date = chrono::NaiveDate::from_ymd_opt(
            i32::from(self.year()),
            u32::from(self.month()),
            u32::from(self.day()),
        )?;
        let time =
            chrono::NaiveTime::from_hms_opt(u32::from(self.hour()), u32::from(self.minute()), 0)?;
        Some(chrono::NaiveDateTime::new(date, time))
    }
}

/// Builds a frame with correct constant flags and parity bits for tests.
#[cfg(test)]
pub(crate) fn test_frame(
    minute: u8,
    hour: u8,
    day: u8,
    weekday: u8,
    month: u8,
    year: u8,
    cest: bool,
) -> Frame {
    fn encode_bcd(v: u8) -> u8 {
        ((v / 10) << 4) | (v % 10)
    }

    let mut bits: u64 = 1 << 20;
    bits |= 1 << if cest { 17 } else { 18 };

    let minute = u64::from(encode_bcd(minute));
    bits |= minute << 21;
    bits |= u64::from(parity(minute)) << 28;

    let hour = u64::from(encode_bcd(hour));
    bits |= hour << 29;
    bits |= u64::from(parity(hour)) << 35;

    bits |= u64::from(encode_bcd(day)) << 36;
    bits |= u64::from(weekday) << 42;
    bits |= u64::from(encode_bcd(month)) << 45;
    bits |= u64::from(encode_bcd(year)) << 50;
    let frame = Frame::from_bits(bits);
    bits |= u64::from(parity(frame.field(36, 22))) << 58;

    Frame::from_bits(bits)
}
