#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A bit the station transmits with a fixed value did not hold it.
    #[error("constant flag at bit {bit} has the wrong value")]
    ConstantFlag { bit: u8 },

    /// Exactly one of the CET/CEST flags must be set.
    #[error("CET/CEST flags are not mutually exclusive")]
    TimezoneFlags,

    #[error("{field} parity check failed")]
    Parity { field: &'static str },

    /// A BCD field contained a non-decimal nibble or exceeded its maximum.
    #[error("{field} value {value:#04x} is not valid BCD in range")]
    InvalidBcd { field: &'static str, value: u8 },

    #[error("{field} must be nonzero")]
    ZeroField { field: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
