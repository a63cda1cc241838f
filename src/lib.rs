#![doc = include_str!("../README.md")]

mod debounce;
mod decoder;
mod error;
mod frame;

pub use debounce::{Debounce, DebounceResult, DEFAULT_HYSTERESIS};
pub use decoder::{Decoder, DecoderState};
pub use error::{Error, Result};
pub use frame::Frame;
