//! Output sample format conversion.
//!
//! The ring always carries interleaved `i16`; devices that only accept
//! `f32` or `u16` are fed through these conversions inside the callback.

mod convert;

pub use convert::{i16_to_f32, i16_to_u16, U16_SILENCE};
