//! Sample format conversion for devices that do not take `i16` directly.

/// Silence for unsigned 16-bit output.
pub const U16_SILENCE: u16 = 0x8000;

/// Converts an i16 sample to f32.
///
/// Output will be in the range [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Converts an i16 sample to offset-binary u16.
#[inline]
pub fn i16_to_u16(sample: i16) -> u16 {
    (i32::from(sample) + 32768) as u16
}
