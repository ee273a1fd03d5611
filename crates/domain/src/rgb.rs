//! Vendor RGB LED values.
//!
//! The color characteristic carries a single 4-byte payload:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | Red (0–255) |
//! | 1 | Green (0–255) |
//! | 2 | Blue (0–255) |
//! | 3 | Intensity (0–255) |
//!
//! All four channels are always written together.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError, expect_len};

const RGB_LEN: usize = 4;
const CHANNEL_MAX: i64 = 255;

/// A complete color command for the RGB LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RgbColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub intensity: u8,
}

impl RgbColor {
    /// Build a color from caller-supplied integers.
    ///
    /// Values are never clamped.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::OutOfRange`] for the first channel outside
    /// `0..=255`.
    pub fn new(red: i64, green: i64, blue: i64, intensity: i64) -> Result<Self, EncodeError> {
        Ok(Self {
            red: channel("red", red)?,
            green: channel("green", green)?,
            blue: channel("blue", blue)?,
            intensity: channel("intensity", intensity)?,
        })
    }
}

fn channel(field: &'static str, value: i64) -> Result<u8, EncodeError> {
    u8::try_from(value).map_err(|_| EncodeError::OutOfRange {
        field,
        value,
        min: 0,
        max: CHANNEL_MAX,
    })
}

/// Encode a color as `[red, green, blue, intensity]`.
#[must_use]
pub fn encode_color(color: RgbColor) -> [u8; RGB_LEN] {
    [color.red, color.green, color.blue, color.intensity]
}

/// Decode a 4-byte color payload.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not 4 bytes.
pub fn decode_color(data: &[u8]) -> Result<RgbColor, DecodeError> {
    expect_len("RGB color", data, RGB_LEN)?;
    Ok(RgbColor {
        red: data[0],
        green: data[1],
        blue: data[2],
        intensity: data[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_channels_in_wire_order() {
        let color = RgbColor::new(0x10, 0x20, 0x30, 0x40).unwrap();
        assert_eq!(encode_color(color), [0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn should_decode_what_was_encoded() {
        for (r, g, b, i) in [(0, 0, 0, 0), (255, 255, 255, 255), (255, 128, 0, 64)] {
            let color = RgbColor::new(r, g, b, i).unwrap();
            assert_eq!(decode_color(&encode_color(color)), Ok(color));
        }
    }

    #[test]
    fn should_reject_channel_above_range() {
        let err = RgbColor::new(0, 256, 0, 0).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OutOfRange {
                field: "green",
                value: 256,
                min: 0,
                max: 255,
            }
        );
    }

    #[test]
    fn should_reject_negative_intensity() {
        let err = RgbColor::new(0, 0, 0, -1).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::OutOfRange {
                field: "intensity",
                value: -1,
                ..
            }
        ));
    }

    #[test]
    fn should_reject_short_color_payload() {
        let err = decode_color(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.to_string(), "RGB color payload must be 4 bytes, got 3");
    }
}
