//! Find Me / Proximity values.
//!
//! | Characteristic | UUID | Payload |
//! |----------------|------|---------|
//! | Tx Power Level | `0x2A07` | 1 byte, signed dBm |
//! | Alert Level | `0x2A06` | 1 byte, `0` none / `1` mild / `2` high |

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError, expect_len};

/// Alert level written to Link Loss and Immediate Alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOption {
    #[default]
    None,
    Mild,
    High,
}

impl AlertOption {
    /// Wire value of this option.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Mild => 1,
            Self::High => 2,
        }
    }
}

impl TryFrom<u8> for AlertOption {
    type Error = EncodeError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::None),
            1 => Ok(Self::Mild),
            2 => Ok(Self::High),
            other => Err(EncodeError::OutOfRange {
                field: "alert level",
                value: i64::from(other),
                min: 0,
                max: 2,
            }),
        }
    }
}

impl std::fmt::Display for AlertOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Mild => f.write_str("mild"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Encode an alert option as an Alert Level payload.
#[must_use]
pub fn encode_alert_level(option: AlertOption) -> [u8; 1] {
    [option.level()]
}

/// Decode an Alert Level payload read back from the peripheral.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not one byte
/// and [`DecodeError::OutOfRange`] for levels above 2.
pub fn decode_alert_level(data: &[u8]) -> Result<AlertOption, DecodeError> {
    expect_len("Alert Level", data, 1)?;
    AlertOption::try_from(data[0]).map_err(|_| DecodeError::OutOfRange {
        field: "alert level",
        value: i64::from(data[0]),
    })
}

/// Decode a Tx Power Level payload (two's complement dBm).
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not one byte.
pub fn decode_tx_power(data: &[u8]) -> Result<i8, DecodeError> {
    expect_len("Tx Power Level", data, 1)?;
    Ok(i8::from_le_bytes([data[0]]))
}

/// Which Find Me / Proximity services the peripheral exposes, plus the
/// values read from or written to them.
///
/// The presence flags are fixed once discovery completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProximityState {
    pub tx_power_present: bool,
    pub link_loss_present: bool,
    pub immediate_alert_present: bool,
    /// Transmission power in dBm; only meaningful when `tx_power_present`.
    pub tx_power: Option<i8>,
    pub link_loss_alert: AlertOption,
    pub immediate_alert: AlertOption,
}
