//! Battery Service values.
//!
//! | Characteristic | UUID | Payload |
//! |----------------|------|---------|
//! | Battery Level | `0x2A19` | 1 byte, unsigned percentage |

use std::collections::BTreeMap;

use crate::error::{DecodeError, expect_len};
use crate::gatt::ServiceId;

/// Largest valid battery percentage.
pub const MAX_BATTERY_LEVEL: u8 = 100;

/// Decode a Battery Level payload.
///
/// Every byte value decodes; the percentage range is enforced by
/// [`BatteryState::record`].
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not exactly
/// one byte.
pub fn decode_battery_level(data: &[u8]) -> Result<u8, DecodeError> {
    expect_len("Battery Level", data, 1)?;
    Ok(data[0])
}

/// Last known battery level for each Battery Service instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatteryState {
    levels: BTreeMap<ServiceId, u8>,
}

impl BatteryState {
    /// Record a new level for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfRange`] when `level` exceeds 100; the
    /// previous value is kept.
    pub fn record(&mut self, service: ServiceId, level: u8) -> Result<(), DecodeError> {
        if level > MAX_BATTERY_LEVEL {
            return Err(DecodeError::OutOfRange {
                field: "battery level",
                value: i64::from(level),
            });
        }
        self.levels.insert(service, level);
        Ok(())
    }

    /// Level of `service`, if one has been received.
    #[must_use]
    pub fn level(&self, service: ServiceId) -> Option<u8> {
        self.levels.get(&service).copied()
    }

    /// Iterate over every known level in service order.
    pub fn iter(&self) -> impl Iterator<Item = (ServiceId, u8)> + '_ {
        self.levels.iter().map(|(service, level)| (*service, *level))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
