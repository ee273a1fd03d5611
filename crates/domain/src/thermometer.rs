//! Vendor temperature sensor values.
//!
//! The vendor thermometer service exposes three characteristics:
//!
//! | Characteristic | Payload |
//! |----------------|---------|
//! | Reading | `[sensor code][value]`, layout of `value` depends on the code |
//! | Sensor type | 1 byte sensor code |
//! | Scan interval | 1 byte, seconds (1–255) |
//!
//! Reading layouts by sensor code:
//!
//! | Code | Sensor | Value | Minimum payload |
//! |------|--------|-------|-----------------|
//! | `0x01` | Thermistor | i16 LE, x0.01 °C | 3 bytes |
//! | `0x02` | Thermocouple | IEEE-11073 FLOAT, °C | 5 bytes |
//! | `0x03` | Digital | i16 LE, x0.1 °C | 3 bytes |

use std::fmt;

use serde::Serialize;

use crate::error::{DecodeError, expect_len, expect_min_len};
use crate::ieee11073::{FLOAT_LEN, decode_float};

/// Kind of sensing element behind the vendor thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Thermistor,
    Thermocouple,
    Digital,
}

impl SensorType {
    /// Wire code of this sensor type.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Thermistor => 0x01,
            Self::Thermocouple => 0x02,
            Self::Digital => 0x03,
        }
    }

    /// Smallest reading payload (code byte included) for this sensor.
    #[must_use]
    pub const fn reading_len(self) -> usize {
        match self {
            Self::Thermistor | Self::Digital => 3,
            Self::Thermocouple => 1 + FLOAT_LEN,
        }
    }

    fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0x01 => Ok(Self::Thermistor),
            0x02 => Ok(Self::Thermocouple),
            0x03 => Ok(Self::Digital),
            other => Err(DecodeError::OutOfRange {
                field: "sensor type",
                value: i64::from(other),
            }),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thermistor => f.write_str("Thermistor"),
            Self::Thermocouple => f.write_str("Thermocouple"),
            Self::Digital => f.write_str("Digital"),
        }
    }
}

/// How often the peripheral samples its sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanInterval {
    pub seconds: u8,
}

impl fmt::Display for ScanInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s", self.seconds)
    }
}

/// One temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureSample {
    pub sensor: SensorType,
    pub celsius: f64,
}

impl fmt::Display for TemperatureSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} °C", self.celsius)
    }
}

/// Decode a reading payload.
///
/// Trailing bytes past the sensor's layout are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] when the payload is shorter than the
/// sensor's layout and [`DecodeError::OutOfRange`] for unknown sensor codes.
pub fn decode_reading(data: &[u8]) -> Result<TemperatureSample, DecodeError> {
    expect_min_len("sensor code", data, 1)?;
    let sensor = SensorType::from_code(data[0])?;
    expect_min_len("temperature", data, sensor.reading_len())?;

    let celsius = match sensor {
        SensorType::Thermistor => f64::from(i16::from_le_bytes([data[1], data[2]])) / 100.0,
        SensorType::Digital => f64::from(i16::from_le_bytes([data[1], data[2]])) / 10.0,
        SensorType::Thermocouple => decode_float([data[1], data[2], data[3], data[4]]),
    };

    Ok(TemperatureSample { sensor, celsius })
}

/// Decode a sensor type payload.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not one byte
/// and [`DecodeError::OutOfRange`] for unknown codes.
pub fn decode_sensor_type(data: &[u8]) -> Result<SensorType, DecodeError> {
    expect_len("sensor type", data, 1)?;
    SensorType::from_code(data[0])
}

/// Decode a scan interval payload.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not one byte
/// and [`DecodeError::OutOfRange`] for a zero interval.
pub fn decode_scan_interval(data: &[u8]) -> Result<ScanInterval, DecodeError> {
    expect_len("scan interval", data, 1)?;
    if data[0] == 0 {
        return Err(DecodeError::OutOfRange {
            field: "scan interval",
            value: 0,
        });
    }
    Ok(ScanInterval { seconds: data[0] })
}

/// Everything known about the vendor thermometer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemperatureState {
    pub sensor_type: Option<SensorType>,
    pub scan_interval: Option<ScanInterval>,
    pub sample: Option<TemperatureSample>,
}
