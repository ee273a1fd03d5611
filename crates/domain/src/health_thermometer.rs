//! Health Thermometer Service values.
//!
//! Temperature Measurement (`0x2A1C`) layout:
//!
//! | Offset | Size | Field | Present when |
//! |--------|------|-------|--------------|
//! | 0 | 1 | Flags | always |
//! | 1 | 4 | Temperature, IEEE-11073 FLOAT | always |
//! | 5 | 7 | Time stamp (year u16 LE, month, day, h, m, s) | flags bit 1 |
//! | 5 or 12 | 1 | Temperature type | flags bit 2 |
//!
//! Flags bit 0 selects the unit: `0` Celsius, `1` Fahrenheit. Bits 3–7 are
//! reserved and ignored.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{DecodeError, expect_len, expect_min_len};
use crate::ieee11073::{FLOAT_LEN, decode_float};

const FLAG_FAHRENHEIT: u8 = 0b0000_0001;
const FLAG_TIMESTAMP: u8 = 0b0000_0010;
const FLAG_TEMPERATURE_TYPE: u8 = 0b0000_0100;

const VALUE_OFFSET: usize = 1;
const TIMESTAMP_LEN: usize = 7;

/// Unit of a measurement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Symbol used in labels.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Where on (or in) the body the temperature was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureType {
    Armpit,
    Body,
    Ear,
    Finger,
    GastroIntestinalTract,
    Mouth,
    Rectum,
    Toe,
    Tympanum,
}

impl TryFrom<u8> for TemperatureType {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Armpit),
            2 => Ok(Self::Body),
            3 => Ok(Self::Ear),
            4 => Ok(Self::Finger),
            5 => Ok(Self::GastroIntestinalTract),
            6 => Ok(Self::Mouth),
            7 => Ok(Self::Rectum),
            8 => Ok(Self::Toe),
            9 => Ok(Self::Tympanum),
            other => Err(DecodeError::OutOfRange {
                field: "temperature type",
                value: i64::from(other),
            }),
        }
    }
}

impl fmt::Display for TemperatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Armpit => "Armpit",
            Self::Body => "Body (general)",
            Self::Ear => "Ear (usually ear lobe)",
            Self::Finger => "Finger",
            Self::GastroIntestinalTract => "Gastro-intestinal Tract",
            Self::Mouth => "Mouth",
            Self::Rectum => "Rectum",
            Self::Toe => "Toe",
            Self::Tympanum => "Tympanum (ear drum)",
        })
    }
}

/// One decoded Temperature Measurement packet.
///
/// `value` is only meaningful together with `unit`; both always come from
/// the same packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthThermometerMeasurement {
    pub value: f64,
    pub unit: TemperatureUnit,
    pub timestamp: Option<NaiveDateTime>,
    pub temperature_type: Option<TemperatureType>,
}

impl HealthThermometerMeasurement {
    /// Value with its unit symbol, e.g. `"36.40 °C"`.
    #[must_use]
    pub fn value_label(&self) -> String {
        format!("{:.2} {}", self.value, self.unit.symbol())
    }

    /// Time stamp formatted as `"14 Mar 2024 09:26:53"`, if present.
    #[must_use]
    pub fn timestamp_label(&self) -> Option<String> {
        self.timestamp
            .map(|ts| ts.format("%d %b %Y %H:%M:%S").to_string())
    }
}

/// Decode a Temperature Measurement payload.
///
/// Optional fields are read only when the flags declare them.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] when the payload ends before a field
/// the flags declare, and [`DecodeError::OutOfRange`] for an impossible
/// time stamp or an unknown temperature type.
pub fn decode_measurement(data: &[u8]) -> Result<HealthThermometerMeasurement, DecodeError> {
    expect_min_len("flags", data, 1)?;
    let flags = data[0];

    let mut offset = VALUE_OFFSET + FLOAT_LEN;
    expect_min_len("temperature", data, offset)?;
    let value = decode_float([data[1], data[2], data[3], data[4]]);

    let unit = if flags & FLAG_FAHRENHEIT == 0 {
        TemperatureUnit::Celsius
    } else {
        TemperatureUnit::Fahrenheit
    };

    let timestamp = if flags & FLAG_TIMESTAMP == 0 {
        None
    } else {
        expect_min_len("timestamp", data, offset + TIMESTAMP_LEN)?;
        let ts = decode_timestamp(&data[offset..offset + TIMESTAMP_LEN])?;
        offset += TIMESTAMP_LEN;
        ts
    };

    let temperature_type = if flags & FLAG_TEMPERATURE_TYPE == 0 {
        None
    } else {
        expect_min_len("temperature type", data, offset + 1)?;
        Some(TemperatureType::try_from(data[offset])?)
    };

    Ok(HealthThermometerMeasurement {
        value,
        unit,
        timestamp,
        temperature_type,
    })
}

/// Decode a standalone Temperature Type (`0x2A1D`) payload.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] when the payload is not one byte
/// and [`DecodeError::OutOfRange`] for unknown codes.
pub fn decode_temperature_type(data: &[u8]) -> Result<TemperatureType, DecodeError> {
    expect_len("Temperature Type", data, 1)?;
    TemperatureType::try_from(data[0])
}

/// Decode a Date Time field; a zero year, month or day means "not known".
fn decode_timestamp(data: &[u8]) -> Result<Option<NaiveDateTime>, DecodeError> {
    let year = u16::from_le_bytes([data[0], data[1]]);
    let (month, day) = (data[2], data[3]);
    let (hour, minute, second) = (data[4], data[5], data[6]);

    for (field, value, max) in [
        ("timestamp month", month, 12),
        ("timestamp day", day, 31),
        ("timestamp hour", hour, 23),
        ("timestamp minute", minute, 59),
        ("timestamp second", second, 59),
    ] {
        if value > max {
            return Err(DecodeError::OutOfRange {
                field,
                value: i64::from(value),
            });
        }
    }
    if year == 0 || month == 0 || day == 0 {
        return Ok(None);
    }

    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .map(Some)
        .ok_or(DecodeError::OutOfRange {
            field: "timestamp",
            value: i64::from(year),
        })
}

/// Last measurement plus the standalone temperature type, if read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthThermometerState {
    pub measurement: Option<HealthThermometerMeasurement>,
    pub temperature_type: Option<TemperatureType>,
}
