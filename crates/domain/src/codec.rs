//! Characteristic codec: one entry point for every supported payload.
//!
//! Pure functions operating on raw `&[u8]` slices; nothing here touches a
//! transport. [`decode`] dispatches on a [`CharacteristicKind`] to the
//! per-characteristic parsers, [`encode`] turns an already validated
//! [`Command`] into its wire bytes.

use serde::Serialize;

use crate::error::DecodeError;
use crate::health_thermometer::{self, HealthThermometerMeasurement, TemperatureType};
use crate::proximity::{self, AlertOption};
use crate::rgb::{self, RgbColor};
use crate::thermometer::{self, ScanInterval, SensorType, TemperatureSample};
use crate::{battery, gatt};

/// Payload layouts the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicKind {
    BatteryLevel,
    TxPowerLevel,
    AlertLevel,
    RgbColor,
    TemperatureReading,
    TemperatureSensorType,
    TemperatureScanInterval,
    HealthTemperatureMeasurement,
    HealthTemperatureType,
}

impl CharacteristicKind {
    /// Characteristic UUID carrying this layout.
    #[must_use]
    pub const fn uuid(self) -> uuid::Uuid {
        match self {
            Self::BatteryLevel => gatt::BATTERY_LEVEL,
            Self::TxPowerLevel => gatt::TX_POWER_LEVEL,
            Self::AlertLevel => gatt::ALERT_LEVEL,
            Self::RgbColor => gatt::RGB_COLOR,
            Self::TemperatureReading => gatt::THERMOMETER_READING,
            Self::TemperatureSensorType => gatt::THERMOMETER_SENSOR_TYPE,
            Self::TemperatureScanInterval => gatt::THERMOMETER_SCAN_INTERVAL,
            Self::HealthTemperatureMeasurement => gatt::TEMPERATURE_MEASUREMENT,
            Self::HealthTemperatureType => gatt::TEMPERATURE_TYPE,
        }
    }
}

/// A decoded characteristic value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DomainValue {
    BatteryLevel(u8),
    TxPower(i8),
    AlertLevel(AlertOption),
    RgbColor(RgbColor),
    TemperatureReading(TemperatureSample),
    SensorType(SensorType),
    ScanInterval(ScanInterval),
    HealthMeasurement(HealthThermometerMeasurement),
    TemperatureType(TemperatureType),
}

/// A value to write to a characteristic.
///
/// Commands are built from validated types ([`AlertOption`], [`RgbColor`]),
/// so range errors surface while building them, never while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AlertLevel(AlertOption),
    RgbColor(RgbColor),
}

/// Decode `data` according to `kind`.
///
/// # Errors
///
/// Returns the [`DecodeError`] of the matching per-characteristic parser.
pub fn decode(kind: CharacteristicKind, data: &[u8]) -> Result<DomainValue, DecodeError> {
    let value = match kind {
        CharacteristicKind::BatteryLevel => {
            DomainValue::BatteryLevel(battery::decode_battery_level(data)?)
        }
        CharacteristicKind::TxPowerLevel => DomainValue::TxPower(proximity::decode_tx_power(data)?),
        CharacteristicKind::AlertLevel => {
            DomainValue::AlertLevel(proximity::decode_alert_level(data)?)
        }
        CharacteristicKind::RgbColor => DomainValue::RgbColor(rgb::decode_color(data)?),
        CharacteristicKind::TemperatureReading => {
            DomainValue::TemperatureReading(thermometer::decode_reading(data)?)
        }
        CharacteristicKind::TemperatureSensorType => {
            DomainValue::SensorType(thermometer::decode_sensor_type(data)?)
        }
        CharacteristicKind::TemperatureScanInterval => {
            DomainValue::ScanInterval(thermometer::decode_scan_interval(data)?)
        }
        CharacteristicKind::HealthTemperatureMeasurement => {
            DomainValue::HealthMeasurement(health_thermometer::decode_measurement(data)?)
        }
        CharacteristicKind::HealthTemperatureType => {
            DomainValue::TemperatureType(health_thermometer::decode_temperature_type(data)?)
        }
    };
    Ok(value)
}

/// Encode `command` into its wire bytes.
#[must_use]
pub fn encode(command: &Command) -> Vec<u8> {
    match command {
        Command::AlertLevel(option) => proximity::encode_alert_level(*option).to_vec(),
        Command::RgbColor(color) => rgb::encode_color(*color).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_dispatch_battery_level() {
        assert_eq!(
            decode(CharacteristicKind::BatteryLevel, &[0x55]),
            Ok(DomainValue::BatteryLevel(0x55))
        );
    }

    #[test]
    fn should_dispatch_tx_power() {
        assert_eq!(
            decode(CharacteristicKind::TxPowerLevel, &[0xFF]),
            Ok(DomainValue::TxPower(-1))
        );
        assert_eq!(
            decode(CharacteristicKind::TxPowerLevel, &[0x7F]),
            Ok(DomainValue::TxPower(127))
        );
    }

    #[test]
    fn should_round_trip_rgb_through_codec() {
        let color = RgbColor::new(12, 34, 56, 78).unwrap();
        let bytes = encode(&Command::RgbColor(color));
        assert_eq!(
            decode(CharacteristicKind::RgbColor, &bytes),
            Ok(DomainValue::RgbColor(color))
        );
    }

    #[test]
    fn should_encode_alert_commands() {
        assert_eq!(encode(&Command::AlertLevel(AlertOption::None)), vec![0]);
        assert_eq!(encode(&Command::AlertLevel(AlertOption::Mild)), vec![1]);
        assert_eq!(encode(&Command::AlertLevel(AlertOption::High)), vec![2]);
    }

    #[test]
    fn should_propagate_parser_errors() {
        let err = decode(CharacteristicKind::HealthTemperatureMeasurement, &[0x06, 0, 0, 0, 0])
            .unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn should_map_kinds_to_characteristic_uuids() {
        assert_eq!(CharacteristicKind::BatteryLevel.uuid(), gatt::BATTERY_LEVEL);
        assert_eq!(
            CharacteristicKind::HealthTemperatureType.uuid(),
            gatt::TEMPERATURE_TYPE
        );
    }

    #[test]
    fn should_serialize_domain_value_with_kind_tag() {
        let json = serde_json::to_value(DomainValue::TxPower(-4)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "tx_power", "value": -4}));
    }
}
