//! GATT identities and well-known UUIDs.
//!
//! A peripheral may expose several instances of the same service (two
//! Battery services on a dual-battery device, for example), so a service is
//! identified by its UUID **and** an instance index. A characteristic is
//! identified by its owning service plus its own UUID; that pair is what
//! every completion and value update is correlated with.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Battery Service (`0x180F`).
pub const BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000_180F_0000_1000_8000_0080_5F9B_34FB);
/// Battery Level characteristic (`0x2A19`).
pub const BATTERY_LEVEL: Uuid = Uuid::from_u128(0x0000_2A19_0000_1000_8000_0080_5F9B_34FB);

/// Immediate Alert Service (`0x1802`).
pub const IMMEDIATE_ALERT_SERVICE: Uuid =
    Uuid::from_u128(0x0000_1802_0000_1000_8000_0080_5F9B_34FB);
/// Link Loss Service (`0x1803`).
pub const LINK_LOSS_SERVICE: Uuid = Uuid::from_u128(0x0000_1803_0000_1000_8000_0080_5F9B_34FB);
/// Tx Power Service (`0x1804`).
pub const TX_POWER_SERVICE: Uuid = Uuid::from_u128(0x0000_1804_0000_1000_8000_0080_5F9B_34FB);
/// Alert Level characteristic (`0x2A06`), used by Immediate Alert and Link Loss.
pub const ALERT_LEVEL: Uuid = Uuid::from_u128(0x0000_2A06_0000_1000_8000_0080_5F9B_34FB);
/// Tx Power Level characteristic (`0x2A07`).
pub const TX_POWER_LEVEL: Uuid = Uuid::from_u128(0x0000_2A07_0000_1000_8000_0080_5F9B_34FB);

/// Health Thermometer Service (`0x1809`).
pub const HEALTH_THERMOMETER_SERVICE: Uuid =
    Uuid::from_u128(0x0000_1809_0000_1000_8000_0080_5F9B_34FB);
/// Temperature Measurement characteristic (`0x2A1C`).
pub const TEMPERATURE_MEASUREMENT: Uuid =
    Uuid::from_u128(0x0000_2A1C_0000_1000_8000_0080_5F9B_34FB);
/// Temperature Type characteristic (`0x2A1D`).
pub const TEMPERATURE_TYPE: Uuid = Uuid::from_u128(0x0000_2A1D_0000_1000_8000_0080_5F9B_34FB);

/// Vendor RGB LED service.
pub const RGB_SERVICE: Uuid = Uuid::from_u128(0x0000_CBBB_0000_1000_8000_0080_5F9B_34FB);
/// Vendor RGB LED color characteristic (`[red, green, blue, intensity]`).
pub const RGB_COLOR: Uuid = Uuid::from_u128(0x0000_CBB1_0000_1000_8000_0080_5F9B_34FB);

/// Vendor temperature sensor service.
pub const THERMOMETER_SERVICE: Uuid = Uuid::from_u128(0x0004_0030_F8CE_11E4_ABF4_0002_A5D5_C51B);
/// Vendor temperature reading characteristic.
pub const THERMOMETER_READING: Uuid = Uuid::from_u128(0x0004_0031_F8CE_11E4_ABF4_0002_A5D5_C51B);
/// Vendor temperature sensor type characteristic.
pub const THERMOMETER_SENSOR_TYPE: Uuid =
    Uuid::from_u128(0x0004_0032_F8CE_11E4_ABF4_0002_A5D5_C51B);
/// Vendor temperature scan interval characteristic.
pub const THERMOMETER_SCAN_INTERVAL: Uuid =
    Uuid::from_u128(0x0004_0033_F8CE_11E4_ABF4_0002_A5D5_C51B);

/// One instance of a GATT service on the connected peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServiceId {
    /// Service UUID.
    pub uuid: Uuid,
    /// Zero-based index among services sharing the same UUID.
    pub instance: u16,
}

impl ServiceId {
    /// The first (usually only) instance of `uuid`.
    #[must_use]
    pub const fn primary(uuid: Uuid) -> Self {
        Self { uuid, instance: 0 }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uuid, self.instance)
    }
}

/// Identity of a discovered characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CharacteristicId {
    /// Owning service instance.
    pub service: ServiceId,
    /// Characteristic UUID.
    pub uuid: Uuid,
}

impl CharacteristicId {
    #[must_use]
    pub const fn new(service: ServiceId, uuid: Uuid) -> Self {
        Self { service, uuid }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.uuid)
    }
}

/// Operations a characteristic advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicProperties {
    /// Whether notifications or indications can be enabled.
    #[must_use]
    pub fn can_subscribe(self) -> bool {
        self.notify || self.indicate
    }

    /// Whether the characteristic accepts writes of either kind.
    #[must_use]
    pub fn can_write(self) -> bool {
        self.write || self.write_without_response
    }
}

/// A discovered characteristic as reported by the transport.
///
/// Handles are plain values: the transport owns the underlying platform
/// object and resolves it again from [`CharacteristicHandle::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacteristicHandle {
    pub id: CharacteristicId,
    pub properties: CharacteristicProperties,
}

impl CharacteristicHandle {
    #[must_use]
    pub const fn new(id: CharacteristicId, properties: CharacteristicProperties) -> Self {
        Self { id, properties }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_correct_sig_uuids() {
        assert!(BATTERY_SERVICE.to_string().starts_with("0000180f"));
        assert!(BATTERY_LEVEL.to_string().starts_with("00002a19"));
        assert!(ALERT_LEVEL.to_string().starts_with("00002a06"));
        assert!(TX_POWER_LEVEL.to_string().starts_with("00002a07"));
        assert!(TEMPERATURE_MEASUREMENT.to_string().starts_with("00002a1c"));
        assert!(TEMPERATURE_TYPE.to_string().starts_with("00002a1d"));
    }

    #[test]
    fn should_have_correct_vendor_uuids() {
        assert!(RGB_SERVICE.to_string().starts_with("0000cbbb"));
        assert!(RGB_COLOR.to_string().starts_with("0000cbb1"));
        assert_eq!(
            THERMOMETER_READING.to_string(),
            "00040031-f8ce-11e4-abf4-0002a5d5c51b"
        );
    }

    #[test]
    fn should_distinguish_service_instances() {
        let first = ServiceId::primary(BATTERY_SERVICE);
        let second = ServiceId {
            uuid: BATTERY_SERVICE,
            instance: 1,
        };
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn should_display_characteristic_id_with_instance() {
        let id = CharacteristicId::new(ServiceId::primary(BATTERY_SERVICE), BATTERY_LEVEL);
        assert_eq!(
            id.to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb#0/00002a19-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn should_report_subscribe_capability_for_indicate_only() {
        let props = CharacteristicProperties {
            indicate: true,
            ..CharacteristicProperties::default()
        };
        assert!(props.can_subscribe());
        assert!(!props.can_write());
    }

    #[test]
    fn should_report_write_capability_for_write_without_response() {
        let props = CharacteristicProperties {
            write_without_response: true,
            ..CharacteristicProperties::default()
        };
        assert!(props.can_write());
        assert!(!props.can_subscribe());
    }
}
