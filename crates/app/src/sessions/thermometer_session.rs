//! Vendor thermometer session: temperature reading plus sensor details.

use std::sync::Arc;

use tokio::sync::mpsc;

use gattlink_domain::codec::DomainValue;
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::{self, CharacteristicId};
use gattlink_domain::thermometer::{TemperatureSample, TemperatureState};

use super::session_core::{CharacteristicRole, SessionCore, SessionState};
use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};

const ROLES: &[CharacteristicRole] = &[
    CharacteristicRole::TemperatureReading,
    CharacteristicRole::TemperatureSensorType,
    CharacteristicRole::TemperatureScanInterval,
];

impl SessionState for TemperatureState {
    fn apply(
        &mut self,
        _role: CharacteristicRole,
        _characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError> {
        match value {
            DomainValue::TemperatureReading(sample) => self.sample = Some(*sample),
            DomainValue::SensorType(sensor) => self.sensor_type = Some(*sensor),
            DomainValue::ScanInterval(interval) => self.scan_interval = Some(*interval),
            _ => {}
        }
        Ok(())
    }
}

/// Session over the vendor temperature sensor service.
pub struct ThermometerSession<T> {
    core: SessionCore<T, TemperatureState>,
}

impl<T: Transport> ThermometerSession<T> {
    pub fn new(transport: Arc<T>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            core: SessionCore::new(ServiceKind::Thermometer, transport, events),
        }
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] without a reading
    /// characteristic, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::Thermometer))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.core
            .start(ROLES, |characteristics| {
                characteristics
                    .require(CharacteristicRole::TemperatureReading)
                    .map(|_| ())
            })
            .await
    }

    /// Enable reading notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] when the reading does not
    /// notify, or the transport failure.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        self.core
            .subscribe(&[CharacteristicRole::TemperatureReading])
            .await
            .map(|_| ())
    }

    /// One-shot read of the current temperature.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle, transport or decode error.
    pub async fn read_temperature(&self) -> Result<TemperatureSample, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.require(CharacteristicRole::TemperatureReading)?;
        self.core
            .read_as(bound, |value| match value {
                DomainValue::TemperatureReading(sample) => Some(sample),
                _ => None,
            })
            .await
    }

    /// Read whichever of sensor type and scan interval the peripheral
    /// exposes and return the updated state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] (sensor type) when neither is
    /// exposed, or the first lifecycle/transport/decode error.
    pub async fn read_sensor_details(&self) -> Result<TemperatureState, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let details: Vec<_> = [
            CharacteristicRole::TemperatureSensorType,
            CharacteristicRole::TemperatureScanInterval,
        ]
        .into_iter()
        .filter_map(|role| characteristics.first(role))
        .collect();
        if details.is_empty() {
            return Err(ServiceError::NotPresent {
                characteristic: gatt::THERMOMETER_SENSOR_TYPE,
            });
        }

        for bound in details {
            self.core.read(bound).await?;
        }
        Ok(self.core.state())
    }

    /// # Errors
    ///
    /// Returns the first failure while disabling notifications.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.core.stop().await
    }

    pub fn on_value_update(&self, update: &ValueUpdate) -> bool {
        self.core.on_value_update(update)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.core.phase()
    }

    #[must_use]
    pub fn state(&self) -> TemperatureState {
        self.core.state()
    }
}
