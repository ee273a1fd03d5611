//! Health Thermometer session.
//!
//! Temperature Measurement is indicated, not notified; the transport treats
//! both the same way, so subscribing enables whichever the peripheral
//! advertises.

use std::sync::Arc;

use tokio::sync::mpsc;

use gattlink_domain::codec::DomainValue;
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::CharacteristicId;
use gattlink_domain::health_thermometer::{HealthThermometerState, TemperatureType};

use super::session_core::{CharacteristicRole, SessionCore, SessionState};
use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};

const ROLES: &[CharacteristicRole] = &[
    CharacteristicRole::HealthTemperatureMeasurement,
    CharacteristicRole::HealthTemperatureType,
];

impl SessionState for HealthThermometerState {
    fn apply(
        &mut self,
        _role: CharacteristicRole,
        _characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError> {
        match value {
            DomainValue::HealthMeasurement(measurement) => self.measurement = Some(*measurement),
            DomainValue::TemperatureType(kind) => self.temperature_type = Some(*kind),
            _ => {}
        }
        Ok(())
    }
}

/// Session over the Health Thermometer service.
pub struct HealthThermometerSession<T> {
    core: SessionCore<T, HealthThermometerState>,
}

impl<T: Transport> HealthThermometerSession<T> {
    pub fn new(transport: Arc<T>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            core: SessionCore::new(ServiceKind::HealthThermometer, transport, events),
        }
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] without Temperature
    /// Measurement, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::HealthThermometer))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.core
            .start(ROLES, |characteristics| {
                characteristics
                    .require(CharacteristicRole::HealthTemperatureMeasurement)
                    .map(|_| ())
            })
            .await
    }

    /// Enable Temperature Measurement indications.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] when the measurement neither
    /// indicates nor notifies, or the transport failure.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        self.core
            .subscribe(&[CharacteristicRole::HealthTemperatureMeasurement])
            .await
            .map(|_| ())
    }

    /// Read the standalone Temperature Type characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] when the peripheral does not
    /// expose it, or a lifecycle/transport/decode error.
    pub async fn read_temperature_type(&self) -> Result<TemperatureType, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.optional(CharacteristicRole::HealthTemperatureType)?;
        self.core
            .read_as(bound, |value| match value {
                DomainValue::TemperatureType(kind) => Some(kind),
                _ => None,
            })
            .await
    }

    /// # Errors
    ///
    /// Returns the first failure while disabling indications.
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
    pub fn state(&self) -> HealthThermometerState {
        self.core.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, handle, indicate_only, read_only, update};
    use gattlink_domain::gatt::{self, CharacteristicHandle};
    use gattlink_domain::health_thermometer::TemperatureUnit;

    fn measurement() -> CharacteristicHandle {
        handle(
            gatt::HEALTH_THERMOMETER_SERVICE,
            0,
            gatt::TEMPERATURE_MEASUREMENT,
            indicate_only(),
        )
    }

    fn temperature_type() -> CharacteristicHandle {
        handle(gatt::HEALTH_THERMOMETER_SERVICE, 0, gatt::TEMPERATURE_TYPE, read_only())
    }

    fn session_with(
        transport: FakeTransport,
    ) -> (
        Arc<FakeTransport>,
        HealthThermometerSession<FakeTransport>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let transport = Arc::new(transport);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = HealthThermometerSession::new(Arc::clone(&transport), tx);
        (transport, session, rx)
    }

    #[tokio::test]
    async fn should_enable_indications_on_measurement() {
        let (transport, session, _rx) = session_with(FakeTransport::default().with(measurement()));
        session.start().await.unwrap();

        session.subscribe().await.unwrap();

        assert_eq!(transport.notify_calls(), vec![(measurement().id, true)]);
        assert_eq!(session.phase(), SessionPhase::Subscribed);
    }

    #[tokio::test]
    async fn should_merge_indicated_measurement() {
        let (_transport, session, mut rx) = session_with(FakeTransport::default().with(measurement()));
        session.start().await.unwrap();
        session.subscribe().await.unwrap();

        // Fahrenheit, 98.6 (986 x 10^-1), type mouth
        session.on_value_update(&update(measurement().id, &[0x05, 0xDA, 0x03, 0x00, 0xFF, 0x06]));

        let m = session.state().measurement.unwrap();
        assert_eq!(m.unit, TemperatureUnit::Fahrenheit);
        assert!((m.value - 98.6).abs() < 1e-9);
        assert_eq!(m.temperature_type, Some(TemperatureType::Mouth));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Updated { .. }));
    }

    #[tokio::test]
    async fn should_keep_previous_measurement_on_truncated_packet() {
        let (_transport, session, mut rx) = session_with(FakeTransport::default().with(measurement()));
        session.start().await.unwrap();
        session.subscribe().await.unwrap();
        session.on_value_update(&update(measurement().id, &[0x00, 0x6C, 0x01, 0x00, 0xFF]));
        let _ = rx.try_recv();

        // flags declare a timestamp that is missing
        session.on_value_update(&update(measurement().id, &[0x02, 0x6C, 0x01, 0x00, 0xFF, 0xE8]));

        let m = session.state().measurement.unwrap();
        assert!((m.value - 36.4).abs() < 1e-9);
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::DecodeFailed {
                error: DecodeError::Truncated { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_read_optional_temperature_type() {
        let transport = FakeTransport::default().with(measurement()).with(temperature_type());
        transport.set_value(temperature_type().id, &[3]);
        let (_transport, session, _rx) = session_with(transport);
        session.start().await.unwrap();

        assert_eq!(session.read_temperature_type().await.unwrap(), TemperatureType::Ear);
        assert_eq!(session.state().temperature_type, Some(TemperatureType::Ear));
    }

    #[tokio::test]
    async fn should_report_missing_temperature_type_as_not_present() {
        let (_transport, session, _rx) = session_with(FakeTransport::default().with(measurement()));
        session.start().await.unwrap();

        let err = session.read_temperature_type().await.unwrap_err();

        assert!(matches!(err, ServiceError::NotPresent { characteristic } if characteristic == gatt::TEMPERATURE_TYPE));
    }
}
