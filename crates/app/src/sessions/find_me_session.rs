//! Find Me / Proximity session: Link Loss, Immediate Alert and Tx Power.
//!
//! Each of the three services is optional on its own, but a peripheral
//! without any alert service cannot be found, so at least one of Link Loss
//! and Immediate Alert must be present for the session to start.

use std::sync::Arc;

use tokio::sync::mpsc;

use gattlink_domain::codec::{self, Command, DomainValue};
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::{self, CharacteristicId};
use gattlink_domain::proximity::{AlertOption, ProximityState};

use super::session_core::{CharacteristicMap, CharacteristicRole, SessionCore, SessionState};
use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};

const ROLES: &[CharacteristicRole] = &[
    CharacteristicRole::LinkLossAlertLevel,
    CharacteristicRole::ImmediateAlertLevel,
    CharacteristicRole::TxPowerLevel,
];

impl SessionState for ProximityState {
    fn discovered(&mut self, characteristics: &CharacteristicMap) {
        self.tx_power_present = characteristics.contains(CharacteristicRole::TxPowerLevel);
        self.link_loss_present = characteristics.contains(CharacteristicRole::LinkLossAlertLevel);
        self.immediate_alert_present =
            characteristics.contains(CharacteristicRole::ImmediateAlertLevel);
    }

    fn apply(
        &mut self,
        role: CharacteristicRole,
        _characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError> {
        match (role, value) {
            (CharacteristicRole::TxPowerLevel, DomainValue::TxPower(power)) => {
                self.tx_power = Some(*power);
            }
            (CharacteristicRole::LinkLossAlertLevel, DomainValue::AlertLevel(option)) => {
                self.link_loss_alert = *option;
            }
            (CharacteristicRole::ImmediateAlertLevel, DomainValue::AlertLevel(option)) => {
                self.immediate_alert = *option;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Session over the Find Me / Proximity services.
pub struct FindMeSession<T> {
    core: SessionCore<T, ProximityState>,
}

impl<T: Transport> FindMeSession<T> {
    pub fn new(transport: Arc<T>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            core: SessionCore::new(ServiceKind::FindMe, transport, events),
        }
    }

    /// Discover Link Loss, Immediate Alert and Tx Power.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] (Alert Level) when
    /// neither alert service is present, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::FindMe))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.core
            .start(ROLES, |characteristics| {
                if characteristics.contains(CharacteristicRole::LinkLossAlertLevel)
                    || characteristics.contains(CharacteristicRole::ImmediateAlertLevel)
                {
                    Ok(())
                } else {
                    Err(ServiceError::CharacteristicNotFound {
                        characteristic: gatt::ALERT_LEVEL,
                    })
                }
            })
            .await
    }

    /// Enable Tx Power Level notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] without a Tx Power service,
    /// [`ServiceError::NotSupported`] when it does not notify, or the
    /// transport failure.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        self.core
            .characteristics()?
            .optional(CharacteristicRole::TxPowerLevel)?;
        self.core
            .subscribe(&[CharacteristicRole::TxPowerLevel])
            .await
            .map(|_| ())
    }

    /// Read the transmission power in dBm.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] without a Tx Power service, or a
    /// lifecycle/transport/decode error.
    pub async fn read_tx_power(&self) -> Result<i8, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.optional(CharacteristicRole::TxPowerLevel)?;
        self.core
            .read_as(bound, |value| match value {
                DomainValue::TxPower(power) => Some(power),
                _ => None,
            })
            .await
    }

    /// Read back the alert level the peripheral raises on link loss.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] without a Link Loss service, or
    /// a lifecycle/transport/decode error.
    pub async fn read_link_loss_alert(&self) -> Result<AlertOption, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.optional(CharacteristicRole::LinkLossAlertLevel)?;
        self.core
            .read_as(bound, |value| match value {
                DomainValue::AlertLevel(option) => Some(option),
                _ => None,
            })
            .await
    }

    /// Set the alert level raised when the link is lost.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] without a Link Loss service, or
    /// a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::FindMe))]
    pub async fn write_link_loss_alert(&self, option: AlertOption) -> Result<(), ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.optional(CharacteristicRole::LinkLossAlertLevel)?;
        let payload = codec::encode(&Command::AlertLevel(option));
        self.core
            .write(bound, &payload, |state| state.link_loss_alert = option)
            .await
    }

    /// Make the peripheral alert now (or stop alerting with
    /// [`AlertOption::None`]).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] without an Immediate Alert
    /// service, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::FindMe))]
    pub async fn write_immediate_alert(&self, option: AlertOption) -> Result<(), ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.optional(CharacteristicRole::ImmediateAlertLevel)?;
        let payload = codec::encode(&Command::AlertLevel(option));
        self.core
            .write(bound, &payload, |state| state.immediate_alert = option)
            .await
    }

    /// Like [`write_immediate_alert`](Self::write_immediate_alert), from a
    /// raw wire level.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Encode`] for levels above 2 without touching
    /// the transport.
    pub async fn write_immediate_alert_level(&self, level: u8) -> Result<(), ServiceError> {
        let option = AlertOption::try_from(level)?;
        self.write_immediate_alert(option).await
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
    pub fn state(&self) -> ProximityState {
        self.core.state()
    }
}
