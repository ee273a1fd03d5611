//! Vendor RGB LED session.

use std::sync::Arc;

use tokio::sync::mpsc;

use gattlink_domain::codec::{self, Command, DomainValue};
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::CharacteristicId;
use gattlink_domain::rgb::RgbColor;

use super::session_core::{CharacteristicRole, SessionCore, SessionState};
use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};

const ROLES: &[CharacteristicRole] = &[CharacteristicRole::RgbColor];

/// Last color read from or written to the LED.
impl SessionState for Option<RgbColor> {
    fn apply(
        &mut self,
        _role: CharacteristicRole,
        _characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError> {
        if let DomainValue::RgbColor(color) = value {
            *self = Some(*color);
        }
        Ok(())
    }
}

/// Session over the vendor RGB LED service.
pub struct RgbLightSession<T> {
    core: SessionCore<T, Option<RgbColor>>,
}

impl<T: Transport> RgbLightSession<T> {
    pub fn new(transport: Arc<T>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            core: SessionCore::new(ServiceKind::RgbLight, transport, events),
        }
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] without the color
    /// characteristic, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::RgbLight))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.core
            .start(ROLES, |characteristics| {
                characteristics
                    .require(CharacteristicRole::RgbColor)
                    .map(|_| ())
            })
            .await
    }

    /// Enable color notifications, for LEDs that report changes made on
    /// the device itself.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] when the color does not
    /// notify, or the transport failure.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        self.core.subscribe(ROLES).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns a lifecycle, transport or decode error.
    pub async fn read_color(&self) -> Result<RgbColor, ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.require(CharacteristicRole::RgbColor)?;
        self.core
            .read_as(bound, |value| match value {
                DomainValue::RgbColor(color) => Some(color),
                _ => None,
            })
            .await
    }

    /// Validate the four channels and write them as one command.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotReady`] before `start`,
    /// [`ServiceError::Encode`] for a channel outside `0..=255` (nothing is
    /// written), or the transport failure.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::RgbLight))]
    pub async fn write_color(
        &self,
        red: i64,
        green: i64,
        blue: i64,
        intensity: i64,
    ) -> Result<(), ServiceError> {
        let characteristics = self.core.characteristics()?;
        let bound = characteristics.require(CharacteristicRole::RgbColor)?;
        let color = RgbColor::new(red, green, blue, intensity)?;
        let payload = codec::encode(&Command::RgbColor(color));
        self.core
            .write(bound, &payload, |state| *state = Some(color))
            .await
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
    pub fn color(&self) -> Option<RgbColor> {
        self.core.state()
    }
}
