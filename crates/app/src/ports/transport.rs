//! Transport port: the operations a session needs from a BLE connection.
//!
//! A transport is shared by every session attached to the same peripheral.
//! Operations on different characteristics may run concurrently; sessions
//! serialize operations on the same characteristic themselves.
//!
//! Notifications and indications are not returned by any of these methods.
//! The adapter pushes them as [`ValueUpdate`]s, which the driver routes to
//! the owning session through the registry.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use gattlink_domain::gatt::{CharacteristicHandle, CharacteristicId};

/// Failure reported by a transport operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection to the peripheral was lost")]
    ConnectionLost,
    #[error("characteristic {0} is not known to the transport")]
    CharacteristicNotFound(CharacteristicId),
    #[error("operation timed out")]
    Timeout,
    /// Another instance of the same characteristic already notifies and the
    /// backend cannot tell their notifications apart.
    #[error("notifications from {0} cannot be told apart from another instance")]
    AmbiguousNotification(CharacteristicId),
    #[error("BLE backend error")]
    Backend(#[source] Arc<dyn Error + Send + Sync>),
}

impl TransportError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Backend(Arc::new(err))
    }
}

/// A value pushed by the peripheral (notification or indication), or a
/// failure reported for a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct ValueUpdate {
    pub characteristic: CharacteristicId,
    pub value: Result<Vec<u8>, TransportError>,
}

impl ValueUpdate {
    #[must_use]
    pub fn value(characteristic: CharacteristicId, bytes: Vec<u8>) -> Self {
        Self {
            characteristic,
            value: Ok(bytes),
        }
    }

    #[must_use]
    pub fn failure(characteristic: CharacteristicId, error: TransportError) -> Self {
        Self {
            characteristic,
            value: Err(error),
        }
    }
}

/// Asynchronous GATT operations on one connected peripheral.
pub trait Transport: Send + Sync {
    /// Discover the characteristics of every instance of `service` whose
    /// UUID is listed in `characteristics`.
    ///
    /// Characteristics the peripheral does not expose are simply absent from
    /// the result; an absent service yields an empty list.
    fn discover_characteristics(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> impl Future<Output = Result<Vec<CharacteristicHandle>, TransportError>> + Send;

    /// Enable (`true`) or disable (`false`) notifications or indications.
    fn set_notify(
        &self,
        handle: &CharacteristicHandle,
        enabled: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the current value of a characteristic.
    fn read(
        &self,
        handle: &CharacteristicHandle,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Write `payload` to a characteristic.
    fn write(
        &self,
        handle: &CharacteristicHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gattlink_domain::gatt::{self, ServiceId};

    #[test]
    fn should_keep_backend_error_as_source() {
        let io = std::io::Error::other("adapter powered off");
        let err = TransportError::backend(io);
        assert_eq!(err.to_string(), "BLE backend error");
        assert_eq!(err.source().unwrap().to_string(), "adapter powered off");
    }

    #[test]
    fn should_clone_backend_errors() {
        let err = TransportError::backend(std::io::Error::other("boom"));
        let copy = err.clone();
        assert!(matches!(copy, TransportError::Backend(_)));
    }

    #[test]
    fn should_build_value_and_failure_updates() {
        let id = CharacteristicId::new(
            ServiceId::primary(gatt::BATTERY_SERVICE),
            gatt::BATTERY_LEVEL,
        );
        let update = ValueUpdate::value(id, vec![42]);
        assert_eq!(update.value.unwrap(), vec![42]);

        let update = ValueUpdate::failure(id, TransportError::ConnectionLost);
        assert!(matches!(update.value, Err(TransportError::ConnectionLost)));
    }
}
