//! BLE adapter error types.

use gattlink_app::ports::TransportError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// The scan ended without a peripheral matching the filters.
    #[error("no matching peripheral found within {scan_secs} s")]
    DeviceNotFound { scan_secs: u16 },

    /// The peripheral did not accept the connection in time.
    #[error("connection to {address} timed out")]
    ConnectTimeout { address: String },

    /// BLE scan or adapter operation failed.
    #[error("BLE scan error")]
    Scan(#[from] btleplug::Error),
}

/// Map a `btleplug` failure onto the transport port's error.
pub(crate) fn to_transport_error(err: btleplug::Error) -> TransportError {
    match err {
        btleplug::Error::NotConnected | btleplug::Error::DeviceNotFound => {
            TransportError::ConnectionLost
        }
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        other => TransportError::backend(other),
    }
}
