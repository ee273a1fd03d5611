//! # gattlink-adapter-ble
//!
//! BLE adapter: finds one peripheral, connects to it and implements the
//! [`Transport`](gattlink_app::ports::Transport) port over its GATT table.
//!
//! ## How it works
//!
//! 1. Scan with the host's first adapter until a peripheral matches the
//!    configured name and/or address filters (or, without filters,
//!    advertises one of the supported services).
//! 2. Connect within the configured timeout.
//! 3. Sessions discover characteristics per service; the adapter keeps the
//!    platform characteristic behind each [`CharacteristicId`] it hands out.
//! 4. [`BleTransport::value_updates`] pumps notifications and indications
//!    into a channel the composition root routes to the sessions.
//!
//! ## Service instances
//!
//! Peripherals may expose the same service more than once (two Battery
//! services, for example). Instances are numbered in the order the platform
//! reports them, starting at zero.
//!
//! [`CharacteristicId`]: gattlink_domain::gatt::CharacteristicId
//!
//! ## Dependency rule
//!
//! Depends on `gattlink-app` and `gattlink-domain`, never the other way.

mod config;
mod error;
mod scanner;
mod transport;

pub use config::BleConfig;
pub use error::BleError;
pub use transport::BleTransport;
