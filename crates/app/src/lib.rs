//! # gattlink-app
//!
//! Application layer: service sessions and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the **transport port** that BLE adapters implement:
//!   - `Transport`: discover characteristics, enable notifications, read, write
//!   - `ValueUpdate`: one notification or read completion pushed by the adapter
//! - Provide one **session** per supported GATT service:
//!   - `BatterySession`: battery level of every Battery service instance
//!   - `FindMeSession`: Tx Power, Link Loss and Immediate Alert
//!   - `ThermometerSession`: vendor temperature sensor
//!   - `HealthThermometerSession`: standard Health Thermometer
//!   - `RgbLightSession`: vendor RGB LED
//! - Route incoming value updates to the owning session (`SessionRegistry`)
//! - Report decoded values and failures as `SessionEvent`s
//!
//! ## Dependency rule
//! Depends on `gattlink-domain` only (plus `tokio::sync` for channels and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod error;
pub mod ports;
pub mod registry;
pub mod sessions;

#[cfg(test)]
pub(crate) mod testing;
