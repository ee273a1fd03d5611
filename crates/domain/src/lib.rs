//! # gattlink-domain
//!
//! Pure domain model for talking to BLE peripherals through GATT.
//!
//! ## Responsibilities
//! - Foundational types: GATT identities ([`gatt::ServiceId`],
//!   [`gatt::CharacteristicId`], [`gatt::CharacteristicHandle`]) and the
//!   well-known service/characteristic UUIDs
//! - Typed values for every supported characteristic (battery level,
//!   proximity, vendor thermometer, health thermometer, RGB light)
//! - The **characteristic codec** ([`codec`]): bit-exact decode/encode of
//!   characteristic payloads
//! - Codec error conventions ([`error::DecodeError`], [`error::EncodeError`])
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! The transport boundary is expressed as a trait in the `app` crate (port).

pub mod error;
pub mod gatt;
pub mod ieee11073;

pub mod battery;
pub mod codec;
pub mod health_thermometer;
pub mod proximity;
pub mod rgb;
pub mod thermometer;
