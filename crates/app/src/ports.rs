//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the session layer and the BLE stack.
//! They are defined here (in `app`) so that both the sessions and the
//! adapter crates can depend on them without creating circular dependencies.

pub mod transport;

pub use transport::{Transport, TransportError, ValueUpdate};
