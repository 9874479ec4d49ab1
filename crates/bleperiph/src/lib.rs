//! bleperiph - BLE peripheral bring-up and pairing
//!
//! This library stands up the GATT server of an embedded BLE peripheral on
//! top of a platform stack: Device Information, an optional Battery service
//! and a firmware update service supplied by the caller. It answers the
//! stack's security callbacks with a passkey-display pairing flow and tracks
//! whether a central is connected.
//!
//! The platform stack is reached through [`platform::BleStack`];
//! [`platform::LoopbackStack`] is an in-memory implementation that can also
//! act as the central.

pub mod collaborators;
pub mod connection;
pub mod error;
pub mod gatt;
pub mod peripheral;
pub mod platform;
pub mod smp;
pub mod uuid;

// Re-export common types for convenience
pub use collaborators::{PairingDisplay, UpdateService};
pub use connection::ConnectionTracker;
pub use error::{PeripheralError, Result};
pub use gatt::{
    ActiveService, Characteristic, CharacteristicId, CharacteristicRegistry, Permissions,
    Properties, Service, ServiceBuilder,
};
pub use peripheral::{Peripheral, PeripheralConfig};
pub use platform::{BleStack, LoopbackStack, PeerAddress, StackError};
pub use smp::{
    AuthOutcome, PairingAgent, PairingFailure, PairingState, SecurityLevel, SecurityPolicy,
};
pub use uuid::Uuid;
