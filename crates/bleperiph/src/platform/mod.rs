//! The platform BLE/GATT substrate
//!
//! The peripheral does not implement a BLE stack. It configures one through
//! [`BleStack`] and receives its events through [`ServerCallbacks`] and
//! [`SecurityCallbacks`]. The substrate invokes callbacks on its own event
//! context, never two at a time, but concurrently with the host loop.

pub mod error;
pub mod loopback;


pub use self::error::{AttError, StackError, StackResult};
pub use self::loopback::{LoopbackStack, LoopbackWhitelist, StackEvent};

use crate::gatt::Characteristic;
use crate::smp::{AuthOutcome, SecurityLevel, SecurityPolicy};
use crate::uuid::Uuid;
use std::fmt;
use std::sync::Arc;

/// Handle of an attribute in the substrate's table
pub type AttributeHandle = u16;

/// Handle of a service declaration
pub type ServiceHandle = u16;

/// Server object created by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerHandle(pub u8);

/// Bluetooth device address of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub bytes: [u8; 6],
}

impl PeerAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5], self.bytes[4], self.bytes[3], self.bytes[2], self.bytes[1], self.bytes[0]
        )
    }
}

/// Which requests advertising admits from non-whitelisted peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanFilter {
    /// Only whitelisted peers may send scan requests
    pub scan_requests_whitelist_only: bool,
    /// Only whitelisted peers may connect
    pub connections_whitelist_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdvertisingConfig {
    /// Service UUIDs carried in the advertising data
    pub service_uuids: Vec<Uuid>,
    pub scan_filter: ScanFilter,
}

/// Server-level connection events
pub trait ServerCallbacks: Send + Sync {
    fn on_connect(&self);
    fn on_disconnect(&self);
}

/// Security events raised while a central pairs with us
pub trait SecurityCallbacks: Send + Sync {
    /// Numeric comparison. Returning false rejects the value.
    fn on_confirm_pin(&self, pin: u32) -> bool;
    /// The stack needs a passkey from this device.
    fn on_passkey_request(&self) -> u32;
    /// The stack generated a passkey for this device to display.
    fn on_passkey_notify(&self, passkey: u32);
    /// A peer asked for security. Returning false refuses it.
    fn on_security_request(&self) -> bool;
    fn on_authentication_complete(&self, outcome: AuthOutcome);
}

/// Read access to the controller's whitelist of bonded peers
pub trait Whitelist: Send + Sync {
    fn whitelist_size(&self) -> StackResult<u16>;
}

/// Configuration API of the BLE substrate
pub trait BleStack {
    /// Bring up the radio and set the advertised device name.
    fn init(&mut self, device_name: &str) -> StackResult<()>;

    /// Link security required for GATT traffic, device-wide.
    fn set_encryption_level(&mut self, level: SecurityLevel) -> StackResult<()>;

    fn set_security_callbacks(&mut self, callbacks: Arc<dyn SecurityCallbacks>) -> StackResult<()>;

    fn create_server(&mut self, callbacks: Arc<dyn ServerCallbacks>) -> StackResult<ServerHandle>;

    fn create_service(&mut self, server: ServerHandle, uuid: Uuid) -> StackResult<ServiceHandle>;

    /// Add a characteristic and its descriptors, returning the value handle.
    fn add_characteristic(
        &mut self,
        service: ServiceHandle,
        characteristic: &Characteristic,
    ) -> StackResult<AttributeHandle>;

    fn start_service(&mut self, service: ServiceHandle) -> StackResult<()>;

    fn set_value(&mut self, handle: AttributeHandle, value: &[u8]) -> StackResult<()>;

    fn value(&self, handle: AttributeHandle) -> StackResult<Vec<u8>>;

    /// Send the current value to subscribed clients, if any.
    fn notify(&mut self, handle: AttributeHandle) -> StackResult<()>;

    fn configure_advertising(
        &mut self,
        server: ServerHandle,
        config: &AdvertisingConfig,
    ) -> StackResult<()>;

    fn start_advertising(&mut self, server: ServerHandle) -> StackResult<()>;

    fn apply_security_policy(&mut self, policy: &SecurityPolicy) -> StackResult<()>;

    fn whitelist(&self) -> Arc<dyn Whitelist>;
}
