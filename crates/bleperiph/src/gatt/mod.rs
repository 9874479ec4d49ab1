//! GATT services and characteristics exposed by the peripheral
//!
//! This module holds the attribute model, the characteristic registry and
//! the service builder. Nothing here talks to a radio; services are handed
//! to a [`BleStack`](crate::platform::BleStack) on activation.

pub mod builder;
pub mod constants;
pub mod registry;
pub mod types;
pub mod value;


pub use builder::{ActiveService, ServiceBuilder};
pub use constants::*;
pub use registry::{CharacteristicRegistry, Service};
pub use types::{Characteristic, CharacteristicId, Descriptor, Permissions, Properties};
pub use value::{dump_characteristic, value_u32};
