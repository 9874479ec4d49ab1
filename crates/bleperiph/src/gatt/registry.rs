//! Characteristic registry
//!
//! The registry is an arena of characteristic records. Services refer to
//! their characteristics by [`CharacteristicId`], and value updates are
//! addressed the same way, so nothing needs static storage.

use super::types::{Characteristic, CharacteristicId, Descriptor, Permissions};
use crate::error::{PeripheralError, Result};
use crate::platform::AttributeHandle;
use crate::uuid::Uuid;
use log::debug;

/// A composed service that has not been handed to the substrate yet.
///
/// Characteristics can only be added while a service is in this state; once
/// activated it becomes an [`ActiveService`](super::ActiveService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    uuid: Uuid,
    characteristics: Vec<CharacteristicId>,
}

impl Service {
    pub fn new(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            characteristics: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Characteristics in insertion order.
    pub fn characteristics(&self) -> &[CharacteristicId] {
        &self.characteristics
    }
}

#[derive(Debug)]
struct Slot {
    characteristic: Characteristic,
    handle: Option<AttributeHandle>,
}

/// Arena owning every characteristic of the peripheral.
#[derive(Debug, Default)]
pub struct CharacteristicRegistry {
    slots: Vec<Slot>,
}

impl CharacteristicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a characteristic to `service` with its permissions left as given.
    pub fn add_characteristic(
        &mut self,
        service: &mut Service,
        characteristic: Characteristic,
    ) -> CharacteristicId {
        let id = CharacteristicId(self.slots.len());
        debug!(
            "Adding characteristic {:?} to service {:?}",
            characteristic.uuid, service.uuid
        );
        self.slots.push(Slot {
            characteristic,
            handle: None,
        });
        service.characteristics.push(id);
        id
    }

    /// Add a characteristic that requires an encrypted link for both read
    /// and write, with a user description attached.
    ///
    /// Any permissions already set on `characteristic` are replaced. The
    /// description descriptor gets the same policy.
    pub fn register_secure(
        &mut self,
        service: &mut Service,
        mut characteristic: Characteristic,
        description: &str,
    ) -> Result<CharacteristicId> {
        if description.is_empty() {
            return Err(PeripheralError::InvalidParameter(format!(
                "characteristic {} needs a non-empty description",
                characteristic.uuid
            )));
        }

        characteristic.permissions = Permissions::ENCRYPTED;

        let mut desc = Descriptor::user_description(description)?;
        desc.permissions = Permissions::ENCRYPTED;
        characteristic.description = Some(desc);

        Ok(self.add_characteristic(service, characteristic))
    }

    pub fn get(&self, id: CharacteristicId) -> Result<&Characteristic> {
        self.slots
            .get(id.0)
            .map(|slot| &slot.characteristic)
            .ok_or(PeripheralError::CharacteristicNotFound(id))
    }

    pub fn get_mut(&mut self, id: CharacteristicId) -> Result<&mut Characteristic> {
        self.slots
            .get_mut(id.0)
            .map(|slot| &mut slot.characteristic)
            .ok_or(PeripheralError::CharacteristicNotFound(id))
    }

    /// Replace the cached value of a characteristic.
    pub fn set_value(&mut self, id: CharacteristicId, value: &[u8]) -> Result<()> {
        let characteristic = self.get_mut(id)?;
        characteristic.value.clear();
        characteristic.value.extend_from_slice(value);
        Ok(())
    }

    /// Substrate handle of the characteristic value, once registered.
    pub fn handle(&self, id: CharacteristicId) -> Option<AttributeHandle> {
        self.slots.get(id.0).and_then(|slot| slot.handle)
    }

    pub(crate) fn set_handle(
        &mut self,
        id: CharacteristicId,
        handle: AttributeHandle,
    ) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(PeripheralError::CharacteristicNotFound(id))?;
        if slot.handle.is_some() {
            return Err(PeripheralError::AlreadyRegistered(id));
        }
        slot.handle = Some(handle);
        Ok(())
    }

    /// Find the first characteristic with the given UUID.
    pub fn find(&self, uuid: impl Into<Uuid>) -> Option<CharacteristicId> {
        let uuid = uuid.into();
        self.slots
            .iter()
            .position(|slot| slot.characteristic.uuid == uuid)
            .map(CharacteristicId)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
