//! Common types for GATT attributes
//!
//! Characteristics and descriptors are plain value holders. They carry no
//! link to the substrate; the builder registers them and keeps the handles.

use super::constants::*;
use crate::error::{PeripheralError, Result};
use crate::smp::SecurityLevel;
use crate::uuid::Uuid;
use bitflags::bitflags;

bitflags! {
    /// Characteristic properties as declared to the client.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Properties: u8 {
        const BROADCAST = GATT_PROP_BROADCAST;
        const READ = GATT_PROP_READ;
        const WRITE_WITHOUT_RESPONSE = GATT_PROP_WRITE_WITHOUT_RESPONSE;
        const WRITE = GATT_PROP_WRITE;
        const NOTIFY = GATT_PROP_NOTIFY;
        const INDICATE = GATT_PROP_INDICATE;
    }
}

bitflags! {
    /// Attribute access permissions enforced by the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u16 {
        const READ = GATT_PERM_READ;
        const WRITE = GATT_PERM_WRITE;
        const READ_ENCRYPTED = GATT_PERM_READ_ENCRYPTED;
        const WRITE_ENCRYPTED = GATT_PERM_WRITE_ENCRYPTED;
        const READ_AUTHENTICATED = GATT_PERM_READ_AUTHENTICATED;
        const WRITE_AUTHENTICATED = GATT_PERM_WRITE_AUTHENTICATED;
    }
}

impl Permissions {
    /// Read and write both require an encrypted link.
    pub const ENCRYPTED: Self = Self::READ_ENCRYPTED.union(Self::WRITE_ENCRYPTED);

    pub fn can_read(&self) -> bool {
        self.intersects(Self::READ | Self::READ_ENCRYPTED | Self::READ_AUTHENTICATED)
    }

    pub fn can_write(&self) -> bool {
        self.intersects(Self::WRITE | Self::WRITE_ENCRYPTED | Self::WRITE_AUTHENTICATED)
    }

    /// Link security needed to read.
    pub fn read_security_level(&self) -> SecurityLevel {
        if self.contains(Self::READ_AUTHENTICATED) {
            SecurityLevel::EncryptionWithAuthentication
        } else if self.contains(Self::READ_ENCRYPTED) {
            SecurityLevel::EncryptionOnly
        } else {
            SecurityLevel::None
        }
    }

    /// Link security needed to write.
    pub fn write_security_level(&self) -> SecurityLevel {
        if self.contains(Self::WRITE_AUTHENTICATED) {
            SecurityLevel::EncryptionWithAuthentication
        } else if self.contains(Self::WRITE_ENCRYPTED) {
            SecurityLevel::EncryptionOnly
        } else {
            SecurityLevel::None
        }
    }
}

/// Stable index of a characteristic in the builder's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicId(pub(crate) usize);

/// A characteristic descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub permissions: Permissions,
    value: Vec<u8>,
    max_len: usize,
}

impl Descriptor {
    /// Allocate a descriptor able to hold `max_len` bytes.
    ///
    /// Storage is reserved up front so allocation failure surfaces here,
    /// during bring-up, instead of on a later write.
    pub fn try_with_capacity(uuid: Uuid, max_len: usize) -> Result<Self> {
        let mut value = Vec::new();
        value
            .try_reserve_exact(max_len)
            .map_err(|source| PeripheralError::DescriptorAllocation { uuid, source })?;

        Ok(Self {
            uuid,
            permissions: Permissions::READ,
            value,
            max_len,
        })
    }

    /// Characteristic User Description (0x2901) sized for `text` plus a terminator.
    pub fn user_description(text: &str) -> Result<Self> {
        let uuid = Uuid::from_u16(CHAR_USER_DESC_UUID);
        let mut desc = Self::try_with_capacity(uuid, text.len() + 1)?;
        desc.set_value(text.as_bytes())?;
        Ok(desc)
    }

    /// Client Characteristic Configuration (0x2902), notifications off.
    pub fn client_configuration() -> Result<Self> {
        let mut desc = Self::try_with_capacity(Uuid::from_u16(CLIENT_CHAR_CONFIG_UUID), 2)?;
        desc.permissions = Permissions::READ | Permissions::WRITE;
        desc.set_value(&[0, 0])?;
        Ok(desc)
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn set_value(&mut self, value: &[u8]) -> Result<()> {
        if value.len() > self.max_len {
            return Err(PeripheralError::InvalidParameter(format!(
                "descriptor {} holds at most {} bytes, got {}",
                self.uuid,
                self.max_len,
                value.len()
            )));
        }
        self.value.clear();
        self.value.extend_from_slice(value);
        Ok(())
    }
}

/// A GATT characteristic with its optional descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: Properties,
    pub permissions: Permissions,
    pub value: Vec<u8>,
    /// User description (0x2901)
    pub description: Option<Descriptor>,
    /// Client configuration (0x2902), present when notifications are supported
    pub client_config: Option<Descriptor>,
}

impl Characteristic {
    /// A characteristic whose permissions mirror its read/write properties.
    pub fn new(uuid: impl Into<Uuid>, properties: Properties) -> Self {
        let mut permissions = Permissions::empty();
        if properties.contains(Properties::READ) {
            permissions |= Permissions::READ;
        }
        if properties.intersects(Properties::WRITE | Properties::WRITE_WITHOUT_RESPONSE) {
            permissions |= Permissions::WRITE;
        }

        Self {
            uuid: uuid.into(),
            properties,
            permissions,
            value: Vec::new(),
            description: None,
            client_config: None,
        }
    }

    /// Read-only characteristic holding a UTF-8 string.
    pub fn read_only_string(uuid: impl Into<Uuid>, value: &str) -> Self {
        Self::new(uuid, Properties::READ).with_value(value.as_bytes())
    }

    pub fn with_value(mut self, value: &[u8]) -> Self {
        self.value = value.to_vec();
        self
    }

    pub fn can_notify(&self) -> bool {
        self.properties.intersects(Properties::NOTIFY | Properties::INDICATE)
    }

    /// Attach a Client Characteristic Configuration descriptor.
    pub fn add_client_configuration(&mut self) -> Result<()> {
        if !self.can_notify() {
            return Err(PeripheralError::InvalidParameter(format!(
                "characteristic {} does not support notifications or indications",
                self.uuid
            )));
        }
        self.client_config = Some(Descriptor::client_configuration()?);
        Ok(())
    }
}
