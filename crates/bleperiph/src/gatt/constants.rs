//! GATT constants: SIG-assigned numbers and attribute permission bits

// Attribute permission bits
pub const GATT_PERM_READ: u16 = 0x0001;
pub const GATT_PERM_WRITE: u16 = 0x0002;
pub const GATT_PERM_READ_ENCRYPTED: u16 = 0x0004;
pub const GATT_PERM_WRITE_ENCRYPTED: u16 = 0x0008;
pub const GATT_PERM_READ_AUTHENTICATED: u16 = 0x0010;
pub const GATT_PERM_WRITE_AUTHENTICATED: u16 = 0x0020;

// Characteristic property bits (carried in the declaration)
pub const GATT_PROP_BROADCAST: u8 = 0x01;
pub const GATT_PROP_READ: u8 = 0x02;
pub const GATT_PROP_WRITE_WITHOUT_RESPONSE: u8 = 0x04;
pub const GATT_PROP_WRITE: u8 = 0x08;
pub const GATT_PROP_NOTIFY: u8 = 0x10;
pub const GATT_PROP_INDICATE: u8 = 0x20;

// Services
pub const DEVICE_INFORMATION_SERVICE_UUID: u16 = 0x180A;
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;

// Device Information characteristics
pub const HARDWARE_REVISION_UUID: u16 = 0x2A27;
pub const SOFTWARE_REVISION_UUID: u16 = 0x2A28;
pub const MANUFACTURER_NAME_UUID: u16 = 0x2A29;

// Battery characteristics
pub const BATTERY_LEVEL_UUID: u16 = 0x2A19;

// Descriptors
pub const CHAR_USER_DESC_UUID: u16 = 0x2901;
pub const CLIENT_CHAR_CONFIG_UUID: u16 = 0x2902;

// Client Characteristic Configuration bits
pub const CCCD_NOTIFY: u16 = 0x0001;

/// Hardware revision reported by the Device Information service.
pub const HARDWARE_VERSION: &str = "1.0";

/// Description attached to the battery level characteristic.
pub const BATTERY_LEVEL_DESCRIPTION: &str = "Percentage 0 - 100";
