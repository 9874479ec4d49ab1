//! Constants for the Security Manager Protocol

// IO Capability values
pub const SMP_IO_CAPABILITY_DISPLAY_ONLY: u8 = 0x00;
pub const SMP_IO_CAPABILITY_DISPLAY_YES_NO: u8 = 0x01;
pub const SMP_IO_CAPABILITY_KEYBOARD_ONLY: u8 = 0x02;
pub const SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT: u8 = 0x03;
pub const SMP_IO_CAPABILITY_KEYBOARD_DISPLAY: u8 = 0x04;

// Authentication Requirements bit masks
pub const SMP_AUTH_REQ_BONDING: u8 = 0x01;
pub const SMP_AUTH_REQ_MITM: u8 = 0x04;
pub const SMP_AUTH_REQ_SC: u8 = 0x08;

// Pairing Failed reason codes
pub const SMP_REASON_PASSKEY_ENTRY_FAILED: u8 = 0x01;
pub const SMP_REASON_OOB_NOT_AVAILABLE: u8 = 0x02;
pub const SMP_REASON_AUTHENTICATION_REQUIREMENTS: u8 = 0x03;
pub const SMP_REASON_CONFIRM_VALUE_FAILED: u8 = 0x04;
pub const SMP_REASON_PAIRING_NOT_SUPPORTED: u8 = 0x05;
pub const SMP_REASON_ENCRYPTION_KEY_SIZE: u8 = 0x06;
pub const SMP_REASON_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const SMP_REASON_UNSPECIFIED_REASON: u8 = 0x08;
pub const SMP_REASON_REPEATED_ATTEMPTS: u8 = 0x09;
pub const SMP_REASON_INVALID_PARAMETERS: u8 = 0x0A;
pub const SMP_REASON_DHKEY_CHECK_FAILED: u8 = 0x0B;
pub const SMP_REASON_NUMERIC_COMPARISON_FAILED: u8 = 0x0C;
pub const SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS: u8 = 0x0D;
pub const SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED: u8 = 0x0E;

// SMP key distribution bit masks
pub const SMP_KEY_DIST_ENC_KEY: u8 = 0x01;
pub const SMP_KEY_DIST_ID_KEY: u8 = 0x02;
pub const SMP_KEY_DIST_SIGN_KEY: u8 = 0x04;

// SMP encryption key size limits
pub const SMP_MIN_ENCRYPTION_KEY_SIZE: u8 = 7;
pub const SMP_MAX_ENCRYPTION_KEY_SIZE: u8 = 16;

/// Six decimal digits.
pub const SMP_PASSKEY_MAX: u32 = 999_999;

/// Answer to a passkey request. Never used with a display-only capability.
pub const PLACEHOLDER_PASSKEY: u32 = 123_511;
