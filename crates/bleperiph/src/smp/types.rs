//! Security parameters handed to the substrate and pairing outcomes
use super::constants::*;
use std::fmt;
use thiserror::Error;

/// Security level of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    /// Plain link
    #[default]
    None,
    /// Encrypted with an unauthenticated key
    EncryptionOnly,
    /// Encrypted with a key from an authenticated pairing
    EncryptionWithAuthentication,
    /// Authenticated LE Secure Connections key
    SecureConnections,
}

impl SecurityLevel {
    pub fn is_encrypted(&self) -> bool {
        *self >= SecurityLevel::EncryptionOnly
    }

    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::EncryptionWithAuthentication
    }
}

/// Input/output capability advertised in the pairing exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

impl IoCapability {
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            SMP_IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            SMP_IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            SMP_IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }

    /// Whether this side shows a passkey for the peer to type in.
    pub fn displays_passkey(&self) -> bool {
        matches!(
            self,
            IoCapability::DisplayOnly | IoCapability::DisplayYesNo | IoCapability::KeyboardDisplay
        )
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IoCapability::DisplayOnly => "DisplayOnly",
            IoCapability::DisplayYesNo => "DisplayYesNo",
            IoCapability::KeyboardOnly => "KeyboardOnly",
            IoCapability::NoInputNoOutput => "NoInputNoOutput",
            IoCapability::KeyboardDisplay => "KeyboardDisplay",
        };
        write!(f, "{} (0x{:02x})", name, self.to_u8())
    }
}

/// AuthReq flags of the pairing exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthRequirements {
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
}

impl AuthRequirements {
    pub fn new(bonding: bool, mitm: bool, secure_connections: bool) -> Self {
        Self {
            bonding,
            mitm,
            secure_connections,
        }
    }

    /// Secure Connections with bonding.
    pub fn secure_bonding() -> Self {
        Self::new(true, false, true)
    }

    pub fn to_u8(&self) -> u8 {
        let mut value = 0;
        if self.bonding {
            value |= SMP_AUTH_REQ_BONDING;
        }
        if self.mitm {
            value |= SMP_AUTH_REQ_MITM;
        }
        if self.secure_connections {
            value |= SMP_AUTH_REQ_SC;
        }
        value
    }
}

/// Keys exchanged and stored during bonding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDistribution {
    /// LTK with its EDIV and Rand
    pub encryption_key: bool,
    /// IRK and identity address
    pub identity_key: bool,
    /// CSRK
    pub signing_key: bool,
}

impl KeyDistribution {
    pub fn new(encryption_key: bool, identity_key: bool, signing_key: bool) -> Self {
        Self {
            encryption_key,
            identity_key,
            signing_key,
        }
    }

    /// Encryption and identity keys, enough to reconnect to a bonded peer.
    pub fn encryption_and_identity() -> Self {
        Self::new(true, true, false)
    }

    pub fn to_u8(&self) -> u8 {
        let mut value = 0;
        if self.encryption_key {
            value |= SMP_KEY_DIST_ENC_KEY;
        }
        if self.identity_key {
            value |= SMP_KEY_DIST_ID_KEY;
        }
        if self.signing_key {
            value |= SMP_KEY_DIST_SIGN_KEY;
        }
        value
    }
}

/// Pairing parameters handed to the substrate before the first pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityPolicy {
    pub io_capability: IoCapability,
    pub auth_req: AuthRequirements,
    pub max_key_size: u8,
    pub initiator_keys: KeyDistribution,
    pub responder_keys: KeyDistribution,
}

impl SecurityPolicy {
    /// Output-only passkey display, Secure Connections with bonding.
    pub fn passkey_display() -> Self {
        Self {
            io_capability: IoCapability::DisplayOnly,
            auth_req: AuthRequirements::secure_bonding(),
            max_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            initiator_keys: KeyDistribution::encryption_and_identity(),
            responder_keys: KeyDistribution::encryption_and_identity(),
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::passkey_display()
    }
}

/// Reason reported by the platform for a failed pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PairingFailure {
    #[error("Passkey entry failed")]
    PasskeyEntryFailed,

    #[error("OOB data not available")]
    OobNotAvailable,

    #[error("Authentication requirements not met")]
    AuthenticationRequirements,

    #[error("Confirm value failed")]
    ConfirmValueFailed,

    #[error("Pairing not supported")]
    PairingNotSupported,

    #[error("Encryption key size issue")]
    EncryptionKeySize,

    #[error("Command not supported")]
    CommandNotSupported,

    #[error("Unspecified reason")]
    UnspecifiedReason,

    #[error("Too many pairing attempts")]
    RepeatedAttempts,

    #[error("Invalid parameters")]
    InvalidParameters,

    #[error("DHKey check failed")]
    DhKeyCheckFailed,

    #[error("Numeric comparison failed")]
    NumericComparisonFailed,

    #[error("BR/EDR pairing in progress")]
    BrEdrPairingInProgress,

    #[error("Cross-transport key not allowed")]
    CrossTransportKeyNotAllowed,

    #[error("Platform reason 0x{0:02x}")]
    Other(u8),
}

impl PairingFailure {
    pub fn from_reason(reason: u8) -> Self {
        match reason {
            SMP_REASON_PASSKEY_ENTRY_FAILED => PairingFailure::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => PairingFailure::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => PairingFailure::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => PairingFailure::ConfirmValueFailed,
            SMP_REASON_PAIRING_NOT_SUPPORTED => PairingFailure::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => PairingFailure::EncryptionKeySize,
            SMP_REASON_COMMAND_NOT_SUPPORTED => PairingFailure::CommandNotSupported,
            SMP_REASON_UNSPECIFIED_REASON => PairingFailure::UnspecifiedReason,
            SMP_REASON_REPEATED_ATTEMPTS => PairingFailure::RepeatedAttempts,
            SMP_REASON_INVALID_PARAMETERS => PairingFailure::InvalidParameters,
            SMP_REASON_DHKEY_CHECK_FAILED => PairingFailure::DhKeyCheckFailed,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => PairingFailure::NumericComparisonFailed,
            SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS => PairingFailure::BrEdrPairingInProgress,
            SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED => {
                PairingFailure::CrossTransportKeyNotAllowed
            }
            other => PairingFailure::Other(other),
        }
    }

    pub fn reason(&self) -> u8 {
        match self {
            PairingFailure::PasskeyEntryFailed => SMP_REASON_PASSKEY_ENTRY_FAILED,
            PairingFailure::OobNotAvailable => SMP_REASON_OOB_NOT_AVAILABLE,
            PairingFailure::AuthenticationRequirements => SMP_REASON_AUTHENTICATION_REQUIREMENTS,
            PairingFailure::ConfirmValueFailed => SMP_REASON_CONFIRM_VALUE_FAILED,
            PairingFailure::PairingNotSupported => SMP_REASON_PAIRING_NOT_SUPPORTED,
            PairingFailure::EncryptionKeySize => SMP_REASON_ENCRYPTION_KEY_SIZE,
            PairingFailure::CommandNotSupported => SMP_REASON_COMMAND_NOT_SUPPORTED,
            PairingFailure::UnspecifiedReason => SMP_REASON_UNSPECIFIED_REASON,
            PairingFailure::RepeatedAttempts => SMP_REASON_REPEATED_ATTEMPTS,
            PairingFailure::InvalidParameters => SMP_REASON_INVALID_PARAMETERS,
            PairingFailure::DhKeyCheckFailed => SMP_REASON_DHKEY_CHECK_FAILED,
            PairingFailure::NumericComparisonFailed => SMP_REASON_NUMERIC_COMPARISON_FAILED,
            PairingFailure::BrEdrPairingInProgress => SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS,
            PairingFailure::CrossTransportKeyNotAllowed => {
                SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED
            }
            PairingFailure::Other(reason) => *reason,
        }
    }
}

/// Result of an authentication attempt as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
    Success,
    Failure(PairingFailure),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }
}
