//! Errors reported by the BLE substrate
use super::{AttributeHandle, ServerHandle, ServiceHandle};
use thiserror::Error;

// ATT error codes seen by a central
pub const ATT_ERROR_INVALID_HANDLE: u8 = 0x01;
pub const ATT_ERROR_READ_NOT_PERMITTED: u8 = 0x02;
pub const ATT_ERROR_WRITE_NOT_PERMITTED: u8 = 0x03;
pub const ATT_ERROR_INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
pub const ATT_ERROR_ATTRIBUTE_NOT_FOUND: u8 = 0x0A;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;
pub const ATT_ERROR_INSUFFICIENT_ENCRYPTION: u8 = 0x0F;

/// Attribute access error, as a central would receive it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(AttributeHandle),

    #[error("Attribute not found")]
    AttributeNotFound,

    #[error("Read not permitted")]
    ReadNotPermitted,

    #[error("Write not permitted")]
    WriteNotPermitted,

    #[error("Insufficient authentication")]
    InsufficientAuthentication,

    #[error("Insufficient encryption")]
    InsufficientEncryption,

    #[error("Invalid attribute value length")]
    InvalidAttributeValueLength,
}

impl AttError {
    /// ATT error code carried in an Error Response.
    pub fn code(&self) -> u8 {
        match self {
            AttError::InvalidHandle(_) => ATT_ERROR_INVALID_HANDLE,
            AttError::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttError::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttError::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttError::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            AttError::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            AttError::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
        }
    }
}

/// Errors from the substrate's configuration API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("Radio not initialized")]
    NotInitialized,

    #[error("Unknown server: {0:?}")]
    UnknownServer(ServerHandle),

    #[error("Unknown service handle: {0}")]
    UnknownService(ServiceHandle),

    #[error("Service {0} already started")]
    ServiceStarted(ServiceHandle),

    #[error("Attribute table full")]
    OutOfHandles,

    #[error("No central connected")]
    NotConnected,

    #[error("Attribute error: {0}")]
    Att(#[from] AttError),

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Result type for substrate operations
pub type StackResult<T> = Result<T, StackError>;
