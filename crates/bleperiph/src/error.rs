//! Error types for the bleperiph library
//!
//! Substrate failures are wrapped so bring-up can abort with a single error
//! type; pairing failures are not errors here, they are logged outcomes.

use crate::gatt::CharacteristicId;
use crate::platform::StackError;
use crate::uuid::Uuid;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors raised while building or running the peripheral
#[derive(Error, Debug)]
pub enum PeripheralError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to allocate descriptor {uuid}")]
    DescriptorAllocation {
        uuid: Uuid,
        #[source]
        source: TryReserveError,
    },

    #[error("Characteristic not found: {0:?}")]
    CharacteristicNotFound(CharacteristicId),

    #[error("Characteristic {0:?} is already registered")]
    AlreadyRegistered(CharacteristicId),

    #[error("No battery service")]
    NoBatteryService,

    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for peripheral operations
pub type Result<T> = std::result::Result<T, PeripheralError>;
