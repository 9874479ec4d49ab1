//! Security Manager (SMP) side of the peripheral
//!
//! This module holds the pairing policy handed to the substrate and the
//! state machine answering the substrate's security callbacks:
//! - capability, authentication requirements and key distribution
//! - passkey display and authentication completion
//! - decoding of pairing failure reasons

mod constants;
mod pairing;
mod types;

#[cfg(test)]
mod tests;

pub use self::constants::{
    PLACEHOLDER_PASSKEY, SMP_MAX_ENCRYPTION_KEY_SIZE, SMP_MIN_ENCRYPTION_KEY_SIZE, SMP_PASSKEY_MAX,
};
pub use self::pairing::*;
pub use self::types::*;
