//! Interfaces to the subsystems the peripheral drives but does not own

use crate::error::Result;
use crate::gatt::{Service, ServiceBuilder};

/// The firmware update subsystem.
///
/// Its transfer protocol is opaque here; the peripheral only needs the
/// composed service (for its UUID and activation) and a periodic poll.
pub trait UpdateService {
    /// Compose the update service using the peripheral's registry. The
    /// returned service must not be activated yet.
    fn build_update_service(&mut self, builder: &mut ServiceBuilder) -> Result<Service>;

    /// Reboot into a staged update if one is due.
    fn check_pending_reboot(&mut self);
}

/// The display that shows a pairing passkey to the user.
///
/// Called from the substrate's event context; implementations must return
/// promptly.
pub trait PairingDisplay: Send + Sync {
    fn show_pairing_passkey(&self, passkey: u32);

    /// Undo whatever was shown during pairing.
    fn restore_idle_display(&self);
}
