//! Stand-ins for the firmware update subsystem and the display

use bleperiph::gatt::{Characteristic, Properties, Service, ServiceBuilder};
use bleperiph::{PairingDisplay, Result, UpdateService, Uuid};
use log::{info, warn};

pub const UPDATE_SERVICE_UUID: Uuid = Uuid::from_u128(0xcb0b9a0b_a84c_4c0d_bdbb_442e3144ee30);
pub const UPDATE_CONTROL_UUID: Uuid = Uuid::from_u128(0x5dc3ee85_9c01_4fc8_97b8_a8c2d9e5b9a1);

/// Update service that exposes one control characteristic and asks for a
/// reboot after a fixed number of polls.
pub struct StagedUpdate {
    polls: u64,
    reboot_after: Option<u64>,
    reboot_due: bool,
}

impl StagedUpdate {
    pub fn new(reboot_after: Option<u64>) -> Self {
        Self {
            polls: 0,
            reboot_after,
            reboot_due: false,
        }
    }

    pub fn reboot_due(&self) -> bool {
        self.reboot_due
    }
}

impl UpdateService for StagedUpdate {
    fn build_update_service(&mut self, builder: &mut ServiceBuilder) -> Result<Service> {
        let mut service = Service::new(UPDATE_SERVICE_UUID);
        builder.registry_mut().register_secure(
            &mut service,
            Characteristic::new(
                UPDATE_CONTROL_UUID,
                Properties::READ | Properties::WRITE | Properties::NOTIFY,
            ),
            "Firmware update control",
        )?;
        Ok(service)
    }

    fn check_pending_reboot(&mut self) {
        self.polls += 1;
        if !self.reboot_due && self.reboot_after == Some(self.polls) {
            warn!("Staged update ready, reboot pending");
            self.reboot_due = true;
        }
    }
}

/// Writes pairing prompts to the log.
pub struct LogDisplay;

impl PairingDisplay for LogDisplay {
    fn show_pairing_passkey(&self, passkey: u32) {
        info!("PAIRING CODE: {:06}", passkey);
    }

    fn restore_idle_display(&self) {
        info!("Display idle");
    }
}
