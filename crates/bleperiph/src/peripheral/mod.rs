//! Peripheral bring-up and the host loop hook
//!
//! [`Peripheral::bring_up`] runs the start-up sequence against a
//! [`BleStack`]: radio and link security, callbacks, services, security
//! policy, advertising. The host then calls [`Peripheral::maintain`] once per
//! loop iteration.

pub mod config;

#[cfg(test)]
mod tests;

pub use config::PeripheralConfig;

use crate::collaborators::{PairingDisplay, UpdateService};
use crate::connection::ConnectionTracker;
use crate::error::Result;
use crate::gatt::{ActiveService, CharacteristicId, ServiceBuilder};
use crate::platform::{AdvertisingConfig, BleStack, ScanFilter, ServerHandle};
use crate::smp::{PairingAgent, SecurityLevel, SecurityPolicy};
use log::info;
use std::sync::Arc;

/// A brought-up peripheral, advertising and ready for connections.
pub struct Peripheral<S: BleStack, U: UpdateService> {
    stack: S,
    update: U,
    server: ServerHandle,
    builder: ServiceBuilder,
    services: Vec<ActiveService>,
    connection: Arc<ConnectionTracker>,
    pairing: Arc<PairingAgent>,
    advertising: AdvertisingConfig,
}

impl<S: BleStack, U: UpdateService> Peripheral<S, U> {
    /// Bring the peripheral up. Any failure aborts before advertising.
    pub fn bring_up(
        config: &PeripheralConfig,
        mut stack: S,
        mut update: U,
        display: Arc<dyn PairingDisplay>,
    ) -> Result<Self> {
        config.validate()?;
        info!("Bringing up BLE peripheral '{}'", config.device_name);

        stack.init(&config.device_name)?;
        stack.set_encryption_level(SecurityLevel::EncryptionOnly)?;

        let policy = SecurityPolicy::passkey_display();
        let pairing = Arc::new(PairingAgent::new(
            policy.io_capability,
            display,
            stack.whitelist(),
        ));
        stack.set_security_callbacks(pairing.clone())?;

        let connection = Arc::new(ConnectionTracker::new());
        let server = stack.create_server(connection.clone())?;

        let mut builder = ServiceBuilder::new();
        let device_info =
            builder.compose_device_info(&config.vendor_name, &config.firmware_version);
        let update_service = update.build_update_service(&mut builder)?;

        let advertising = AdvertisingConfig {
            service_uuids: vec![update_service.uuid()],
            // TODO: set connections_whitelist_only once a bonded peer can be
            // re-admitted after the controller whitelist is cleared.
            scan_filter: ScanFilter {
                scan_requests_whitelist_only: false,
                connections_whitelist_only: false,
            },
        };

        let services = builder.activate(&mut stack, server, vec![device_info, update_service])?;

        let mut peripheral = Self {
            stack,
            update,
            server,
            builder,
            services,
            connection,
            pairing,
            advertising,
        };
        if config.battery {
            peripheral.add_battery_service()?;
        }

        peripheral
            .stack
            .configure_advertising(server, &peripheral.advertising)?;
        peripheral.stack.apply_security_policy(&policy)?;
        peripheral.stack.start_advertising(server)?;
        info!("Advertising as '{}'", config.device_name);

        Ok(peripheral)
    }

    /// Per-iteration hook for the host loop.
    pub fn maintain(&mut self) {
        self.update.check_pending_reboot();
    }

    pub fn add_battery_service(&mut self) -> Result<()> {
        let service = self
            .builder
            .build_battery_service(&mut self.stack, self.server)?;
        self.services.push(service);
        Ok(())
    }

    pub fn update_battery_level(&mut self, percent: u8) -> Result<()> {
        self.builder.update_battery_level(&mut self.stack, percent)
    }

    pub fn read_value(&mut self, id: CharacteristicId) -> Result<Vec<u8>> {
        self.builder.read_value(&self.stack, id)
    }

    pub fn read_u32(&mut self, id: CharacteristicId, default: u32) -> Result<u32> {
        self.builder.read_u32(&self.stack, id, default)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection(&self) -> Arc<ConnectionTracker> {
        self.connection.clone()
    }

    pub fn pairing(&self) -> &PairingAgent {
        &self.pairing
    }

    pub fn server(&self) -> ServerHandle {
        self.server
    }

    /// Started services, in start order.
    pub fn services(&self) -> &[ActiveService] {
        &self.services
    }

    pub fn advertising(&self) -> &AdvertisingConfig {
        &self.advertising
    }

    pub fn builder(&self) -> &ServiceBuilder {
        &self.builder
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn update_service(&self) -> &U {
        &self.update
    }
}
