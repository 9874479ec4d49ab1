//! Service builder
//!
//! Services are built in two phases. `compose_*` fills the registry and
//! returns an unstarted [`Service`]; [`ServiceBuilder::activate`] registers a
//! group of services with the substrate and only then starts them, so no
//! service goes live while a sibling is still missing.

use super::constants::*;
use super::registry::{CharacteristicRegistry, Service};
use super::types::{Characteristic, CharacteristicId, Properties};
use super::value::{dump_characteristic, value_u32};
use crate::error::{PeripheralError, Result};
use crate::platform::{BleStack, ServerHandle, ServiceHandle};
use crate::uuid::Uuid;
use log::{debug, info};

/// A service registered with the substrate and started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveService {
    uuid: Uuid,
    handle: ServiceHandle,
}

impl ActiveService {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn handle(&self) -> ServiceHandle {
        self.handle
    }
}

/// Owns the characteristic arena and the handles needed for value updates.
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    registry: CharacteristicRegistry,
    battery_level: Option<CharacteristicId>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &CharacteristicRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CharacteristicRegistry {
        &mut self.registry
    }

    /// Device Information service: software revision, manufacturer name and
    /// hardware revision, all plain read-only strings.
    pub fn compose_device_info(&mut self, vendor_name: &str, firmware_version: &str) -> Service {
        let mut service = Service::new(DEVICE_INFORMATION_SERVICE_UUID);

        for (uuid, value) in [
            (SOFTWARE_REVISION_UUID, firmware_version),
            (MANUFACTURER_NAME_UUID, vendor_name),
            (HARDWARE_REVISION_UUID, HARDWARE_VERSION),
        ] {
            self.registry
                .add_characteristic(&mut service, Characteristic::read_only_string(uuid, value));
        }

        service
    }

    /// Register every service with the substrate, then start them all.
    pub fn activate<S: BleStack + ?Sized>(
        &mut self,
        stack: &mut S,
        server: ServerHandle,
        services: Vec<Service>,
    ) -> Result<Vec<ActiveService>> {
        let mut registered = Vec::with_capacity(services.len());

        for service in &services {
            let handle = stack.create_service(server, service.uuid())?;
            for &id in service.characteristics() {
                let value_handle = stack.add_characteristic(handle, self.registry.get(id)?)?;
                self.registry.set_handle(id, value_handle)?;
            }
            debug!(
                "Registered service {} with {} characteristics",
                service.uuid(),
                service.characteristics().len()
            );
            registered.push(ActiveService {
                uuid: service.uuid(),
                handle,
            });
        }

        for service in &registered {
            stack.start_service(service.handle)?;
            info!("Started service {}", service.uuid);
        }

        Ok(registered)
    }

    /// Battery service with one encrypted, notifiable level characteristic.
    /// Started immediately; it does not depend on sibling services.
    pub fn build_battery_service<S: BleStack + ?Sized>(
        &mut self,
        stack: &mut S,
        server: ServerHandle,
    ) -> Result<ActiveService> {
        if self.battery_level.is_some() {
            return Err(PeripheralError::InvalidParameter(
                "battery service already built".into(),
            ));
        }

        let mut service = Service::new(BATTERY_SERVICE_UUID);
        let mut level =
            Characteristic::new(BATTERY_LEVEL_UUID, Properties::READ | Properties::NOTIFY)
                .with_value(&[0]);
        level.add_client_configuration()?;
        let id = self
            .registry
            .register_secure(&mut service, level, BATTERY_LEVEL_DESCRIPTION)?;

        let mut active = self.activate(stack, server, vec![service])?;
        self.battery_level = Some(id);
        active.pop().ok_or_else(|| {
            PeripheralError::InvalidParameter("battery service not activated".into())
        })
    }

    pub fn has_battery_service(&self) -> bool {
        self.battery_level.is_some()
    }

    /// Store `percent` as the battery level and notify subscribers once.
    /// Values above 100 are stored unchanged.
    pub fn update_battery_level<S: BleStack + ?Sized>(
        &mut self,
        stack: &mut S,
        percent: u8,
    ) -> Result<()> {
        let id = self.battery_level.ok_or(PeripheralError::NoBatteryService)?;
        let handle = self
            .registry
            .handle(id)
            .ok_or(PeripheralError::CharacteristicNotFound(id))?;

        stack.set_value(handle, &[percent])?;
        self.registry.set_value(id, &[percent])?;
        stack.notify(handle)?;
        debug!("Battery level {}%", percent);
        Ok(())
    }

    /// Current value of a characteristic as held by the substrate.
    pub fn read_value<S: BleStack + ?Sized>(
        &mut self,
        stack: &S,
        id: CharacteristicId,
    ) -> Result<Vec<u8>> {
        let value = match self.registry.handle(id) {
            Some(handle) => stack.value(handle)?,
            None => self.registry.get(id)?.value.clone(),
        };
        dump_characteristic(&value);
        self.registry.set_value(id, &value)?;
        Ok(value)
    }

    /// Current value decoded as a little-endian `u32`, or `default`.
    pub fn read_u32<S: BleStack + ?Sized>(
        &mut self,
        stack: &S,
        id: CharacteristicId,
        default: u32,
    ) -> Result<u32> {
        Ok(value_u32(&self.read_value(stack, id)?, default))
    }
}
