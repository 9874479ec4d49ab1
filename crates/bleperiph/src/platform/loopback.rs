//! In-memory substrate
//!
//! `LoopbackStack` keeps an attribute table the way a controller-side GATT
//! server would and records every configuration call. It also plays the
//! central: connect, read and write with the link's security level, and run
//! a passkey pairing against the installed security callbacks. Clones share
//! the same state, so a host can keep one handle after moving another into
//! the peripheral.

use super::{
    AdvertisingConfig, AttError, AttributeHandle, BleStack, PeerAddress, SecurityCallbacks,
    ServerCallbacks, ServerHandle, ServiceHandle, StackError, StackResult, Whitelist,
};
use crate::gatt::{Characteristic, Permissions, CCCD_NOTIFY, CLIENT_CHAR_CONFIG_UUID};
use crate::smp::{
    AuthOutcome, PairingFailure, SecurityLevel, SecurityPolicy, SMP_MAX_ENCRYPTION_KEY_SIZE,
    SMP_MIN_ENCRYPTION_KEY_SIZE, SMP_PASSKEY_MAX,
};
use crate::uuid::Uuid;
use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const ATT_HANDLE_MIN: AttributeHandle = 0x0001;
const PRIMARY_SERVICE_UUID: u16 = 0x2800;
const CHARACTERISTIC_UUID: u16 = 0x2803;

/// A configuration call or link event observed by the loopback stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    Initialized { device_name: String },
    EncryptionLevelSet(SecurityLevel),
    SecurityCallbacksInstalled,
    ServerCreated(ServerHandle),
    ServiceCreated { handle: ServiceHandle, uuid: Uuid },
    ServiceStarted { handle: ServiceHandle, uuid: Uuid },
    AdvertisingConfigured(AdvertisingConfig),
    AdvertisingStarted,
    SecurityPolicyApplied(SecurityPolicy),
    Notified {
        handle: AttributeHandle,
        value: Vec<u8>,
        /// Whether a connected client had notifications enabled
        delivered: bool,
    },
    Connected(PeerAddress),
    Disconnected(PeerAddress),
}

#[derive(Debug, Clone)]
struct Attribute {
    uuid: Uuid,
    permissions: Permissions,
    value: Vec<u8>,
    service: ServiceHandle,
}

#[derive(Debug, Clone)]
struct ServiceRecord {
    uuid: Uuid,
    started: bool,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    peer: PeerAddress,
    security: SecurityLevel,
}

struct Inner {
    device_name: Option<String>,
    encryption_level: SecurityLevel,
    security_callbacks: Option<Arc<dyn SecurityCallbacks>>,
    servers: Vec<Arc<dyn ServerCallbacks>>,
    services: BTreeMap<ServiceHandle, ServiceRecord>,
    attributes: BTreeMap<AttributeHandle, Attribute>,
    /// Characteristic value handle -> its CCCD handle
    client_configs: HashMap<AttributeHandle, AttributeHandle>,
    next_handle: Option<AttributeHandle>,
    advertising: Option<AdvertisingConfig>,
    advertising_started: bool,
    policy: Option<SecurityPolicy>,
    link: Option<Link>,
    events: Vec<StackEvent>,
}

impl Inner {
    fn new() -> Self {
        Self {
            device_name: None,
            encryption_level: SecurityLevel::None,
            security_callbacks: None,
            servers: Vec::new(),
            services: BTreeMap::new(),
            attributes: BTreeMap::new(),
            client_configs: HashMap::new(),
            next_handle: Some(ATT_HANDLE_MIN),
            advertising: None,
            advertising_started: false,
            policy: None,
            link: None,
            events: Vec::new(),
        }
    }

    fn ensure_initialized(&self) -> StackResult<()> {
        match self.device_name {
            Some(_) => Ok(()),
            None => Err(StackError::NotInitialized),
        }
    }

    fn ensure_server(&self, server: ServerHandle) -> StackResult<()> {
        if (server.0 as usize) < self.servers.len() {
            Ok(())
        } else {
            Err(StackError::UnknownServer(server))
        }
    }

    fn allocate(&mut self, attribute: Attribute) -> StackResult<AttributeHandle> {
        let handle = self.next_handle.ok_or(StackError::OutOfHandles)?;
        self.next_handle = handle.checked_add(1);
        self.attributes.insert(handle, attribute);
        Ok(handle)
    }

    fn open_service(&self, service: ServiceHandle) -> StackResult<()> {
        let record = self
            .services
            .get(&service)
            .ok_or(StackError::UnknownService(service))?;
        if record.started {
            return Err(StackError::ServiceStarted(service));
        }
        Ok(())
    }

    /// An attribute a central can see: its service has been started.
    fn visible(&self, handle: AttributeHandle) -> Result<&Attribute, AttError> {
        let attribute = self
            .attributes
            .get(&handle)
            .ok_or(AttError::InvalidHandle(handle))?;
        match self.services.get(&attribute.service) {
            Some(service) if service.started => Ok(attribute),
            _ => Err(AttError::AttributeNotFound),
        }
    }

    fn link(&self) -> StackResult<Link> {
        self.link.ok_or(StackError::NotConnected)
    }

    fn notifications_enabled(&self, handle: AttributeHandle) -> bool {
        self.client_configs
            .get(&handle)
            .and_then(|cccd| self.attributes.get(cccd))
            .map(|cccd| {
                cccd.value.len() == 2
                    && u16::from_le_bytes([cccd.value[0], cccd.value[1]]) & CCCD_NOTIFY != 0
            })
            .unwrap_or(false)
    }
}

fn check_access(
    required: SecurityLevel,
    link: SecurityLevel,
    permitted: bool,
    denied: AttError,
) -> Result<(), AttError> {
    if !permitted {
        return Err(denied);
    }
    if link >= required {
        return Ok(());
    }
    if required.is_authenticated() {
        Err(AttError::InsufficientAuthentication)
    } else {
        Err(AttError::InsufficientEncryption)
    }
}

/// Whitelist of bonded peers kept by the loopback stack
#[derive(Debug, Default)]
pub struct LoopbackWhitelist {
    peers: Mutex<Vec<PeerAddress>>,
}

impl LoopbackWhitelist {
    pub fn add(&self, peer: PeerAddress) {
        let mut peers = self.peers.lock();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.peers.lock().contains(peer)
    }

    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}

impl Whitelist for LoopbackWhitelist {
    fn whitelist_size(&self) -> StackResult<u16> {
        let size = self.peers.lock().len();
        u16::try_from(size)
            .map_err(|_| StackError::Platform(format!("whitelist size {} out of range", size)))
    }
}

#[derive(Clone)]
pub struct LoopbackStack {
    inner: Arc<Mutex<Inner>>,
    whitelist: Arc<LoopbackWhitelist>,
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackStack {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            whitelist: Arc::new(LoopbackWhitelist::default()),
        }
    }

    /// Every configuration call and link event, in order.
    pub fn events(&self) -> Vec<StackEvent> {
        self.inner.lock().events.clone()
    }

    /// Values sent through `notify` for one handle.
    pub fn notifications(&self, handle: AttributeHandle) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                StackEvent::Notified { handle: h, value, .. } if *h == handle => {
                    Some(value.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn device_name(&self) -> Option<String> {
        self.inner.lock().device_name.clone()
    }

    pub fn encryption_level(&self) -> SecurityLevel {
        self.inner.lock().encryption_level
    }

    pub fn advertising(&self) -> Option<AdvertisingConfig> {
        self.inner.lock().advertising.clone()
    }

    pub fn is_advertising(&self) -> bool {
        self.inner.lock().advertising_started
    }

    pub fn security_policy(&self) -> Option<SecurityPolicy> {
        self.inner.lock().policy.clone()
    }

    pub fn whitelist_handle(&self) -> Arc<LoopbackWhitelist> {
        self.whitelist.clone()
    }

    /// Security level of the current link, if a central is connected.
    pub fn link_security(&self) -> Option<SecurityLevel> {
        self.inner.lock().link.map(|link| link.security)
    }

    /// Connect a central. Fails unless advertising, and honors the
    /// connection whitelist filter.
    pub fn connect(&self, peer: PeerAddress) -> StackResult<()> {
        let servers = {
            let mut inner = self.inner.lock();
            if !inner.advertising_started {
                return Err(StackError::Platform("not advertising".into()));
            }
            if inner.link.is_some() {
                return Err(StackError::Platform("a central is already connected".into()));
            }
            let filtered = inner
                .advertising
                .as_ref()
                .map(|adv| adv.scan_filter.connections_whitelist_only)
                .unwrap_or(false);
            if filtered && !self.whitelist.contains(&peer) {
                return Err(StackError::Platform(format!("{} is not whitelisted", peer)));
            }

            inner.link = Some(Link {
                peer,
                security: SecurityLevel::None,
            });
            inner.events.push(StackEvent::Connected(peer));
            inner.servers.clone()
        };

        debug!("Central {} connected", peer);
        for server in servers {
            server.on_connect();
        }
        Ok(())
    }

    pub fn disconnect(&self) -> StackResult<()> {
        let servers = {
            let mut inner = self.inner.lock();
            let link = inner.link()?;
            inner.link = None;
            // Subscriptions do not survive the link.
            let cccds: Vec<AttributeHandle> = inner.client_configs.values().copied().collect();
            for cccd in cccds {
                if let Some(attribute) = inner.attributes.get_mut(&cccd) {
                    attribute.value = vec![0, 0];
                }
            }
            inner.events.push(StackEvent::Disconnected(link.peer));
            inner.servers.clone()
        };

        for server in servers {
            server.on_disconnect();
        }
        Ok(())
    }

    /// Find a characteristic value handle in a started service.
    pub fn discover(
        &self,
        service_uuid: impl Into<Uuid>,
        characteristic_uuid: impl Into<Uuid>,
    ) -> Option<AttributeHandle> {
        let service_uuid = service_uuid.into();
        let characteristic_uuid = characteristic_uuid.into();
        let inner = self.inner.lock();

        inner
            .services
            .iter()
            .filter(|(_, record)| record.started && record.uuid == service_uuid)
            .find_map(|(service_handle, _)| {
                inner
                    .attributes
                    .iter()
                    .filter(|(_, attr)| attr.service == *service_handle)
                    .find(|(handle, attr)| {
                        attr.uuid == characteristic_uuid
                            && inner
                                .attributes
                                .get(&(**handle - 1))
                                .map(|decl| decl.uuid == CHARACTERISTIC_UUID)
                                .unwrap_or(false)
                    })
                    .map(|(handle, _)| *handle)
            })
    }

    /// Find a descriptor belonging to the characteristic at `value_handle`.
    pub fn descriptor(
        &self,
        value_handle: AttributeHandle,
        descriptor_uuid: impl Into<Uuid>,
    ) -> Option<AttributeHandle> {
        let descriptor_uuid = descriptor_uuid.into();
        let inner = self.inner.lock();
        let service = inner.attributes.get(&value_handle)?.service;

        inner
            .attributes
            .range(value_handle.saturating_add(1)..)
            .take_while(|(_, attr)| attr.service == service && attr.uuid != CHARACTERISTIC_UUID)
            .find(|(_, attr)| attr.uuid == descriptor_uuid)
            .map(|(handle, _)| *handle)
    }

    /// Read an attribute as the connected central.
    pub fn read(&self, handle: AttributeHandle) -> StackResult<Vec<u8>> {
        let inner = self.inner.lock();
        let link = inner.link()?;
        let attribute = inner.visible(handle)?;
        let permissions = attribute.permissions;
        check_access(
            permissions.read_security_level(),
            link.security,
            permissions.can_read(),
            AttError::ReadNotPermitted,
        )?;
        Ok(attribute.value.clone())
    }

    /// Write an attribute as the connected central.
    pub fn write(&self, handle: AttributeHandle, value: &[u8]) -> StackResult<()> {
        let mut inner = self.inner.lock();
        let link = inner.link()?;
        let attribute = inner.visible(handle)?;
        let permissions = attribute.permissions;
        check_access(
            permissions.write_security_level(),
            link.security,
            permissions.can_write(),
            AttError::WriteNotPermitted,
        )?;
        if attribute.uuid == CLIENT_CHAR_CONFIG_UUID && value.len() != 2 {
            return Err(AttError::InvalidAttributeValueLength.into());
        }

        if let Some(attribute) = inner.attributes.get_mut(&handle) {
            attribute.value = value.to_vec();
        }
        Ok(())
    }

    fn security_callbacks(&self) -> StackResult<Arc<dyn SecurityCallbacks>> {
        self.inner
            .lock()
            .security_callbacks
            .clone()
            .ok_or_else(|| StackError::Platform("no security callbacks installed".into()))
    }

    /// The central sends a Security Request.
    pub fn request_security(&self) -> StackResult<bool> {
        Ok(self.security_callbacks()?.on_security_request())
    }

    /// The stack asks us to confirm a numeric comparison value.
    pub fn confirm_pin(&self, pin: u32) -> StackResult<bool> {
        Ok(self.security_callbacks()?.on_confirm_pin(pin))
    }

    /// The stack asks us for a passkey.
    pub fn request_passkey(&self) -> StackResult<u32> {
        Ok(self.security_callbacks()?.on_passkey_request())
    }

    /// The stack generated a passkey for us to display.
    pub fn notify_passkey(&self, passkey: u32) -> StackResult<()> {
        self.security_callbacks()?.on_passkey_notify(passkey);
        Ok(())
    }

    /// The stack reports the end of an authentication attempt. The link
    /// security level is left untouched.
    pub fn complete_authentication(&self, outcome: AuthOutcome) -> StackResult<()> {
        self.security_callbacks()?.on_authentication_complete(outcome);
        Ok(())
    }

    /// The stack reports a failed pairing with an SMP reason code.
    pub fn fail_pairing(&self, reason: u8) -> StackResult<()> {
        self.complete_authentication(AuthOutcome::Failure(PairingFailure::from_reason(reason)))
    }

    /// Pair the connected central using the applied policy.
    ///
    /// With a display capability a passkey is generated and shown through
    /// the callbacks; `entry` plays the user typing it on the central.
    /// Bonded peers are added to the whitelist.
    pub fn pair(&self, entry: impl FnOnce(u32) -> u32) -> StackResult<AuthOutcome> {
        let (callbacks, policy, link) = {
            let inner = self.inner.lock();
            let link = inner.link()?;
            let policy = inner
                .policy
                .clone()
                .ok_or_else(|| StackError::Platform("no security policy applied".into()))?;
            let callbacks = inner
                .security_callbacks
                .clone()
                .ok_or_else(|| StackError::Platform("no security callbacks installed".into()))?;
            (callbacks, policy, link)
        };

        let (outcome, security) = if policy.io_capability.displays_passkey() {
            let passkey = rand::thread_rng().gen_range(0..=SMP_PASSKEY_MAX);
            callbacks.on_passkey_notify(passkey);
            if entry(passkey) == passkey {
                let security = if policy.auth_req.secure_connections {
                    SecurityLevel::SecureConnections
                } else {
                    SecurityLevel::EncryptionWithAuthentication
                };
                (AuthOutcome::Success, security)
            } else {
                (
                    AuthOutcome::Failure(PairingFailure::PasskeyEntryFailed),
                    link.security,
                )
            }
        } else {
            (AuthOutcome::Success, SecurityLevel::EncryptionOnly)
        };

        if outcome.is_success() {
            if let Some(link) = self.inner.lock().link.as_mut() {
                link.security = security;
            }
            if policy.auth_req.bonding {
                self.whitelist.add(link.peer);
            }
        }

        info!("Pairing with {} finished: {:?}", link.peer, outcome);
        callbacks.on_authentication_complete(outcome);
        Ok(outcome)
    }
}

impl BleStack for LoopbackStack {
    fn init(&mut self, device_name: &str) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.device_name = Some(device_name.to_string());
        inner.events.push(StackEvent::Initialized {
            device_name: device_name.to_string(),
        });
        Ok(())
    }

    fn set_encryption_level(&mut self, level: SecurityLevel) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_initialized()?;
        inner.encryption_level = level;
        inner.events.push(StackEvent::EncryptionLevelSet(level));
        Ok(())
    }

    fn set_security_callbacks(&mut self, callbacks: Arc<dyn SecurityCallbacks>) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_initialized()?;
        inner.security_callbacks = Some(callbacks);
        inner.events.push(StackEvent::SecurityCallbacksInstalled);
        Ok(())
    }

    fn create_server(&mut self, callbacks: Arc<dyn ServerCallbacks>) -> StackResult<ServerHandle> {
        let mut inner = self.inner.lock();
        inner.ensure_initialized()?;
        let server = u8::try_from(inner.servers.len())
            .map(ServerHandle)
            .map_err(|_| StackError::Platform("too many servers".into()))?;
        inner.servers.push(callbacks);
        inner.events.push(StackEvent::ServerCreated(server));
        Ok(server)
    }

    fn create_service(&mut self, server: ServerHandle, uuid: Uuid) -> StackResult<ServiceHandle> {
        let mut inner = self.inner.lock();
        inner.ensure_server(server)?;

        let handle = inner.next_handle.ok_or(StackError::OutOfHandles)?;
        let declaration = match uuid.as_u16() {
            Some(short) => short.to_le_bytes().to_vec(),
            None => uuid.as_bytes_le().to_vec(),
        };
        inner.allocate(Attribute {
            uuid: Uuid::from_u16(PRIMARY_SERVICE_UUID),
            permissions: Permissions::READ,
            value: declaration,
            service: handle,
        })?;
        inner.services.insert(
            handle,
            ServiceRecord {
                uuid,
                started: false,
            },
        );
        inner.events.push(StackEvent::ServiceCreated { handle, uuid });
        Ok(handle)
    }

    fn add_characteristic(
        &mut self,
        service: ServiceHandle,
        characteristic: &Characteristic,
    ) -> StackResult<AttributeHandle> {
        let mut inner = self.inner.lock();
        inner.open_service(service)?;

        let declaration_handle = inner.allocate(Attribute {
            uuid: Uuid::from_u16(CHARACTERISTIC_UUID),
            permissions: Permissions::READ,
            value: Vec::new(),
            service,
        })?;
        let value_handle = inner.allocate(Attribute {
            uuid: characteristic.uuid,
            permissions: characteristic.permissions,
            value: characteristic.value.clone(),
            service,
        })?;

        let mut declaration = vec![characteristic.properties.bits()];
        declaration.extend_from_slice(&value_handle.to_le_bytes());
        match characteristic.uuid.as_u16() {
            Some(short) => declaration.extend_from_slice(&short.to_le_bytes()),
            None => declaration.extend_from_slice(characteristic.uuid.as_bytes_le()),
        }
        if let Some(attribute) = inner.attributes.get_mut(&declaration_handle) {
            attribute.value = declaration;
        }

        if let Some(desc) = &characteristic.description {
            inner.allocate(Attribute {
                uuid: desc.uuid,
                permissions: desc.permissions,
                value: desc.value().to_vec(),
                service,
            })?;
        }
        if let Some(cccd) = &characteristic.client_config {
            let cccd_handle = inner.allocate(Attribute {
                uuid: cccd.uuid,
                permissions: cccd.permissions,
                value: cccd.value().to_vec(),
                service,
            })?;
            inner.client_configs.insert(value_handle, cccd_handle);
        }

        Ok(value_handle)
    }

    fn start_service(&mut self, service: ServiceHandle) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.open_service(service)?;
        let uuid = match inner.services.get_mut(&service) {
            Some(record) => {
                record.started = true;
                record.uuid
            }
            None => return Err(StackError::UnknownService(service)),
        };
        inner.events.push(StackEvent::ServiceStarted {
            handle: service,
            uuid,
        });
        Ok(())
    }

    fn set_value(&mut self, handle: AttributeHandle, value: &[u8]) -> StackResult<()> {
        let mut inner = self.inner.lock();
        let attribute = inner
            .attributes
            .get_mut(&handle)
            .ok_or(AttError::InvalidHandle(handle))?;
        attribute.value = value.to_vec();
        Ok(())
    }

    fn value(&self, handle: AttributeHandle) -> StackResult<Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .attributes
            .get(&handle)
            .map(|attribute| attribute.value.clone())
            .ok_or_else(|| AttError::InvalidHandle(handle).into())
    }

    fn notify(&mut self, handle: AttributeHandle) -> StackResult<()> {
        let mut inner = self.inner.lock();
        let value = inner
            .attributes
            .get(&handle)
            .map(|attribute| attribute.value.clone())
            .ok_or(AttError::InvalidHandle(handle))?;
        let delivered = inner.link.is_some() && inner.notifications_enabled(handle);
        inner.events.push(StackEvent::Notified {
            handle,
            value,
            delivered,
        });
        Ok(())
    }

    fn configure_advertising(
        &mut self,
        server: ServerHandle,
        config: &AdvertisingConfig,
    ) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_server(server)?;
        inner.advertising = Some(config.clone());
        inner.events.push(StackEvent::AdvertisingConfigured(config.clone()));
        Ok(())
    }

    fn start_advertising(&mut self, server: ServerHandle) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_server(server)?;
        inner.advertising_started = true;
        inner.events.push(StackEvent::AdvertisingStarted);
        Ok(())
    }

    fn apply_security_policy(&mut self, policy: &SecurityPolicy) -> StackResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_initialized()?;
        let key_sizes = SMP_MIN_ENCRYPTION_KEY_SIZE..=SMP_MAX_ENCRYPTION_KEY_SIZE;
        if !key_sizes.contains(&policy.max_key_size) {
            return Err(StackError::Platform(format!(
                "invalid encryption key size {}",
                policy.max_key_size
            )));
        }
        inner.policy = Some(policy.clone());
        inner.events.push(StackEvent::SecurityPolicyApplied(policy.clone()));
        Ok(())
    }

    fn whitelist(&self) -> Arc<dyn Whitelist> {
        self.whitelist.clone()
    }
}
