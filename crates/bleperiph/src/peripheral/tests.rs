//! End-to-end tests of bring-up against the loopback substrate

use super::*;
use crate::collaborators::{PairingDisplay, UpdateService};
use crate::error::PeripheralError;
use crate::gatt::{
    Characteristic, Descriptor, Properties, Service, ServiceBuilder, BATTERY_LEVEL_UUID,
    BATTERY_SERVICE_UUID, CHAR_USER_DESC_UUID, DEVICE_INFORMATION_SERVICE_UUID,
    HARDWARE_REVISION_UUID, MANUFACTURER_NAME_UUID, SOFTWARE_REVISION_UUID,
};
use crate::platform::{AttError, LoopbackStack, PeerAddress, StackError, StackEvent};
use crate::smp::{AuthOutcome, DisplayCommand, IoCapability, PairingState};
use crate::uuid::Uuid;
use parking_lot::Mutex;

const OTA_SERVICE: Uuid = Uuid::from_u128(0xcb0b9a0b_a84c_4c0d_bdbb_442e3144ee30);
const OTA_CONTROL: Uuid = Uuid::from_u128(0x5dc3ee85_9c01_4fc8_97b8_a8c2d9e5b9a1);
const CENTRAL: PeerAddress = PeerAddress {
    bytes: [0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
};

#[derive(Default)]
struct FakeUpdate {
    reboot_checks: usize,
    fail: bool,
    /// Capacity requested for an extra descriptor on the control characteristic
    descriptor_capacity: Option<usize>,
}

impl UpdateService for FakeUpdate {
    fn build_update_service(&mut self, builder: &mut ServiceBuilder) -> Result<Service> {
        if self.fail {
            return Err(PeripheralError::InvalidParameter("no update partition".into()));
        }
        let mut service = Service::new(OTA_SERVICE);
        let mut control = Characteristic::new(OTA_CONTROL, Properties::READ | Properties::WRITE);
        if let Some(capacity) = self.descriptor_capacity {
            let uuid = Uuid::from_u16(CHAR_USER_DESC_UUID);
            control.description = Some(Descriptor::try_with_capacity(uuid, capacity)?);
        }
        builder
            .registry_mut()
            .register_secure(&mut service, control, "OTA control")?;
        Ok(service)
    }

    fn check_pending_reboot(&mut self) {
        self.reboot_checks += 1;
    }
}

#[derive(Default)]
struct RecordingDisplay {
    calls: Mutex<Vec<DisplayCommand>>,
}

impl RecordingDisplay {
    fn calls(&self) -> Vec<DisplayCommand> {
        self.calls.lock().clone()
    }
}

impl PairingDisplay for RecordingDisplay {
    fn show_pairing_passkey(&self, passkey: u32) {
        self.calls.lock().push(DisplayCommand::ShowPasskey(passkey));
    }

    fn restore_idle_display(&self) {
        self.calls.lock().push(DisplayCommand::RestoreIdle);
    }
}

fn acme_config() -> PeripheralConfig {
    PeripheralConfig {
        device_name: "acme-sensor".into(),
        vendor_name: "Acme".into(),
        firmware_version: "1.2.3".into(),
        battery: false,
    }
}

struct Harness {
    peripheral: Peripheral<LoopbackStack, FakeUpdate>,
    central: LoopbackStack,
    display: Arc<RecordingDisplay>,
}

fn bring_up(config: &PeripheralConfig) -> Harness {
    let central = LoopbackStack::new();
    let display = Arc::new(RecordingDisplay::default());
    let peripheral = Peripheral::bring_up(
        config,
        central.clone(),
        FakeUpdate::default(),
        display.clone(),
    )
    .unwrap();
    Harness {
        peripheral,
        central,
        display,
    }
}

#[test]
fn test_device_info_readable_without_pairing() {
    let h = bring_up(&acme_config());
    h.central.connect(CENTRAL).unwrap();

    let read = |uuid: u16| {
        let handle = h
            .central
            .discover(DEVICE_INFORMATION_SERVICE_UUID, uuid)
            .unwrap();
        h.central.read(handle).unwrap()
    };

    assert_eq!(read(SOFTWARE_REVISION_UUID), b"1.2.3");
    assert_eq!(read(MANUFACTURER_NAME_UUID), b"Acme");
    assert_eq!(read(HARDWARE_REVISION_UUID), b"1.0");
    assert_eq!(h.central.link_security(), Some(SecurityLevel::None));
}

#[test]
fn test_services_start_after_all_are_created() {
    let h = bring_up(&acme_config());
    let events = h.central.events();

    let created: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, StackEvent::ServiceCreated { .. }))
        .map(|(i, _)| i)
        .collect();
    let started: Vec<Uuid> = events
        .iter()
        .filter_map(|e| match e {
            StackEvent::ServiceStarted { uuid, .. } => Some(*uuid),
            _ => None,
        })
        .collect();
    let first_start = events
        .iter()
        .position(|e| matches!(e, StackEvent::ServiceStarted { .. }))
        .unwrap();

    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|&i| i < first_start));
    assert_eq!(
        started,
        vec![Uuid::from_u16(DEVICE_INFORMATION_SERVICE_UUID), OTA_SERVICE]
    );
    assert_eq!(
        h.peripheral
            .services()
            .iter()
            .map(|s| s.uuid())
            .collect::<Vec<_>>(),
        started
    );
}

#[test]
fn test_bring_up_order() {
    let h = bring_up(&acme_config());
    let events = h.central.events();
    let index = |wanted: fn(&StackEvent) -> bool| events.iter().position(wanted).unwrap();

    let init = index(|e| matches!(e, StackEvent::Initialized { .. }));
    let encryption = index(|e| matches!(e, StackEvent::EncryptionLevelSet(_)));
    let security = index(|e| matches!(e, StackEvent::SecurityCallbacksInstalled));
    let server = index(|e| matches!(e, StackEvent::ServerCreated(_)));
    let service = index(|e| matches!(e, StackEvent::ServiceCreated { .. }));
    let adv_config = index(|e| matches!(e, StackEvent::AdvertisingConfigured(_)));
    let policy = index(|e| matches!(e, StackEvent::SecurityPolicyApplied(_)));
    let adv_start = index(|e| matches!(e, StackEvent::AdvertisingStarted));

    assert!(init < encryption);
    assert!(encryption < security);
    assert!(security < server);
    assert!(server < service);
    assert!(service < adv_config);
    assert!(policy < adv_start);
    assert!(adv_config < adv_start);

    assert_eq!(h.central.device_name().as_deref(), Some("acme-sensor"));
    assert_eq!(h.central.encryption_level(), SecurityLevel::EncryptionOnly);
    assert!(h.central.is_advertising());
}

#[test]
fn test_advertising_carries_update_service() {
    let h = bring_up(&acme_config());
    let advertising = h.central.advertising().unwrap();

    assert_eq!(advertising.service_uuids, vec![OTA_SERVICE]);
    assert!(!advertising.scan_filter.scan_requests_whitelist_only);
    // Connection admission is not restricted to bonded peers
    assert!(!advertising.scan_filter.connections_whitelist_only);
    assert_eq!(h.peripheral.advertising(), &advertising);
}

#[test]
fn test_security_policy_applied() {
    let h = bring_up(&acme_config());
    let policy = h.central.security_policy().unwrap();

    assert_eq!(policy, SecurityPolicy::passkey_display());
    assert_eq!(policy.io_capability, IoCapability::DisplayOnly);
    assert!(policy.auth_req.secure_connections && policy.auth_req.bonding);
    assert!(policy.responder_keys.encryption_key && policy.responder_keys.identity_key);
}

#[test]
fn test_passkey_display_scenario() {
    let h = bring_up(&acme_config());
    h.central.connect(CENTRAL).unwrap();

    h.central.notify_passkey(482_913).unwrap();
    assert_eq!(h.display.calls(), vec![DisplayCommand::ShowPasskey(482_913)]);
    assert_eq!(
        h.peripheral.pairing().state(),
        PairingState::Displaying { passkey: 482_913 }
    );

    h.central.complete_authentication(AuthOutcome::Success).unwrap();
    assert_eq!(
        h.display.calls(),
        vec![DisplayCommand::ShowPasskey(482_913), DisplayCommand::RestoreIdle]
    );
    assert_eq!(h.peripheral.pairing().state(), PairingState::Idle);
    assert_eq!(h.peripheral.pairing().completed_attempts(), 1);
}

#[test]
fn test_security_callbacks_are_the_pairing_agent() {
    let h = bring_up(&acme_config());

    assert_eq!(h.central.request_security(), Ok(true));
    assert_eq!(h.central.confirm_pin(482_913), Ok(false));
    assert_eq!(h.central.request_passkey(), Ok(123_511));
    assert!(h.display.calls().is_empty());

    h.central.fail_pairing(0x03).unwrap();
    assert_eq!(h.display.calls(), vec![DisplayCommand::RestoreIdle]);
    assert_eq!(
        h.peripheral.pairing().last_attempt().unwrap().outcome,
        Some(AuthOutcome::Failure(crate::smp::PairingFailure::AuthenticationRequirements))
    );
}

#[test]
fn test_pairing_unlocks_update_service() {
    let h = bring_up(&acme_config());
    h.central.connect(CENTRAL).unwrap();

    let control = h.central.discover(OTA_SERVICE, OTA_CONTROL).unwrap();
    assert_eq!(
        h.central.write(control, &[1]),
        Err(StackError::Att(AttError::InsufficientEncryption))
    );

    let outcome = h.central.pair(|passkey| passkey).unwrap();
    assert!(outcome.is_success());

    let calls = h.display.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], DisplayCommand::ShowPasskey(_)));
    assert_eq!(calls[1], DisplayCommand::RestoreIdle);

    let attempt = h.peripheral.pairing().last_attempt().unwrap();
    assert_eq!(attempt.whitelist_size, Some(1));

    h.central.write(control, &[1]).unwrap();
    assert_eq!(h.central.read(control).unwrap(), vec![1]);
}

#[test]
fn test_failed_pairing_keeps_connection() {
    let h = bring_up(&acme_config());
    h.central.connect(CENTRAL).unwrap();

    let outcome = h.central.pair(|passkey| passkey ^ 1).unwrap();

    assert!(!outcome.is_success());
    assert!(h.peripheral.is_connected());
    assert_eq!(h.central.link_security(), Some(SecurityLevel::None));
    assert_eq!(h.display.calls().last(), Some(&DisplayCommand::RestoreIdle));
}

#[test]
fn test_connection_tracking() {
    let h = bring_up(&acme_config());
    let tracker = h.peripheral.connection();
    assert!(!h.peripheral.is_connected());

    h.central.connect(CENTRAL).unwrap();
    assert!(h.peripheral.is_connected());
    assert!(tracker.is_connected());

    h.central.disconnect().unwrap();
    assert!(!h.peripheral.is_connected());

    h.central.connect(CENTRAL).unwrap();
    assert!(tracker.is_connected());
}

#[test]
fn test_battery_service_from_config() {
    let mut config = acme_config();
    config.battery = true;
    let mut h = bring_up(&config);

    assert!(h.peripheral.builder().has_battery_service());
    assert_eq!(
        h.peripheral.services().last().map(|s| s.uuid()),
        Some(Uuid::from_u16(BATTERY_SERVICE_UUID))
    );

    let id = h.peripheral.builder().registry().find(BATTERY_LEVEL_UUID).unwrap();
    let handle = h.peripheral.builder().registry().handle(id).unwrap();

    h.peripheral.update_battery_level(87).unwrap();
    h.peripheral.update_battery_level(250).unwrap();

    assert_eq!(h.peripheral.read_value(id).unwrap(), vec![250]);
    assert_eq!(h.central.notifications(handle), vec![vec![87], vec![250]]);

    // The level is encrypted like every securely registered characteristic
    h.central.connect(CENTRAL).unwrap();
    let level = h
        .central
        .discover(BATTERY_SERVICE_UUID, BATTERY_LEVEL_UUID)
        .unwrap();
    assert_eq!(
        h.central.read(level),
        Err(StackError::Att(AttError::InsufficientEncryption))
    );
}

#[test]
fn test_no_battery_by_default() {
    let mut h = bring_up(&acme_config());

    assert!(matches!(
        h.peripheral.update_battery_level(50),
        Err(PeripheralError::NoBatteryService)
    ));
    assert_eq!(
        h.central.discover(BATTERY_SERVICE_UUID, BATTERY_LEVEL_UUID),
        None
    );
}

#[test]
fn test_maintain_polls_update_service() {
    let mut h = bring_up(&acme_config());

    for _ in 0..3 {
        h.peripheral.maintain();
    }

    assert_eq!(h.peripheral.update_service().reboot_checks, 3);
}

#[test]
fn test_update_service_failure_aborts_bring_up() {
    let stack = LoopbackStack::new();
    let update = FakeUpdate {
        fail: true,
        ..FakeUpdate::default()
    };

    let result = Peripheral::bring_up(
        &acme_config(),
        stack.clone(),
        update,
        Arc::new(RecordingDisplay::default()),
    );

    assert!(matches!(result, Err(PeripheralError::InvalidParameter(_))));
    assert!(!stack.is_advertising());
    assert!(!stack
        .events()
        .iter()
        .any(|e| matches!(e, StackEvent::ServiceStarted { .. })));
}

#[test]
fn test_descriptor_allocation_failure_aborts_bring_up() {
    let stack = LoopbackStack::new();
    let update = FakeUpdate {
        descriptor_capacity: Some(usize::MAX),
        ..FakeUpdate::default()
    };

    let result = Peripheral::bring_up(
        &acme_config(),
        stack.clone(),
        update,
        Arc::new(RecordingDisplay::default()),
    );

    assert!(matches!(
        result,
        Err(PeripheralError::DescriptorAllocation { .. })
    ));
    assert!(!stack.is_advertising());
    assert!(!stack.events().iter().any(|e| matches!(
        e,
        StackEvent::ServiceStarted { .. } | StackEvent::AdvertisingStarted
    )));
}

#[test]
fn test_invalid_device_name_rejected() {
    let mut config = acme_config();
    config.device_name = String::new();
    let stack = LoopbackStack::new();

    let result = Peripheral::bring_up(
        &config,
        stack.clone(),
        FakeUpdate::default(),
        Arc::new(RecordingDisplay::default()),
    );

    assert!(result.is_err());
    assert!(stack.events().is_empty());
}

#[test]
fn test_config_from_toml() {
    let config = PeripheralConfig::from_toml_str(
        r#"
        device_name = "acme-sensor"
        vendor_name = "Acme"
        firmware_version = "1.2.3"
        battery = true
        "#,
    )
    .unwrap();

    assert_eq!(
        config,
        PeripheralConfig {
            battery: true,
            ..acme_config()
        }
    );
}

#[test]
fn test_config_defaults_fill_missing_keys() {
    let config = PeripheralConfig::from_toml_str(r#"vendor_name = "Acme""#).unwrap();

    assert_eq!(config.vendor_name, "Acme");
    assert_eq!(config.device_name, PeripheralConfig::default().device_name);
    assert!(!config.battery);
}

#[test]
fn test_config_errors() {
    assert!(matches!(
        PeripheralConfig::from_toml_str("battery = \"yes\""),
        Err(PeripheralError::Config(_))
    ));
    assert!(matches!(
        PeripheralConfig::from_toml_str("device_name = \"this-name-is-far-too-long-to-advertise\""),
        Err(PeripheralError::InvalidParameter(_))
    ));
    assert!(matches!(
        PeripheralConfig::load("/nonexistent/bleperiph.toml"),
        Err(PeripheralError::Io(_))
    ));
}
