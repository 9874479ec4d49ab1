//! Unit tests for the pairing state machine and SMP types

use super::*;
use crate::collaborators::PairingDisplay;
use crate::platform::{SecurityCallbacks, StackError, StackResult, Whitelist};
use parking_lot::Mutex;
use std::sync::Arc;

/// Display that records every call
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

struct FixedWhitelist(StackResult<u16>);

impl Whitelist for FixedWhitelist {
    fn whitelist_size(&self) -> StackResult<u16> {
        self.0.clone()
    }
}

fn agent_with(whitelist: StackResult<u16>) -> (PairingAgent, Arc<RecordingDisplay>) {
    let display = Arc::new(RecordingDisplay::default());
    let agent = PairingAgent::new(
        IoCapability::DisplayOnly,
        display.clone(),
        Arc::new(FixedWhitelist(whitelist)),
    );
    (agent, display)
}

#[test]
fn test_confirm_pin_always_declined() {
    let (agent, display) = agent_with(Ok(0));

    for pin in [0, 1, 123_456, 482_913, 999_999, u32::MAX] {
        assert!(!agent.on_confirm_pin(pin));
    }
    assert_eq!(agent.state(), PairingState::AwaitingConfirmation);
    assert!(display.calls().is_empty());
}

#[test]
fn test_security_request_always_granted() {
    let (agent, _) = agent_with(Ok(0));

    assert!(agent.on_security_request());
    assert_eq!(agent.state(), PairingState::Negotiating);

    // A second request within the same attempt is granted too
    assert!(agent.on_security_request());
}

#[test]
fn test_passkey_request_returns_placeholder() {
    let (agent, display) = agent_with(Ok(0));

    assert_eq!(agent.on_passkey_request(), PLACEHOLDER_PASSKEY);
    assert_eq!(agent.on_passkey_request(), 123_511);
    assert!(display.calls().is_empty());
}

#[test]
fn test_passkey_display_then_restore() {
    let (agent, display) = agent_with(Ok(1));

    agent.on_passkey_notify(482_913);
    assert_eq!(display.calls(), vec![DisplayCommand::ShowPasskey(482_913)]);
    assert_eq!(agent.state(), PairingState::Displaying { passkey: 482_913 });

    agent.on_authentication_complete(AuthOutcome::Success);
    assert_eq!(
        display.calls(),
        vec![DisplayCommand::ShowPasskey(482_913), DisplayCommand::RestoreIdle]
    );
    assert_eq!(agent.state(), PairingState::Idle);

    let attempt = agent.last_attempt().unwrap();
    assert_eq!(attempt.passkey, Some(482_913));
    assert_eq!(attempt.outcome, Some(AuthOutcome::Success));
    assert_eq!(attempt.whitelist_size, Some(1));
}

#[test]
fn test_failed_authentication_restores_display_once() {
    let (agent, display) = agent_with(Ok(3));

    agent.on_security_request();
    agent.on_passkey_notify(42);
    agent.on_authentication_complete(AuthOutcome::Failure(PairingFailure::PasskeyEntryFailed));

    let restores = display
        .calls()
        .into_iter()
        .filter(|call| *call == DisplayCommand::RestoreIdle)
        .count();
    assert_eq!(restores, 1);

    let attempt = agent.last_attempt().unwrap();
    assert_eq!(
        attempt.outcome,
        Some(AuthOutcome::Failure(PairingFailure::PasskeyEntryFailed))
    );
    // Whitelist is only consulted on success
    assert_eq!(attempt.whitelist_size, None);
}

#[test]
fn test_whitelist_error_does_not_block_completion() {
    let (agent, display) = agent_with(Err(StackError::NotInitialized));

    agent.on_authentication_complete(AuthOutcome::Success);

    assert_eq!(display.calls(), vec![DisplayCommand::RestoreIdle]);
    assert_eq!(agent.completed_attempts(), 1);
    assert_eq!(agent.last_attempt().unwrap().whitelist_size, None);
}

#[test]
fn test_each_attempt_completes_once() {
    let mut machine = PairingStateMachine::new(IoCapability::DisplayOnly);

    machine.handle(SecurityEvent::SecurityRequest);
    machine.handle(SecurityEvent::PasskeyNotify(111_111));
    let first = machine.handle(SecurityEvent::AuthenticationComplete {
        outcome: AuthOutcome::Success,
        whitelist_size: Some(1),
    });
    assert_eq!(first.completed.unwrap().passkey, Some(111_111));
    assert!(machine.attempt().is_none());

    // The next attempt starts fresh and does not inherit the old passkey
    machine.handle(SecurityEvent::SecurityRequest);
    assert_eq!(machine.attempt().unwrap().passkey, None);
    let second = machine.handle(SecurityEvent::AuthenticationComplete {
        outcome: AuthOutcome::Failure(PairingFailure::from_reason(0x08)),
        whitelist_size: None,
    });
    let second = second.completed.unwrap();
    assert_eq!(second.passkey, None);
    assert_eq!(
        second.outcome,
        Some(AuthOutcome::Failure(PairingFailure::UnspecifiedReason))
    );
    assert_eq!(machine.completed_attempts(), 2);
}

#[test]
fn test_completion_without_request_opens_implicit_attempt() {
    let mut machine = PairingStateMachine::new(IoCapability::DisplayOnly);

    let step = machine.handle(SecurityEvent::AuthenticationComplete {
        outcome: AuthOutcome::Success,
        whitelist_size: Some(2),
    });

    assert_eq!(step.reply, Reply::None);
    assert_eq!(step.display, Some(DisplayCommand::RestoreIdle));
    let attempt = step.completed.unwrap();
    assert_eq!(attempt.capability, IoCapability::DisplayOnly);
    assert_eq!(attempt.whitelist_size, Some(2));
    assert_eq!(machine.state(), PairingState::Idle);
}

#[test]
fn test_passkey_notify_does_not_reply() {
    let mut machine = PairingStateMachine::new(IoCapability::DisplayOnly);

    let step = machine.handle(SecurityEvent::PasskeyNotify(7));
    assert_eq!(step.reply, Reply::None);
    assert_eq!(step.display, Some(DisplayCommand::ShowPasskey(7)));
    assert!(step.completed.is_none());
}

#[test]
fn test_pairing_failure_reasons() {
    for reason in 0x01..=0x0E {
        let failure = PairingFailure::from_reason(reason);
        assert!(!matches!(failure, PairingFailure::Other(_)));
        assert_eq!(failure.reason(), reason);
    }

    assert_eq!(PairingFailure::from_reason(0x42), PairingFailure::Other(0x42));
    assert_eq!(PairingFailure::Other(0x42).reason(), 0x42);
    assert_eq!(
        PairingFailure::DhKeyCheckFailed.to_string(),
        "DHKey check failed"
    );
}

#[test]
fn test_passkey_display_policy() {
    let policy = SecurityPolicy::default();

    assert_eq!(policy.io_capability, IoCapability::DisplayOnly);
    assert_eq!(policy.io_capability.to_u8(), 0x00);
    assert!(policy.auth_req.bonding);
    assert!(policy.auth_req.secure_connections);
    assert!(!policy.auth_req.mitm);
    assert_eq!(policy.auth_req.to_u8(), 0x09);
    assert_eq!(policy.initiator_keys.to_u8(), 0x03);
    assert_eq!(policy.responder_keys.to_u8(), 0x03);
    assert_eq!(policy.max_key_size, SMP_MAX_ENCRYPTION_KEY_SIZE);
}

#[test]
fn test_security_level_ordering() {
    assert!(!SecurityLevel::None.is_encrypted());
    assert!(SecurityLevel::EncryptionOnly.is_encrypted());
    assert!(!SecurityLevel::EncryptionOnly.is_authenticated());
    assert!(SecurityLevel::SecureConnections.is_authenticated());
    assert!(SecurityLevel::SecureConnections > SecurityLevel::EncryptionWithAuthentication);
}

#[test]
fn test_io_capability_codes() {
    for value in 0x00..=0x04 {
        assert_eq!(IoCapability::from_u8(value).unwrap().to_u8(), value);
    }
    assert_eq!(IoCapability::from_u8(0x05), None);
    assert!(IoCapability::DisplayOnly.displays_passkey());
    assert!(!IoCapability::NoInputNoOutput.displays_passkey());
    assert_eq!(IoCapability::DisplayOnly.to_string(), "DisplayOnly (0x00)");
}
