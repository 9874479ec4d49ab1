//! Pairing state machine
//!
//! The device pairs with a one-directional passkey display: the stack
//! generates a passkey, we show it, the user types it on the central.
//! [`PairingStateMachine`] is plain data with a transition function and knows
//! nothing about the substrate. [`PairingAgent`] wires it to the security
//! callbacks and performs the side effects a step asks for.

use super::constants::PLACEHOLDER_PASSKEY;
use super::types::{AuthOutcome, IoCapability};
use crate::collaborators::PairingDisplay;
use crate::platform::{SecurityCallbacks, Whitelist};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Where the current authentication cycle stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// No attempt in flight
    Idle,
    /// A security or pairing request was observed
    Negotiating,
    /// The stack asked us to confirm a numeric value (always declined)
    AwaitingConfirmation,
    /// A passkey is on the display
    Displaying { passkey: u32 },
}

/// Security events delivered by the platform, one per callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    SecurityRequest,
    ConfirmPin(u32),
    PasskeyRequest,
    PasskeyNotify(u32),
    AuthenticationComplete {
        outcome: AuthOutcome,
        /// Whitelist size queried after a successful bond
        whitelist_size: Option<u16>,
    },
}

/// Answer returned to the platform for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    None,
    Accept(bool),
    Passkey(u32),
}

/// What the display collaborator must do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    ShowPasskey(u32),
    RestoreIdle,
}

/// One authentication cycle, opened by the first security event and closed
/// by authentication-complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingAttempt {
    pub capability: IoCapability,
    pub passkey: Option<u32>,
    pub outcome: Option<AuthOutcome>,
    pub whitelist_size: Option<u16>,
}

impl PairingAttempt {
    fn new(capability: IoCapability) -> Self {
        Self {
            capability,
            passkey: None,
            outcome: None,
            whitelist_size: None,
        }
    }
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub reply: Reply,
    pub display: Option<DisplayCommand>,
    /// The attempt closed by this step, if any
    pub completed: Option<PairingAttempt>,
}

impl Step {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            display: None,
            completed: None,
        }
    }
}

#[derive(Debug)]
pub struct PairingStateMachine {
    capability: IoCapability,
    state: PairingState,
    attempt: Option<PairingAttempt>,
    last_attempt: Option<PairingAttempt>,
    completed_attempts: u32,
}

impl PairingStateMachine {
    pub fn new(capability: IoCapability) -> Self {
        Self {
            capability,
            state: PairingState::Idle,
            attempt: None,
            last_attempt: None,
            completed_attempts: 0,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// The attempt currently in flight.
    pub fn attempt(&self) -> Option<&PairingAttempt> {
        self.attempt.as_ref()
    }

    /// The most recently closed attempt.
    pub fn last_attempt(&self) -> Option<&PairingAttempt> {
        self.last_attempt.as_ref()
    }

    pub fn completed_attempts(&self) -> u32 {
        self.completed_attempts
    }

    /// Apply one platform event.
    ///
    /// Events that arrive with no attempt in flight open one; the central
    /// may start pairing without a prior security request.
    pub fn handle(&mut self, event: SecurityEvent) -> Step {
        match event {
            SecurityEvent::SecurityRequest => {
                self.begin();
                self.state = PairingState::Negotiating;
                // Admission is decided by connection policy, not here.
                Step::reply(Reply::Accept(true))
            }
            SecurityEvent::ConfirmPin(_) => {
                self.begin();
                self.state = PairingState::AwaitingConfirmation;
                // No input on this device, numeric comparison is unsupported.
                Step::reply(Reply::Accept(false))
            }
            SecurityEvent::PasskeyRequest => {
                self.begin();
                Step::reply(Reply::Passkey(PLACEHOLDER_PASSKEY))
            }
            SecurityEvent::PasskeyNotify(passkey) => {
                let attempt = self.begin();
                attempt.passkey = Some(passkey);
                self.state = PairingState::Displaying { passkey };
                Step {
                    reply: Reply::None,
                    display: Some(DisplayCommand::ShowPasskey(passkey)),
                    completed: None,
                }
            }
            SecurityEvent::AuthenticationComplete {
                outcome,
                whitelist_size,
            } => {
                let mut attempt = self
                    .attempt
                    .take()
                    .unwrap_or_else(|| PairingAttempt::new(self.capability));
                attempt.outcome = Some(outcome);
                if outcome.is_success() {
                    attempt.whitelist_size = whitelist_size;
                }

                self.state = PairingState::Idle;
                self.completed_attempts += 1;
                self.last_attempt = Some(attempt.clone());

                Step {
                    reply: Reply::None,
                    display: Some(DisplayCommand::RestoreIdle),
                    completed: Some(attempt),
                }
            }
        }
    }

    fn begin(&mut self) -> &mut PairingAttempt {
        if self.attempt.is_none() {
            self.state = PairingState::Negotiating;
        }
        let capability = self.capability;
        self.attempt
            .get_or_insert_with(|| PairingAttempt::new(capability))
    }
}

/// Security callback handler driving a [`PairingStateMachine`].
pub struct PairingAgent {
    machine: Mutex<PairingStateMachine>,
    display: Arc<dyn PairingDisplay>,
    whitelist: Arc<dyn Whitelist>,
}

impl PairingAgent {
    pub fn new(
        capability: IoCapability,
        display: Arc<dyn PairingDisplay>,
        whitelist: Arc<dyn Whitelist>,
    ) -> Self {
        debug!("Pairing agent using capability {}", capability);
        Self {
            machine: Mutex::new(PairingStateMachine::new(capability)),
            display,
            whitelist,
        }
    }

    pub fn state(&self) -> PairingState {
        self.machine.lock().state()
    }

    pub fn last_attempt(&self) -> Option<PairingAttempt> {
        self.machine.lock().last_attempt().cloned()
    }

    pub fn completed_attempts(&self) -> u32 {
        self.machine.lock().completed_attempts()
    }

    fn dispatch(&self, event: SecurityEvent) -> Step {
        // The lock is released before the display runs.
        let step = self.machine.lock().handle(event);

        match step.display {
            Some(DisplayCommand::ShowPasskey(passkey)) => {
                self.display.show_pairing_passkey(passkey)
            }
            Some(DisplayCommand::RestoreIdle) => self.display.restore_idle_display(),
            None => {}
        }

        step
    }
}

impl SecurityCallbacks for PairingAgent {
    fn on_confirm_pin(&self, pin: u32) -> bool {
        info!("Declining PIN confirmation {:06}", pin);
        matches!(self.dispatch(SecurityEvent::ConfirmPin(pin)).reply, Reply::Accept(true))
    }

    fn on_passkey_request(&self) -> u32 {
        debug!("Passkey requested, answering with placeholder");
        match self.dispatch(SecurityEvent::PasskeyRequest).reply {
            Reply::Passkey(passkey) => passkey,
            _ => PLACEHOLDER_PASSKEY,
        }
    }

    fn on_passkey_notify(&self, passkey: u32) {
        info!("Displaying pairing passkey {:06}", passkey);
        self.dispatch(SecurityEvent::PasskeyNotify(passkey));
    }

    fn on_security_request(&self) -> bool {
        info!("Security request granted");
        matches!(self.dispatch(SecurityEvent::SecurityRequest).reply, Reply::Accept(true))
    }

    fn on_authentication_complete(&self, outcome: AuthOutcome) {
        let whitelist_size = match outcome {
            AuthOutcome::Success => match self.whitelist.whitelist_size() {
                Ok(size) => {
                    info!("Authentication complete, whitelist size: {}", size);
                    Some(size)
                }
                Err(e) => {
                    warn!("Authentication complete, whitelist size unavailable: {}", e);
                    None
                }
            },
            AuthOutcome::Failure(reason) => {
                warn!(
                    "Authentication failed: {} (0x{:02x})",
                    reason,
                    reason.reason()
                );
                None
            }
        };

        self.dispatch(SecurityEvent::AuthenticationComplete {
            outcome,
            whitelist_size,
        });
    }
}
