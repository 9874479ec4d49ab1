//! Connection lifecycle tracking

use crate::platform::ServerCallbacks;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records whether a central is connected.
///
/// Installed as the server callback handler; clones of the `Arc` holding it
/// can be queried from any thread.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    connected: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl ServerCallbacks for ConnectionTracker {
    fn on_connect(&self) {
        self.connected.store(true, Ordering::Release);
        info!("Central connected");
    }

    fn on_disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        info!("Central disconnected");
    }
}
