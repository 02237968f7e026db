//! Connectivity state shared across the client runtime.
//!
//! The state is set from the platform's online/offline notifications
//! only. It is never inferred from queue or transport activity: a
//! failed call consults this state, it does not change it.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::ConnectivityState;

/// Process-shared online/offline indicator.
#[derive(Debug)]
pub struct ConnectivityWatch {
    online: AtomicBool,
}

impl ConnectivityWatch {
    /// New watch, initially online.
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        if self.online.load(Ordering::SeqCst) {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    /// Mark the client as online (platform reported connectivity).
    pub fn set_online(&self) {
        if !self.online.swap(true, Ordering::SeqCst) {
            tracing::info!("connectivity restored");
        }
    }

    /// Mark the client as offline (platform reported loss of network).
    pub fn set_offline(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            tracing::info!("connectivity lost");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }
}

impl Default for ConnectivityWatch {
    fn default() -> Self {
        Self::new()
    }
}
