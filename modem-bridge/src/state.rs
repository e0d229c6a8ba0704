//! Process liveness shared between the poll loop and the heartbeat.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Value published on the heartbeat topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    #[default]
    Alive,
    Error,
}

impl Liveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Alive => "ALIVE",
            Liveness::Error => "ERROR",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronized liveness cell. Clones share the same value; the last write wins.
#[derive(Debug, Clone, Default)]
pub struct LivenessCell(Shared<Liveness>);

impl LivenessCell {
    pub fn new(initial: Liveness) -> Self {
        Self(new_state(initial))
    }

    pub fn get(&self) -> Liveness {
        *self.0.lock()
    }

    /// Stores `value` and returns the previous one
    pub fn set(&self, value: Liveness) -> Liveness {
        std::mem::replace(&mut *self.0.lock(), value)
    }
}
