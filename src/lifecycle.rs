//! Builder lifecycle: `Enabled ⇄ Disabled → Shutdown`
//!
//! Shutdown is terminal. Transitions are lock-free compare-and-swap on a
//! single byte so the writer can check the state on every call.

use crate::error::{AffinityError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Enabled,
    Disabled,
    Shutdown,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Enabled,
            1 => Self::Disabled,
            _ => Self::Shutdown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
            Self::Shutdown => 2,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Enabled.as_u8()),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == LifecycleState::Enabled
    }

    pub fn is_shutdown(&self) -> bool {
        self.state() == LifecycleState::Shutdown
    }

    /// `Disabled → Enabled`; returns whether the state changed
    pub fn enable(&self) -> bool {
        self.transition(LifecycleState::Disabled, LifecycleState::Enabled)
    }

    /// `Enabled → Disabled`; returns whether the state changed
    pub fn disable(&self) -> bool {
        self.transition(LifecycleState::Enabled, LifecycleState::Disabled)
    }

    /// Enter the terminal state; returns `true` only for the first caller
    pub fn shutdown(&self) -> bool {
        let previous = self
            .state
            .swap(LifecycleState::Shutdown.as_u8(), Ordering::SeqCst);
        previous != LifecycleState::Shutdown.as_u8()
    }

    pub fn check_not_shutdown(&self) -> Result<()> {
        if self.is_shutdown() {
            Err(AffinityError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_enabled() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Enabled);
        assert!(lc.check_not_shutdown().is_ok());
    }

    #[test]
    fn test_enable_disable_idempotent() {
        let lc = Lifecycle::new();
        assert!(!lc.enable());
        assert!(lc.disable());
        assert!(!lc.disable());
        assert_eq!(lc.state(), LifecycleState::Disabled);
        assert!(lc.enable());
        assert!(lc.is_enabled());
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let lc = Lifecycle::new();
        lc.disable();
        assert!(lc.shutdown());
        assert!(!lc.shutdown());
        assert!(!lc.enable());
        assert!(!lc.disable());
        assert_eq!(lc.state(), LifecycleState::Shutdown);
        assert!(matches!(lc.check_not_shutdown(), Err(AffinityError::ShutDown)));
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Disabled.to_string(), "disabled");
    }
}
