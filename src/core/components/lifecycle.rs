use std::fmt;

/// Coarse lifecycle state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Constructed,
    Initialized,
    Associated,
    Ready,
    Crashed,
    Stopped,
}

impl Lifecycle {
    /// Derive the state from the module's flags; crashed wins over everything else
    pub fn from_flags(initialized: bool, associated: bool, ready: bool, crashed: bool, stopped: bool) -> Self {
        if crashed {
            Lifecycle::Crashed
        } else if stopped {
            Lifecycle::Stopped
        } else if ready {
            Lifecycle::Ready
        } else if associated {
            Lifecycle::Associated
        } else if initialized {
            Lifecycle::Initialized
        } else {
            Lifecycle::Constructed
        }
    }

    /// Whether no further transition except a crash is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Crashed | Lifecycle::Stopped)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Lifecycle::Constructed => "constructed",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Associated => "associated",
            Lifecycle::Ready => "ready",
            Lifecycle::Crashed => "crashed",
            Lifecycle::Stopped => "stopped",
        };
        f.write_str(text)
    }
}
