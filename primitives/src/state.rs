//! Module lifecycle states and the entry points that drive them.

use core::fmt;

/// Lifecycle state of a guest module.
///
/// `Uninitialized → Initialized → Stopped` is the normal path.
/// `Initialized → Failed` is taken by the failure hook and
/// `Failed → Initialized` by the restore hook. `Stopped` is terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModuleState {
    #[default]
    Uninitialized = 0,
    Initialized = 1,
    Stopped = 2,
    Failed = 3,
}

impl ModuleState {
    /// Convert from the snapshot byte representation.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Initialized),
            2 => Some(Self::Stopped),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Byte representation used in snapshots.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true if `entry` is legal in this state.
    pub fn accepts(self, entry: EntryPoint) -> bool {
        match entry {
            EntryPoint::Init => self == Self::Uninitialized,
            EntryPoint::Tick | EntryPoint::OnFailure => self == Self::Initialized,
            EntryPoint::Restore => self == Self::Failed,
            EntryPoint::Stop => matches!(self, Self::Initialized | Self::Failed | Self::Stopped),
        }
    }

    /// Returns true once no transition can leave this state.
    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Guest-exported lifecycle entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Init,
    Tick,
    Stop,
    OnFailure,
    Restore,
}

impl EntryPoint {
    /// Export name the host calls.
    pub fn export_name(self) -> &'static str {
        match self {
            Self::Init => "module_init",
            Self::Tick => "module_tick",
            Self::Stop => "module_stop",
            Self::OnFailure => "module_on_failure",
            Self::Restore => "module_restore",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}
