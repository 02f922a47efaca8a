//! Error taxonomy for guest modules.
//!
//! Nothing in this taxonomy crosses the host boundary as an exception.
//! The export layer turns each variant into a logged diagnostic plus,
//! where applicable, a state transition or a sentinel return value.

use alloc::string::String;
use core::fmt;

use crate::capability::CapabilityId;
use crate::state::{EntryPoint, ModuleState};

/// Status codes reported at the export boundary.
///
/// Each [`ModuleError`] maps onto exactly one code; the guest prefixes its
/// error diagnostics with the code name so host-side log filters can match
/// on a stable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    OutOfMemory = 1,
    InvalidFree = 2,
    ArenaTooSmall = 3,
    CapabilityFailed = 4,
    StaleHandle = 5,
    ConfigMissing = 6,
    ConfigType = 7,
    SnapshotCorrupt = 8,
    OutOfOrder = 9,
    InvalidEncoding = 10,
}

impl ErrorCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::OutOfMemory),
            2 => Some(Self::InvalidFree),
            3 => Some(Self::ArenaTooSmall),
            4 => Some(Self::CapabilityFailed),
            5 => Some(Self::StaleHandle),
            6 => Some(Self::ConfigMissing),
            7 => Some(Self::ConfigType),
            8 => Some(Self::SnapshotCorrupt),
            9 => Some(Self::OutOfOrder),
            10 => Some(Self::InvalidEncoding),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::OutOfMemory => "ERR_OUT_OF_MEMORY",
            Self::InvalidFree => "ERR_INVALID_FREE",
            Self::ArenaTooSmall => "ERR_ARENA_TOO_SMALL",
            Self::CapabilityFailed => "ERR_CAPABILITY_FAILED",
            Self::StaleHandle => "ERR_STALE_HANDLE",
            Self::ConfigMissing => "ERR_CONFIG_MISSING",
            Self::ConfigType => "ERR_CONFIG_TYPE",
            Self::SnapshotCorrupt => "ERR_SNAPSHOT_CORRUPT",
            Self::OutOfOrder => "ERR_OUT_OF_ORDER",
            Self::InvalidEncoding => "ERR_INVALID_ENCODING",
        };
        f.write_str(name)
    }
}

/// Why a snapshot blob was rejected by the restore hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotFault {
    /// The pointer does not name a live blob inside the module heap.
    #[error("blob is not a live heap allocation")]
    NotInHeap,
    /// The blob ended before all fields were read, or had trailing bytes.
    #[error("blob is truncated or has trailing bytes")]
    Truncated,
    /// The leading magic does not identify a snapshot.
    #[error("bad magic")]
    BadMagic,
    /// The blob was written by an incompatible format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    /// The blob was produced by a different module.
    #[error("blob belongs to another module")]
    ForeignModule,
    /// The trailing digest does not match the payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// A field decoded to a value outside its domain.
    #[error("invalid field value")]
    InvalidField,
    /// Heap statistics in the blob disagree with the live arena.
    #[error("heap statistics disagree with the live arena")]
    HeapMismatch,
    /// Resource references in the blob disagree with the live handle tables.
    #[error("resource references disagree with the live handles")]
    ResourceMismatch,
}

/// Guest module error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The arena cannot satisfy a request of this many bytes.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailure { requested: usize },

    /// `free` was handed an address that is not a live allocation.
    #[error("invalid free of address {address:#x}")]
    InvalidFree { address: usize },

    /// The arena could not be created over the requested region.
    #[error("arena of {capacity} bytes is too small")]
    ArenaTooSmall { capacity: usize },

    /// A host capability reported failure (negative integer or null).
    #[error("capability {capability} failed with code {code}")]
    CapabilityFailure { capability: CapabilityId, code: i64 },

    /// A handle was used after it had been invalidated.
    #[error("stale handle for {capability}")]
    StaleHandle { capability: CapabilityId },

    /// The configuration lookup returned null.
    #[error("configuration key `{key}` is missing")]
    ConfigMissing { key: String },

    /// A configuration value had an unexpected variant.
    #[error("configuration key `{key}` has the wrong type")]
    ConfigType { key: String },

    /// The restore hook was given an unusable blob. Fatal.
    #[error("snapshot corruption: {0}")]
    SnapshotCorruption(SnapshotFault),

    /// An entry point was invoked out of state-machine order.
    #[error("{entry} called while {state}")]
    PreconditionViolation { entry: EntryPoint, state: ModuleState },

    /// Binary encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ModuleError {
    /// Returns true if the controller must not attempt to continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SnapshotCorruption(_))
    }

    /// Status code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AllocationFailure { .. } => ErrorCode::OutOfMemory,
            Self::InvalidFree { .. } => ErrorCode::InvalidFree,
            Self::ArenaTooSmall { .. } => ErrorCode::ArenaTooSmall,
            Self::CapabilityFailure { .. } => ErrorCode::CapabilityFailed,
            Self::StaleHandle { .. } => ErrorCode::StaleHandle,
            Self::ConfigMissing { .. } => ErrorCode::ConfigMissing,
            Self::ConfigType { .. } => ErrorCode::ConfigType,
            Self::SnapshotCorruption(_) => ErrorCode::SnapshotCorrupt,
            Self::PreconditionViolation { .. } => ErrorCode::OutOfOrder,
            Self::Encoding(_) => ErrorCode::InvalidEncoding,
        }
    }
}

impl From<SnapshotFault> for ModuleError {
    fn from(fault: SnapshotFault) -> Self {
        Self::SnapshotCorruption(fault)
    }
}

/// Convenience result type for guest modules.
pub type ModuleResult<T> = core::result::Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn test_display_names_the_failing_capability() {
        let err = ModuleError::CapabilityFailure {
            capability: CapabilityId::UdpCreate,
            code: -3,
        };
        let s = format!("{}", err);
        assert!(s.contains("nms_net_socket_udp_create"));
        assert!(s.contains("-3"));
    }

    #[test]
    fn test_precondition_display() {
        let err = ModuleError::PreconditionViolation {
            entry: EntryPoint::Tick,
            state: ModuleState::Uninitialized,
        };
        assert_eq!(err.to_string(), "module_tick called while uninitialized");
    }

    #[test]
    fn test_only_snapshot_corruption_is_fatal() {
        assert!(ModuleError::from(SnapshotFault::BadMagic).is_fatal());
        assert!(!ModuleError::AllocationFailure { requested: 8 }.is_fatal());
        assert!(!ModuleError::ConfigMissing { key: "k".into() }.is_fatal());
    }

    #[test]
    fn test_error_code_roundtrip() {
        for raw in 0..=10 {
            let code = ErrorCode::from_i32(raw).unwrap();
            assert_eq!(code.as_i32(), raw);
        }
        assert_eq!(ErrorCode::from_i32(11), None);
        assert_eq!(ErrorCode::from_i32(-1), None);
        assert!(ErrorCode::Ok.is_ok());
    }

    #[test]
    fn test_every_error_maps_to_a_failure_code() {
        let err = ModuleError::from(SnapshotFault::ForeignModule);
        assert_eq!(err.code(), ErrorCode::SnapshotCorrupt);
        assert_eq!(err.code().to_string(), "ERR_SNAPSHOT_CORRUPT");
        assert!(!ModuleError::InvalidFree { address: 1 }.code().is_ok());
    }

    #[test]
    fn test_invalid_free_display_is_hex() {
        let err = ModuleError::InvalidFree { address: 0x40 };
        assert!(err.to_string().contains("0x40"));
    }
}
