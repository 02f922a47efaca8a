//! The capability table: every host function a guest may import.
//!
//! All capabilities are imported from the `env` module. Strings and
//! structured payloads cross the boundary as `(ptr, len)` pairs of guest
//! linear memory; structured payloads use [`crate::codec`].
//!
//! The table is static data. It is never mutated at runtime.

use core::fmt;

/// Capability groups, each with a shared failure convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityCategory {
    Logging,
    Configuration,
    Audio,
    UdpSocket,
    TcpSocket,
    Windowing,
    UiDrawing,
}

/// How a capability reports failure to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureConvention {
    /// Fire-and-forget; the guest never learns about failure.
    None,
    /// A null pointer is returned when the key does not exist.
    NullOnMissing,
    /// A negative integer is returned; the associated handle becomes invalid.
    NegativeInteger,
    /// A host-defined sentinel handle (any negative value) is returned.
    Sentinel,
}

/// Identifier of one host-imported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityId {
    LogInfo,
    LogWarn,
    LogError,
    ConfigGet,
    ConfigRelease,
    ConfigDelete,
    AudioSetVolume,
    AudioMute,
    UdpCreate,
    UdpConnect,
    UdpSend,
    UdpRecv,
    UdpShutdown,
    TcpCreate,
    TcpConnect,
    TcpSend,
    TcpRecv,
    TcpShutdown,
    WindowCreate,
    WindowDestroy,
    WindowSetTitle,
    WindowResize,
    WindowMove,
    WindowSetVisibility,
    PushDrawCommand,
}

/// Static description of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub id: CapabilityId,
    /// Import name inside the `env` module.
    pub name: &'static str,
    /// Wasm-level signature, parameter names included.
    pub signature: &'static str,
    pub category: CapabilityCategory,
    pub failure: FailureConvention,
}

const fn entry(
    id: CapabilityId,
    name: &'static str,
    signature: &'static str,
    category: CapabilityCategory,
    failure: FailureConvention,
) -> Capability {
    Capability { id, name, signature, category, failure }
}

use CapabilityCategory as Cat;
use FailureConvention as Fail;

/// Every capability, in `CapabilityId` declaration order.
pub static CAPABILITY_TABLE: [Capability; 25] = [
    // ── Logging ──
    entry(CapabilityId::LogInfo, "nms_log_info", "(msg_ptr: i32, msg_len: i32)", Cat::Logging, Fail::None),
    entry(CapabilityId::LogWarn, "nms_log_warn", "(msg_ptr: i32, msg_len: i32)", Cat::Logging, Fail::None),
    entry(CapabilityId::LogError, "nms_log_error", "(msg_ptr: i32, msg_len: i32)", Cat::Logging, Fail::None),
    // ── Configuration ──
    entry(
        CapabilityId::ConfigGet,
        "nms_config_get",
        "(key_ptr: i32, key_len: i32, out_len_ptr: i32) -> i32",
        Cat::Configuration,
        Fail::NullOnMissing,
    ),
    entry(CapabilityId::ConfigRelease, "nms_config_release", "(ptr: i32, len: i32)", Cat::Configuration, Fail::None),
    entry(CapabilityId::ConfigDelete, "nms_config_delete", "(key_ptr: i32, key_len: i32)", Cat::Configuration, Fail::None),
    // ── Audio ──
    entry(CapabilityId::AudioSetVolume, "nms_audio_set_volume", "(volume: i32)", Cat::Audio, Fail::None),
    entry(CapabilityId::AudioMute, "nms_audio_mute", "(enable: i32)", Cat::Audio, Fail::None),
    // ── UDP ──
    entry(
        CapabilityId::UdpCreate,
        "nms_net_socket_udp_create",
        "(bind_ptr: i32, bind_len: i32) -> i32",
        Cat::UdpSocket,
        Fail::NegativeInteger,
    ),
    entry(
        CapabilityId::UdpConnect,
        "nms_net_socket_udp_connect",
        "(id: i32, addr_ptr: i32, addr_len: i32) -> i32",
        Cat::UdpSocket,
        Fail::NegativeInteger,
    ),
    entry(
        CapabilityId::UdpSend,
        "nms_net_socket_udp_send",
        "(id: i32, data_ptr: i32, length: i64) -> i64",
        Cat::UdpSocket,
        Fail::NegativeInteger,
    ),
    entry(
        CapabilityId::UdpRecv,
        "nms_net_socket_udp_recv",
        "(id: i32, buffer_ptr: i32, length: i64) -> i64",
        Cat::UdpSocket,
        Fail::NegativeInteger,
    ),
    entry(CapabilityId::UdpShutdown, "nms_net_socket_udp_shutdown", "(id: i32) -> i32", Cat::UdpSocket, Fail::NegativeInteger),
    // ── TCP ──
    entry(CapabilityId::TcpCreate, "nms_net_socket_tcp_create", "() -> i32", Cat::TcpSocket, Fail::NegativeInteger),
    entry(
        CapabilityId::TcpConnect,
        "nms_net_socket_tcp_connect",
        "(id: i32, addr_ptr: i32, addr_len: i32) -> i32",
        Cat::TcpSocket,
        Fail::NegativeInteger,
    ),
    entry(
        CapabilityId::TcpSend,
        "nms_net_socket_tcp_send",
        "(id: i32, data_ptr: i32, length: i64) -> i64",
        Cat::TcpSocket,
        Fail::NegativeInteger,
    ),
    entry(
        CapabilityId::TcpRecv,
        "nms_net_socket_tcp_recv",
        "(id: i32, buffer_ptr: i32, length: i64) -> i64",
        Cat::TcpSocket,
        Fail::NegativeInteger,
    ),
    entry(CapabilityId::TcpShutdown, "nms_net_socket_tcp_shutdown", "(id: i32) -> i32", Cat::TcpSocket, Fail::NegativeInteger),
    // ── Windowing ──
    entry(
        CapabilityId::WindowCreate,
        "create_window",
        "(id_ptr: i32, id_len: i32, layer_ptr: i32, layer_len: i32, width: i32, height: i32) -> i64",
        Cat::Windowing,
        Fail::Sentinel,
    ),
    entry(CapabilityId::WindowDestroy, "destroy_window", "(window: i64)", Cat::Windowing, Fail::None),
    entry(
        CapabilityId::WindowSetTitle,
        "set_window_title",
        "(window: i64, title_ptr: i32, title_len: i32)",
        Cat::Windowing,
        Fail::None,
    ),
    entry(CapabilityId::WindowResize, "resize_window", "(window: i64, width: i32, height: i32)", Cat::Windowing, Fail::None),
    entry(CapabilityId::WindowMove, "move_window", "(window: i64, x: i32, y: i32)", Cat::Windowing, Fail::None),
    entry(
        CapabilityId::WindowSetVisibility,
        "set_window_visibility",
        "(window: i64, visible: i32)",
        Cat::Windowing,
        Fail::None,
    ),
    // ── UI drawing ──
    entry(
        CapabilityId::PushDrawCommand,
        "push_draw_command",
        "(window: i64, pool_ptr: i32, pool_len: i32)",
        Cat::UiDrawing,
        Fail::None,
    ),
];

impl CapabilityId {
    /// Static table entry for this capability.
    pub fn describe(self) -> &'static Capability {
        &CAPABILITY_TABLE[self as usize]
    }

    /// Import name inside the `env` module.
    pub fn name(self) -> &'static str {
        self.describe().name
    }

    pub fn category(self) -> CapabilityCategory {
        self.describe().category
    }

    pub fn failure(self) -> FailureConvention {
        self.describe().failure
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up a capability by its import name.
pub fn lookup(name: &str) -> Option<&'static Capability> {
    CAPABILITY_TABLE.iter().find(|cap| cap.name == name)
}

/// Iterate the capabilities of one category.
pub fn by_category(category: CapabilityCategory) -> impl Iterator<Item = &'static Capability> {
    CAPABILITY_TABLE.iter().filter(move |cap| cap.category == category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;

    #[test]
    fn test_table_is_in_id_order() {
        for (idx, cap) in CAPABILITY_TABLE.iter().enumerate() {
            assert_eq!(cap.id as usize, idx, "{} out of order", cap.name);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let names: BTreeSet<&str> = CAPABILITY_TABLE.iter().map(|c| c.name).collect();
        assert_eq!(names.len(), CAPABILITY_TABLE.len());
    }

    #[test]
    fn test_lookup_by_name() {
        let cap = lookup("nms_net_socket_udp_recv").unwrap();
        assert_eq!(cap.id, CapabilityId::UdpRecv);
        assert_eq!(cap.failure, FailureConvention::NegativeInteger);
        assert!(lookup("nms_does_not_exist").is_none());
    }

    #[test]
    fn test_socket_capabilities_fail_with_negative_integers() {
        for category in [CapabilityCategory::UdpSocket, CapabilityCategory::TcpSocket] {
            assert_eq!(by_category(category).count(), 5);
            assert!(by_category(category).all(|c| c.failure == FailureConvention::NegativeInteger));
        }
    }

    #[test]
    fn test_logging_is_fire_and_forget() {
        assert!(by_category(CapabilityCategory::Logging).all(|c| c.failure == FailureConvention::None));
    }

    #[test]
    fn test_config_get_returns_null_on_missing() {
        assert_eq!(CapabilityId::ConfigGet.failure(), FailureConvention::NullOnMissing);
        assert_eq!(CapabilityId::WindowCreate.failure(), FailureConvention::Sentinel);
        assert_eq!(CapabilityId::PushDrawCommand.category(), CapabilityCategory::UiDrawing);
    }
}
