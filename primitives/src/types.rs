//! Core type aliases and constants shared by the guest, its engine, and tests.

/// Raw socket handle as returned by the host. Negative values are failures.
pub type RawSocket = i32;

/// Raw window handle as returned by the host. Negative values are failures.
pub type RawWindow = i64;

/// Font identifier understood by the host text renderer.
pub type FontId = u64;

/// Current guest ABI version, recorded in every snapshot.
pub const ABI_VERSION: u32 = 1;

/// Default size of the logging relay buffer, terminator slot included.
pub const LOG_BUFFER_CAPACITY: usize = 1024;

/// Default arena capacity requested by `module_init` (1 MiB).
pub const DEFAULT_HEAP_CAPACITY: usize = 1024 * 1024;

/// Window handle sentinel used by hosts that signal failure with `-1`.
pub const WINDOW_SENTINEL: RawWindow = -1;

/// Returns true if a raw socket handle or status signals a host failure.
pub fn is_socket_failure(code: i64) -> bool {
    code < 0
}

/// Returns true if a raw window handle is the host failure sentinel.
pub fn is_window_failure(handle: RawWindow) -> bool {
    handle < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_conventions() {
        assert!(is_socket_failure(-1));
        assert!(is_socket_failure(i64::MIN));
        assert!(!is_socket_failure(0));
        assert!(!is_socket_failure(7));

        assert!(is_window_failure(WINDOW_SENTINEL));
        assert!(!is_window_failure(0));
        assert!(!is_window_failure(42));
    }

    #[test]
    fn test_log_buffer_reserves_terminator_slot() {
        assert!(LOG_BUFFER_CAPACITY >= 2);
    }
}
