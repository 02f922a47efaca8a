//! Buffered logging relay.
//!
//! Formatted text is accumulated byte by byte in a fixed buffer whose last
//! slot is reserved for the NUL terminator. Every call starts from an empty
//! buffer. When a byte arrives while the content area (`capacity - 1`
//! bytes) is full, the buffered content is flushed to the host as its own
//! record before the byte is stored. The terminator is always stored and
//! flushes content plus terminator.
//!
//! A message shorter than `capacity` therefore reaches the host as exactly
//! one record. Longer messages are split at each buffer-full boundary; the
//! records are never reassembled, and their concatenation (minus the final
//! terminator) is the original message byte for byte. Multi-byte UTF-8
//! sequences may straddle two records.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use fusion_primitives::{CapabilityId, LOG_BUFFER_CAPACITY};

use crate::host::HostCapabilities;

/// Smallest usable buffer: one content byte plus the terminator slot.
pub const MIN_CAPACITY: usize = 2;

/// Terminator appended to the final record of every message.
pub const TERMINATOR: u8 = 0;

/// Severity of a log record, selecting the host logging capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Capability that receives records of this level.
    pub fn capability(self) -> CapabilityId {
        match self {
            Self::Info => CapabilityId::LogInfo,
            Self::Warn => CapabilityId::LogWarn,
            Self::Error => CapabilityId::LogError,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Fixed-capacity log buffer with its write cursor.
#[derive(Debug, Clone)]
pub struct LogRelay {
    buffer: Vec<u8>,
    cursor: usize,
    level: Level,
    records: u64,
}

impl Default for LogRelay {
    fn default() -> Self {
        Self::new(LOG_BUFFER_CAPACITY)
    }
}

impl LogRelay {
    /// Create a relay with `capacity` bytes, terminator slot included.
    ///
    /// Capacities below [`MIN_CAPACITY`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(MIN_CAPACITY)],
            cursor: 0,
            level: Level::Info,
            records: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Records handed to the host so far.
    pub fn records_flushed(&self) -> u64 {
        self.records
    }

    /// Bytes buffered but not yet flushed.
    pub fn pending(&self) -> usize {
        self.cursor
    }

    /// Format `args` and relay it to the host at `level`.
    pub fn log<H>(&mut self, host: &mut H, level: Level, args: fmt::Arguments<'_>)
    where
        H: HostCapabilities + ?Sized,
    {
        self.cursor = 0;
        self.level = level;
        let mut sink = Sink { relay: self, host };
        fmt::write(&mut sink, args).ok();
        sink.relay.terminate(sink.host);
    }

    /// Relay a preformatted message.
    pub fn log_str<H>(&mut self, host: &mut H, level: Level, message: &str)
    where
        H: HostCapabilities + ?Sized,
    {
        self.log(host, level, format_args!("{}", message));
    }

    /// Flush whatever is buffered without a terminator.
    ///
    /// Returns true if a record was sent.
    pub fn flush_pending<H>(&mut self, host: &mut H) -> bool
    where
        H: HostCapabilities + ?Sized,
    {
        if self.cursor == 0 {
            return false;
        }
        self.flush(host, self.cursor);
        true
    }

    fn put<H>(&mut self, host: &mut H, byte: u8)
    where
        H: HostCapabilities + ?Sized,
    {
        if self.cursor == self.buffer.len() - 1 {
            self.flush(host, self.cursor);
        }
        self.buffer[self.cursor] = byte;
        self.cursor += 1;
    }

    fn terminate<H>(&mut self, host: &mut H)
    where
        H: HostCapabilities + ?Sized,
    {
        self.buffer[self.cursor] = TERMINATOR;
        self.flush(host, self.cursor + 1);
    }

    fn flush<H>(&mut self, host: &mut H, len: usize)
    where
        H: HostCapabilities + ?Sized,
    {
        host.log(self.level, &self.buffer[..len]);
        self.records += 1;
        self.cursor = 0;
    }
}

struct Sink<'a, H: ?Sized> {
    relay: &'a mut LogRelay,
    host: &'a mut H,
}

impl<H> fmt::Write for Sink<'_, H>
where
    H: HostCapabilities + ?Sized,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            self.relay.put(self.host, byte);
        }
        Ok(())
    }
}

/// Log at info level through anything with a `log(Level, Arguments)` method.
#[macro_export]
macro_rules! log_info {
    ($target:expr, $($arg:tt)*) => {
        $target.log($crate::relay::Level::Info, format_args!($($arg)*))
    };
}

/// Log at warn level through anything with a `log(Level, Arguments)` method.
#[macro_export]
macro_rules! log_warn {
    ($target:expr, $($arg:tt)*) => {
        $target.log($crate::relay::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at error level through anything with a `log(Level, Arguments)` method.
#[macro_export]
macro_rules! log_error {
    ($target:expr, $($arg:tt)*) => {
        $target.log($crate::relay::Level::Error, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockHost;
    use alloc::string::String;
    use proptest::prelude::*;

    fn records(host: &MockHost) -> Vec<Vec<u8>> {
        host.log_records().iter().map(|r| r.bytes.clone()).collect()
    }

    #[test]
    fn test_short_message_is_one_terminated_record() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(1024);
        relay.log_str(&mut host, Level::Info, "Module init");

        assert_eq!(records(&host), vec![b"Module init\0".to_vec()]);
        assert_eq!(host.log_records()[0].level, Level::Info);
        assert_eq!(relay.records_flushed(), 1);
        assert_eq!(relay.pending(), 0);
    }

    #[test]
    fn test_long_message_splits_at_buffer_boundary() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(1024);
        let message: String = core::iter::repeat('x').take(2000).collect();
        relay.log_str(&mut host, Level::Warn, &message);

        let recs = records(&host);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].len(), 1023);
        assert!(!recs[0].contains(&TERMINATOR));
        assert_eq!(recs[1].len(), 978);
        assert_eq!(recs[1].last(), Some(&TERMINATOR));
    }

    #[test]
    fn test_message_filling_content_area_stays_whole() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(16);
        relay.log_str(&mut host, Level::Info, "abcdefghijklmno");

        assert_eq!(records(&host), vec![b"abcdefghijklmno\0".to_vec()]);
    }

    #[test]
    fn test_multiple_of_content_area_has_no_bare_terminator_record() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(16);
        relay.log_str(&mut host, Level::Info, "abcdefghijklmnoABCDEFGHIJKLMNO");

        assert_eq!(
            records(&host),
            vec![b"abcdefghijklmno".to_vec(), b"ABCDEFGHIJKLMNO\0".to_vec()]
        );
    }

    #[test]
    fn test_empty_message_sends_terminator_only() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(8);
        relay.log_str(&mut host, Level::Error, "");
        assert_eq!(records(&host), vec![vec![TERMINATOR]]);
        assert_eq!(host.log_records()[0].level, Level::Error);
    }

    #[test]
    fn test_formatting_goes_through_the_buffer() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::new(8);
        relay.log(&mut host, Level::Info, format_args!("socket {} -> {}", 3, "ok"));

        let joined: Vec<u8> = records(&host).concat();
        assert_eq!(joined, b"socket 3 -> ok\0".to_vec());
        assert_eq!(host.log_records().len(), 2);
    }

    #[test]
    fn test_tiny_capacity_is_raised() {
        let relay = LogRelay::new(0);
        assert_eq!(relay.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn test_flush_pending_without_content_is_noop() {
        let mut host = MockHost::new();
        let mut relay = LogRelay::default();
        assert!(!relay.flush_pending(&mut host));
        assert!(host.log_records().is_empty());
    }

    #[test]
    fn test_level_capabilities() {
        assert_eq!(Level::Info.capability(), CapabilityId::LogInfo);
        assert_eq!(Level::Warn.capability().name(), "nms_log_warn");
        assert_eq!(Level::Error.capability().name(), "nms_log_error");
    }

    proptest! {
        #[test]
        fn splitting_law(message in "[ -~]{0,300}", capacity in 2usize..64) {
            let mut host = MockHost::new();
            let mut relay = LogRelay::new(capacity);
            relay.log_str(&mut host, Level::Info, &message);

            let recs = records(&host);
            let expected = message.len().div_ceil(capacity - 1).max(1);
            prop_assert_eq!(recs.len(), expected);
            if message.len() < capacity {
                prop_assert_eq!(recs.len(), 1);
            }
            for rec in &recs[..recs.len() - 1] {
                prop_assert_eq!(rec.len(), capacity - 1);
            }
            let mut joined = recs.concat();
            prop_assert_eq!(joined.pop(), Some(TERMINATOR));
            prop_assert_eq!(joined, message.into_bytes());
        }
    }
}
