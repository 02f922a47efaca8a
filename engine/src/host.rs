//! Host capability trait: abstraction over the imported host functions.
//!
//! The `HostCapabilities` trait decouples the engine from the execution
//! environment:
//!
//! - In WASM: implemented by the guest's host bridge over the `env` imports
//! - In tests: implemented by `MockHost` (in-memory windows, sockets, config)
//!
//! Methods mirror the capability table one to one and keep the raw
//! conventions of the boundary: socket operations return negative integers
//! on failure and window creation returns a negative sentinel. Interpreting
//! those values, and refusing to reuse invalidated handles, is the job of
//! [`crate::capabilities`].

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;

use fusion_primitives::{
    CapabilityId, CommandPool, ConfigValue, RawSocket, RawWindow, WindowLayer,
};

use crate::relay::Level;

/// Host functions available to a guest module.
pub trait HostCapabilities {
    // ── Logging ──

    /// Hand one relay record (terminator included, if any) to the host.
    ///
    /// Fire-and-forget. The module never branches on log delivery.
    fn log(&mut self, level: Level, record: &[u8]);

    // ── Configuration ──

    /// Look up a configuration value.
    ///
    /// Returns `None` when the key does not exist. Implementations that
    /// receive host-owned buffers must release them before returning.
    fn config_get(&mut self, key: &str) -> Option<ConfigValue>;

    /// Delete a configuration key. Deleting a missing key is not an error.
    fn config_delete(&mut self, key: &str);

    // ── Audio ──

    fn audio_set_volume(&mut self, level: i32);

    fn audio_mute(&mut self, muted: bool);

    // ── UDP ──

    /// Create a UDP socket bound to `bind`. Negative on failure.
    fn udp_create(&mut self, bind: &str) -> RawSocket;

    fn udp_connect(&mut self, socket: RawSocket, remote: &str) -> i32;

    /// Send a datagram. Returns bytes sent, or negative on failure.
    fn udp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64;

    /// Receive into `buffer`. Returns bytes written, or negative on failure.
    fn udp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64;

    fn udp_shutdown(&mut self, socket: RawSocket) -> i32;

    // ── TCP ──

    /// Create an unconnected TCP socket. Negative on failure.
    fn tcp_create(&mut self) -> RawSocket;

    fn tcp_connect(&mut self, socket: RawSocket, remote: &str) -> i32;

    fn tcp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64;

    fn tcp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64;

    fn tcp_shutdown(&mut self, socket: RawSocket) -> i32;

    // ── Windowing ──

    /// Create a window. Returns a negative sentinel on failure.
    fn create_window(&mut self, id: &str, layer: &WindowLayer, width: u32, height: u32) -> RawWindow;

    fn destroy_window(&mut self, window: RawWindow);

    fn set_window_title(&mut self, window: RawWindow, title: &str);

    fn resize_window(&mut self, window: RawWindow, width: u32, height: u32);

    fn move_window(&mut self, window: RawWindow, x: i32, y: i32);

    fn set_window_visibility(&mut self, window: RawWindow, visible: bool);

    // ── UI drawing ──

    /// Submit one frame of draw commands to a window.
    fn push_draw_command(&mut self, window: RawWindow, pool: &CommandPool);
}

// ── MockHost: in-memory host for testing ──

/// One record received by a logging capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub bytes: Vec<u8>,
}

/// One capability invocation, with the handle it was keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCall {
    pub capability: CapabilityId,
    pub handle: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Udp,
    Tcp,
}

/// Socket state kept by the mock.
#[derive(Debug, Clone, Default)]
pub struct MockSocket {
    pub kind: Option<SocketKind>,
    pub bind: Option<String>,
    pub remote: Option<String>,
    pub sent: Vec<Vec<u8>>,
    pub inbox: VecDeque<Vec<u8>>,
    pub open: bool,
}

/// Window state kept by the mock.
#[derive(Debug, Clone)]
pub struct MockWindow {
    pub id: String,
    pub layer: WindowLayer,
    pub title: Option<String>,
    pub size: (u32, u32),
    pub position: (i32, i32),
    pub visible: bool,
    pub frames: Vec<CommandPool>,
    pub open: bool,
}

/// In-memory host implementation for deterministic testing.
///
/// Records every call and every log record. Failures are injected per
/// capability with [`MockHost::fail`]; an injected code is returned by every
/// later call of that capability until [`MockHost::recover`].
#[derive(Debug, Default)]
pub struct MockHost {
    logs: Vec<LogRecord>,
    calls: Vec<HostCall>,
    config: BTreeMap<String, ConfigValue>,
    deleted_keys: Vec<String>,
    volume: Option<i32>,
    muted: bool,
    sockets: BTreeMap<RawSocket, MockSocket>,
    next_socket: RawSocket,
    windows: BTreeMap<RawWindow, MockWindow>,
    next_window: RawWindow,
    failures: BTreeMap<CapabilityId, i64>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose configuration already holds `entries`.
    pub fn with_config<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: Into<String>,
    {
        let mut host = Self::new();
        for (key, value) in entries {
            host.config.insert(key.into(), value);
        }
        host
    }

    /// Make `capability` return `code` until [`MockHost::recover`].
    pub fn fail(&mut self, capability: CapabilityId, code: i64) {
        self.failures.insert(capability, code);
    }

    pub fn recover(&mut self, capability: CapabilityId) {
        self.failures.remove(&capability);
    }

    pub fn set_config(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.config.insert(key.into(), value);
    }

    /// Queue an inbound datagram or stream chunk on a socket.
    pub fn deliver(&mut self, socket: RawSocket, data: &[u8]) {
        if let Some(s) = self.sockets.get_mut(&socket) {
            s.inbox.push_back(data.to_vec());
        }
    }

    pub fn log_records(&self) -> &[LogRecord] {
        &self.logs
    }

    /// Log text reassembled across records and split at terminators.
    pub fn log_lines(&self) -> Vec<String> {
        let joined: Vec<u8> = self.logs.iter().flat_map(|r| r.bytes.iter().copied()).collect();
        joined
            .split(|&b| b == crate::relay::TERMINATOR)
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Returns true if any complete log line contains `needle`.
    pub fn logged(&self, needle: &str) -> bool {
        self.log_lines().iter().any(|line| line.contains(needle))
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Number of calls made to `capability`.
    pub fn call_count(&self, capability: CapabilityId) -> usize {
        self.calls.iter().filter(|c| c.capability == capability).count()
    }

    /// Every call keyed by `handle`, in order.
    pub fn calls_with_handle(&self, handle: i64) -> Vec<CapabilityId> {
        self.calls
            .iter()
            .filter(|c| c.handle == Some(handle))
            .map(|c| c.capability)
            .collect()
    }

    pub fn config_value(&self, key: &str) -> Option<&ConfigValue> {
        self.config.get(key)
    }

    pub fn deleted_keys(&self) -> &[String] {
        &self.deleted_keys
    }

    pub fn volume(&self) -> Option<i32> {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn socket(&self, socket: RawSocket) -> Option<&MockSocket> {
        self.sockets.get(&socket)
    }

    pub fn window(&self, window: RawWindow) -> Option<&MockWindow> {
        self.windows.get(&window)
    }

    /// Sockets that have not been shut down.
    pub fn open_sockets(&self) -> usize {
        self.sockets.values().filter(|s| s.open).count()
    }

    /// Windows that have not been destroyed.
    pub fn open_windows(&self) -> usize {
        self.windows.values().filter(|w| w.open).count()
    }

    fn record(&mut self, capability: CapabilityId, handle: Option<i64>) -> Option<i64> {
        self.calls.push(HostCall { capability, handle });
        self.failures.get(&capability).copied()
    }

    fn create_socket(&mut self, kind: SocketKind, bind: Option<&str>) -> RawSocket {
        let socket = self.next_socket;
        self.next_socket += 1;
        self.sockets.insert(
            socket,
            MockSocket {
                kind: Some(kind),
                bind: bind.map(String::from),
                open: true,
                ..MockSocket::default()
            },
        );
        socket
    }

    fn open_socket(&mut self, socket: RawSocket, kind: SocketKind) -> Option<&mut MockSocket> {
        self.sockets
            .get_mut(&socket)
            .filter(|s| s.open && s.kind == Some(kind))
    }

    fn connect(&mut self, id: CapabilityId, kind: SocketKind, socket: RawSocket, remote: &str) -> i32 {
        if let Some(code) = self.record(id, Some(i64::from(socket))) {
            return code as i32;
        }
        match self.open_socket(socket, kind) {
            Some(s) => {
                s.remote = Some(String::from(remote));
                0
            }
            None => -1,
        }
    }

    fn send(&mut self, id: CapabilityId, kind: SocketKind, socket: RawSocket, data: &[u8]) -> i64 {
        if let Some(code) = self.record(id, Some(i64::from(socket))) {
            return code;
        }
        match self.open_socket(socket, kind) {
            Some(s) if s.remote.is_some() => {
                s.sent.push(data.to_vec());
                data.len() as i64
            }
            _ => -1,
        }
    }

    fn recv(&mut self, id: CapabilityId, kind: SocketKind, socket: RawSocket, buffer: &mut [u8]) -> i64 {
        if let Some(code) = self.record(id, Some(i64::from(socket))) {
            return code;
        }
        let Some(s) = self.open_socket(socket, kind) else {
            return -1;
        };
        match s.inbox.pop_front() {
            Some(data) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                n as i64
            }
            None => 0,
        }
    }

    fn shutdown(&mut self, id: CapabilityId, kind: SocketKind, socket: RawSocket) -> i32 {
        if let Some(code) = self.record(id, Some(i64::from(socket))) {
            return code as i32;
        }
        match self.open_socket(socket, kind) {
            Some(s) => {
                s.open = false;
                0
            }
            None => -1,
        }
    }

    fn open_window(&mut self, window: RawWindow) -> Option<&mut MockWindow> {
        self.windows.get_mut(&window).filter(|w| w.open)
    }
}

impl HostCapabilities for MockHost {
    fn log(&mut self, level: Level, record: &[u8]) {
        self.calls.push(HostCall {
            capability: level.capability(),
            handle: None,
        });
        self.logs.push(LogRecord {
            level,
            bytes: record.to_vec(),
        });
    }

    fn config_get(&mut self, key: &str) -> Option<ConfigValue> {
        self.record(CapabilityId::ConfigGet, None);
        let value = self.config.get(key).cloned();
        if value.is_some() {
            // The bridge releases every non-null buffer it receives.
            self.record(CapabilityId::ConfigRelease, None);
        }
        value
    }

    fn config_delete(&mut self, key: &str) {
        self.record(CapabilityId::ConfigDelete, None);
        self.config.remove(key);
        self.deleted_keys.push(String::from(key));
    }

    fn audio_set_volume(&mut self, level: i32) {
        self.record(CapabilityId::AudioSetVolume, None);
        self.volume = Some(level);
    }

    fn audio_mute(&mut self, muted: bool) {
        self.record(CapabilityId::AudioMute, None);
        self.muted = muted;
    }

    fn udp_create(&mut self, bind: &str) -> RawSocket {
        if let Some(code) = self.record(CapabilityId::UdpCreate, None) {
            return code as RawSocket;
        }
        self.create_socket(SocketKind::Udp, Some(bind))
    }

    fn udp_connect(&mut self, socket: RawSocket, remote: &str) -> i32 {
        self.connect(CapabilityId::UdpConnect, SocketKind::Udp, socket, remote)
    }

    fn udp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64 {
        self.send(CapabilityId::UdpSend, SocketKind::Udp, socket, data)
    }

    fn udp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64 {
        self.recv(CapabilityId::UdpRecv, SocketKind::Udp, socket, buffer)
    }

    fn udp_shutdown(&mut self, socket: RawSocket) -> i32 {
        self.shutdown(CapabilityId::UdpShutdown, SocketKind::Udp, socket)
    }

    fn tcp_create(&mut self) -> RawSocket {
        if let Some(code) = self.record(CapabilityId::TcpCreate, None) {
            return code as RawSocket;
        }
        self.create_socket(SocketKind::Tcp, None)
    }

    fn tcp_connect(&mut self, socket: RawSocket, remote: &str) -> i32 {
        self.connect(CapabilityId::TcpConnect, SocketKind::Tcp, socket, remote)
    }

    fn tcp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64 {
        self.send(CapabilityId::TcpSend, SocketKind::Tcp, socket, data)
    }

    fn tcp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64 {
        self.recv(CapabilityId::TcpRecv, SocketKind::Tcp, socket, buffer)
    }

    fn tcp_shutdown(&mut self, socket: RawSocket) -> i32 {
        self.shutdown(CapabilityId::TcpShutdown, SocketKind::Tcp, socket)
    }

    fn create_window(&mut self, id: &str, layer: &WindowLayer, width: u32, height: u32) -> RawWindow {
        if let Some(code) = self.record(CapabilityId::WindowCreate, None) {
            return code;
        }
        let window = self.next_window;
        self.next_window += 1;
        self.windows.insert(
            window,
            MockWindow {
                id: String::from(id),
                layer: layer.clone(),
                title: layer.title().map(String::from),
                size: (width, height),
                position: (0, 0),
                visible: true,
                frames: Vec::new(),
                open: true,
            },
        );
        window
    }

    fn destroy_window(&mut self, window: RawWindow) {
        self.record(CapabilityId::WindowDestroy, Some(window));
        if let Some(w) = self.open_window(window) {
            w.open = false;
        }
    }

    fn set_window_title(&mut self, window: RawWindow, title: &str) {
        self.record(CapabilityId::WindowSetTitle, Some(window));
        if let Some(w) = self.open_window(window) {
            w.title = Some(String::from(title));
        }
    }

    fn resize_window(&mut self, window: RawWindow, width: u32, height: u32) {
        self.record(CapabilityId::WindowResize, Some(window));
        if let Some(w) = self.open_window(window) {
            w.size = (width, height);
        }
    }

    fn move_window(&mut self, window: RawWindow, x: i32, y: i32) {
        self.record(CapabilityId::WindowMove, Some(window));
        if let Some(w) = self.open_window(window) {
            w.position = (x, y);
        }
    }

    fn set_window_visibility(&mut self, window: RawWindow, visible: bool) {
        self.record(CapabilityId::WindowSetVisibility, Some(window));
        if let Some(w) = self.open_window(window) {
            w.visible = visible;
        }
    }

    fn push_draw_command(&mut self, window: RawWindow, pool: &CommandPool) {
        self.record(CapabilityId::PushDrawCommand, Some(window));
        if let Some(w) = self.open_window(window) {
            w.frames.push(pool.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_primitives::{Bounds, Color, DrawCommand, Stroke};

    #[test]
    fn test_udp_round_trip_through_mock() {
        let mut host = MockHost::new();
        let s = host.udp_create("127.0.0.1:12345");
        assert!(s >= 0);
        assert_eq!(host.udp_send(s, b"early"), -1, "send before connect");
        assert_eq!(host.udp_connect(s, "127.0.0.1:12346"), 0);
        assert_eq!(host.udp_send(s, b"Hello"), 5);

        host.deliver(s, b"pong!");
        let mut buf = [0u8; 3];
        assert_eq!(host.udp_recv(s, &mut buf), 3);
        assert_eq!(&buf, b"pon");
        assert_eq!(host.udp_recv(s, &mut buf), 0);

        assert_eq!(host.udp_shutdown(s), 0);
        assert_eq!(host.udp_shutdown(s), -1);
        assert_eq!(host.open_sockets(), 0);
    }

    #[test]
    fn test_socket_kinds_do_not_mix() {
        let mut host = MockHost::new();
        let tcp = host.tcp_create();
        assert_eq!(host.udp_connect(tcp, "127.0.0.1:1"), -1);
        assert_eq!(host.tcp_connect(tcp, "127.0.0.1:1"), 0);
        assert_eq!(host.socket(tcp).unwrap().bind, None);
    }

    #[test]
    fn test_injected_failure_is_returned() {
        let mut host = MockHost::new();
        host.fail(CapabilityId::UdpCreate, -7);
        assert_eq!(host.udp_create("0.0.0.0:0"), -7);
        assert_eq!(host.open_sockets(), 0);
        host.recover(CapabilityId::UdpCreate);
        assert!(host.udp_create("0.0.0.0:0") >= 0);
    }

    #[test]
    fn test_config_get_and_delete() {
        let mut host = MockHost::with_config([("audio.volume", ConfigValue::Integer(40))]);
        assert_eq!(host.config_get("audio.volume"), Some(ConfigValue::Integer(40)));
        assert_eq!(host.call_count(CapabilityId::ConfigRelease), 1);
        assert_eq!(host.config_get("missing"), None);
        assert_eq!(host.call_count(CapabilityId::ConfigRelease), 1);

        host.config_delete("audio.volume");
        assert!(host.config_value("audio.volume").is_none());
        assert_eq!(host.deleted_keys(), ["audio.volume"]);

        host.set_config("audio.muted", ConfigValue::Boolean(true));
        assert_eq!(host.config_get("audio.muted"), Some(ConfigValue::Boolean(true)));
    }

    #[test]
    fn test_windows_collect_frames_until_destroyed() {
        let mut host = MockHost::new();
        let w = host.create_window("main", &WindowLayer::desktop("Demo"), 800, 600);
        let mut pool = CommandPool::new();
        pool.push(DrawCommand::Rect {
            bounds: Bounds::new(0.0, 0.0, 10.0, 10.0),
            color: Color::WHITE,
            stroke: Stroke::NONE,
        });
        host.push_draw_command(w, &pool);
        host.move_window(w, 5, 6);
        host.destroy_window(w);
        host.push_draw_command(w, &pool);

        let window = host.window(w).unwrap();
        assert_eq!(window.frames.len(), 1);
        assert_eq!(window.position, (5, 6));
        assert_eq!(window.title.as_deref(), Some("Demo"));
        assert_eq!(host.open_windows(), 0);
        assert_eq!(host.calls_with_handle(w).len(), 4);
    }

    #[test]
    fn test_log_lines_reassemble_split_records() {
        let mut host = MockHost::new();
        host.log(Level::Info, b"abc");
        host.log(Level::Info, b"def\0");
        host.log(Level::Warn, b"next\0");
        assert_eq!(host.log_lines(), ["abcdef", "next"]);
        assert!(host.logged("cde"));
        assert_eq!(host.call_count(CapabilityId::LogWarn), 1);
    }
}
