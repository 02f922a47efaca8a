//! Typed capability layer over [`HostCapabilities`].
//!
//! Raw socket and window values returned by the host never leave this
//! module. Callers hold generation-tagged handles instead, and every
//! failure convention of the capability table is enforced here:
//!
//! - a negative create result yields an error and no handle
//! - a negative result from any keyed socket operation invalidates the socket
//! - shutdown and destroy invalidate the handle whatever the host answers
//! - a stale handle is rejected before the host is called

use alloc::string::String;
use alloc::vec::Vec;

use fusion_primitives::types::{is_socket_failure, is_window_failure};
use fusion_primitives::{
    CapabilityId, CommandPool, ModuleError, ModuleResult, RawSocket, RawWindow, WindowLayer,
};

use crate::handles::{Handle, HandleTable};
use crate::host::HostCapabilities;

/// Transport of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    fn connect_id(self) -> CapabilityId {
        match self {
            Self::Udp => CapabilityId::UdpConnect,
            Self::Tcp => CapabilityId::TcpConnect,
        }
    }

    fn send_id(self) -> CapabilityId {
        match self {
            Self::Udp => CapabilityId::UdpSend,
            Self::Tcp => CapabilityId::TcpSend,
        }
    }

    fn recv_id(self) -> CapabilityId {
        match self {
            Self::Udp => CapabilityId::UdpRecv,
            Self::Tcp => CapabilityId::TcpRecv,
        }
    }

    fn shutdown_id(self) -> CapabilityId {
        match self {
            Self::Udp => CapabilityId::UdpShutdown,
            Self::Tcp => CapabilityId::TcpShutdown,
        }
    }
}

/// A live host socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socket {
    pub transport: Transport,
    raw: RawSocket,
    pub remote: Option<String>,
}

impl Socket {
    pub fn raw(&self) -> RawSocket {
        self.raw
    }
}

/// A live host window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: String,
    raw: RawWindow,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
}

impl Window {
    pub fn raw(&self) -> RawWindow {
        self.raw
    }
}

pub type SocketHandle = Handle<Socket>;
pub type WindowHandle = Handle<Window>;

/// Kind of resource behind a [`ResourceRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceKind {
    Udp = 0,
    Tcp = 1,
    Window = 2,
}

impl ResourceKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Udp),
            1 => Some(Self::Tcp),
            2 => Some(Self::Window),
            _ => None,
        }
    }
}

/// A live resource as recorded in a snapshot: handle plus host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub handle: u64,
    pub raw: i64,
}

/// Every host resource the module currently holds.
#[derive(Default)]
pub struct Resources {
    sockets: HandleTable<Socket>,
    windows: HandleTable<Window>,
}

fn check_socket_result(capability: CapabilityId, code: i64) -> ModuleResult<i64> {
    if is_socket_failure(code) {
        return Err(ModuleError::CapabilityFailure { capability, code });
    }
    Ok(code)
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Sockets ──

    /// Create a UDP socket bound to `bind`.
    pub fn udp_open<H>(&mut self, host: &mut H, bind: &str) -> ModuleResult<SocketHandle>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = host.udp_create(bind);
        check_socket_result(CapabilityId::UdpCreate, i64::from(raw))?;
        Ok(self.sockets.insert(Socket {
            transport: Transport::Udp,
            raw,
            remote: None,
        }))
    }

    pub fn tcp_open<H>(&mut self, host: &mut H) -> ModuleResult<SocketHandle>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = host.tcp_create();
        check_socket_result(CapabilityId::TcpCreate, i64::from(raw))?;
        Ok(self.sockets.insert(Socket {
            transport: Transport::Tcp,
            raw,
            remote: None,
        }))
    }

    pub fn socket(&self, handle: SocketHandle) -> Option<&Socket> {
        self.sockets.get(handle)
    }

    fn live_socket(&self, handle: SocketHandle, pick: fn(Transport) -> CapabilityId) -> ModuleResult<(Transport, RawSocket)> {
        match self.sockets.get(handle) {
            Some(s) => Ok((s.transport, s.raw)),
            // The transport of a stale handle is unknown; report it as UDP.
            None => Err(ModuleError::StaleHandle {
                capability: pick(Transport::Udp),
            }),
        }
    }

    /// Drop a socket after a failed keyed operation.
    fn invalidate<T>(&mut self, handle: SocketHandle, result: ModuleResult<T>) -> ModuleResult<T> {
        if result.is_err() {
            self.sockets.remove(handle);
        }
        result
    }

    pub fn connect<H>(&mut self, host: &mut H, handle: SocketHandle, remote: &str) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let (transport, raw) = self.live_socket(handle, Transport::connect_id)?;
        let code = match transport {
            Transport::Udp => host.udp_connect(raw, remote),
            Transport::Tcp => host.tcp_connect(raw, remote),
        };
        let result = check_socket_result(transport.connect_id(), i64::from(code));
        self.invalidate(handle, result)?;
        if let Some(s) = self.sockets.get_mut(handle) {
            s.remote = Some(String::from(remote));
        }
        Ok(())
    }

    /// Send `data`, returning the number of bytes the host accepted.
    pub fn send<H>(&mut self, host: &mut H, handle: SocketHandle, data: &[u8]) -> ModuleResult<usize>
    where
        H: HostCapabilities + ?Sized,
    {
        let (transport, raw) = self.live_socket(handle, Transport::send_id)?;
        let code = match transport {
            Transport::Udp => host.udp_send(raw, data),
            Transport::Tcp => host.tcp_send(raw, data),
        };
        let result = check_socket_result(transport.send_id(), code);
        self.invalidate(handle, result).map(|n| n as usize)
    }

    /// Receive into `buffer`, returning the number of bytes written.
    pub fn recv<H>(&mut self, host: &mut H, handle: SocketHandle, buffer: &mut [u8]) -> ModuleResult<usize>
    where
        H: HostCapabilities + ?Sized,
    {
        let (transport, raw) = self.live_socket(handle, Transport::recv_id)?;
        let code = match transport {
            Transport::Udp => host.udp_recv(raw, buffer),
            Transport::Tcp => host.tcp_recv(raw, buffer),
        };
        let result = check_socket_result(transport.recv_id(), code);
        // Never report more than the buffer could hold.
        self.invalidate(handle, result).map(|n| (n as usize).min(buffer.len()))
    }

    /// Shut a socket down. The handle is invalid afterwards even on error.
    pub fn shutdown<H>(&mut self, host: &mut H, handle: SocketHandle) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let socket = self.sockets.remove(handle).ok_or(ModuleError::StaleHandle {
            capability: CapabilityId::UdpShutdown,
        })?;
        let code = match socket.transport {
            Transport::Udp => host.udp_shutdown(socket.raw),
            Transport::Tcp => host.tcp_shutdown(socket.raw),
        };
        check_socket_result(socket.transport.shutdown_id(), i64::from(code)).map(|_| ())
    }

    // ── Windows ──

    pub fn open_window<H>(
        &mut self,
        host: &mut H,
        id: &str,
        layer: &WindowLayer,
        width: u32,
        height: u32,
    ) -> ModuleResult<WindowHandle>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = host.create_window(id, layer, width, height);
        if is_window_failure(raw) {
            return Err(ModuleError::CapabilityFailure {
                capability: CapabilityId::WindowCreate,
                code: raw,
            });
        }
        Ok(self.windows.insert(Window {
            id: String::from(id),
            raw,
            width,
            height,
            visible: true,
        }))
    }

    pub fn window(&self, handle: WindowHandle) -> Option<&Window> {
        self.windows.get(handle)
    }

    fn live_window(&mut self, handle: WindowHandle, capability: CapabilityId) -> ModuleResult<&mut Window> {
        self.windows
            .get_mut(handle)
            .ok_or(ModuleError::StaleHandle { capability })
    }

    pub fn destroy_window<H>(&mut self, host: &mut H, handle: WindowHandle) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let window = self.windows.remove(handle).ok_or(ModuleError::StaleHandle {
            capability: CapabilityId::WindowDestroy,
        })?;
        host.destroy_window(window.raw);
        Ok(())
    }

    pub fn set_title<H>(&mut self, host: &mut H, handle: WindowHandle, title: &str) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = self.live_window(handle, CapabilityId::WindowSetTitle)?.raw;
        host.set_window_title(raw, title);
        Ok(())
    }

    pub fn resize<H>(&mut self, host: &mut H, handle: WindowHandle, width: u32, height: u32) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let window = self.live_window(handle, CapabilityId::WindowResize)?;
        window.width = width;
        window.height = height;
        host.resize_window(window.raw, width, height);
        Ok(())
    }

    pub fn move_to<H>(&mut self, host: &mut H, handle: WindowHandle, x: i32, y: i32) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = self.live_window(handle, CapabilityId::WindowMove)?.raw;
        host.move_window(raw, x, y);
        Ok(())
    }

    pub fn set_visible<H>(&mut self, host: &mut H, handle: WindowHandle, visible: bool) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let window = self.live_window(handle, CapabilityId::WindowSetVisibility)?;
        window.visible = visible;
        host.set_window_visibility(window.raw, visible);
        Ok(())
    }

    /// Submit one frame of draw commands.
    pub fn submit<H>(&mut self, host: &mut H, handle: WindowHandle, pool: &CommandPool) -> ModuleResult<()>
    where
        H: HostCapabilities + ?Sized,
    {
        let raw = self.live_window(handle, CapabilityId::PushDrawCommand)?.raw;
        host.push_draw_command(raw, pool);
        Ok(())
    }

    // ── Whole-set operations ──

    /// Shut down every socket and destroy every window.
    ///
    /// Returns how many resources were released and the errors the host
    /// reported along the way. Every handle is invalid afterwards.
    pub fn release_all<H>(&mut self, host: &mut H) -> (usize, Vec<ModuleError>)
    where
        H: HostCapabilities + ?Sized,
    {
        let mut errors = Vec::new();
        let mut released = 0;
        for (_, socket) in self.sockets.drain() {
            released += 1;
            let code = match socket.transport {
                Transport::Udp => host.udp_shutdown(socket.raw),
                Transport::Tcp => host.tcp_shutdown(socket.raw),
            };
            if let Err(e) = check_socket_result(socket.transport.shutdown_id(), i64::from(code)) {
                errors.push(e);
            }
        }
        for (_, window) in self.windows.drain() {
            released += 1;
            host.destroy_window(window.raw);
        }
        (released, errors)
    }

    /// Live resources in a stable order.
    pub fn references(&self) -> Vec<ResourceRef> {
        let sockets = self.sockets.iter().map(|(h, s)| ResourceRef {
            kind: match s.transport {
                Transport::Udp => ResourceKind::Udp,
                Transport::Tcp => ResourceKind::Tcp,
            },
            handle: h.to_raw(),
            raw: i64::from(s.raw),
        });
        let windows = self.windows.iter().map(|(h, w)| ResourceRef {
            kind: ResourceKind::Window,
            handle: h.to_raw(),
            raw: w.raw,
        });
        sockets.chain(windows).collect()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockHost;

    #[test]
    fn test_failed_create_yields_no_handle() {
        let mut host = MockHost::new();
        host.fail(CapabilityId::UdpCreate, -1);
        let mut res = Resources::new();
        let err = res.udp_open(&mut host, "127.0.0.1:12345").unwrap_err();
        assert_eq!(
            err,
            ModuleError::CapabilityFailure {
                capability: CapabilityId::UdpCreate,
                code: -1
            }
        );
        assert_eq!(res.socket_count(), 0);
        assert!(res.references().is_empty());
    }

    #[test]
    fn test_negative_keyed_result_invalidates_socket() {
        let mut host = MockHost::new();
        let mut res = Resources::new();
        let s = res.udp_open(&mut host, "127.0.0.1:12345").unwrap();
        res.connect(&mut host, s, "127.0.0.1:12346").unwrap();

        host.fail(CapabilityId::UdpSend, -5);
        assert!(matches!(
            res.send(&mut host, s, b"x"),
            Err(ModuleError::CapabilityFailure { code: -5, .. })
        ));
        let calls_before = host.calls().len();
        assert!(matches!(
            res.send(&mut host, s, b"x"),
            Err(ModuleError::StaleHandle { .. })
        ));
        assert_eq!(host.calls().len(), calls_before, "stale use reached the host");
    }

    #[test]
    fn test_send_and_recv() {
        let mut host = MockHost::new();
        let mut res = Resources::new();
        let s = res.udp_open(&mut host, "127.0.0.1:12345").unwrap();
        res.connect(&mut host, s, "127.0.0.1:12346").unwrap();
        assert_eq!(res.send(&mut host, s, b"Hello, World!").unwrap(), 13);
        assert_eq!(res.socket(s).unwrap().remote.as_deref(), Some("127.0.0.1:12346"));

        let raw = res.socket(s).unwrap().raw();
        host.deliver(raw, b"reply");
        let mut buf = [0u8; 16];
        assert_eq!(res.recv(&mut host, s, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"reply");
    }

    #[test]
    fn test_shutdown_invalidates_even_on_error() {
        let mut host = MockHost::new();
        let mut res = Resources::new();
        let s = res.tcp_open(&mut host).unwrap();
        host.fail(CapabilityId::TcpShutdown, -2);
        assert!(res.shutdown(&mut host, s).is_err());
        assert!(res.socket(s).is_none());
        assert!(matches!(
            res.shutdown(&mut host, s),
            Err(ModuleError::StaleHandle { .. })
        ));
    }

    #[test]
    fn test_window_sentinel_yields_no_handle() {
        let mut host = MockHost::new();
        host.fail(CapabilityId::WindowCreate, -1);
        let mut res = Resources::new();
        let layer = WindowLayer::desktop("x");
        assert!(res.open_window(&mut host, "main", &layer, 10, 10).is_err());
        assert_eq!(res.window_count(), 0);
    }

    #[test]
    fn test_destroyed_window_rejects_commands() {
        let mut host = MockHost::new();
        let mut res = Resources::new();
        let layer = WindowLayer::desktop("C Module Example");
        let w = res.open_window(&mut host, "main", &layer, 800, 600).unwrap();
        res.resize(&mut host, w, 640, 480).unwrap();
        res.set_visible(&mut host, w, false).unwrap();
        res.set_title(&mut host, w, "renamed").unwrap();
        res.move_to(&mut host, w, 40, -8).unwrap();
        let raw = res.window(w).unwrap().raw();
        assert_eq!(host.window(raw).unwrap().title.as_deref(), Some("renamed"));
        assert_eq!(host.window(raw).unwrap().position, (40, -8));
        assert_eq!(res.window(w).unwrap().width, 640);
        assert!(!res.window(w).unwrap().visible);

        res.destroy_window(&mut host, w).unwrap();
        let pool = CommandPool::new();
        assert_eq!(
            res.submit(&mut host, w, &pool),
            Err(ModuleError::StaleHandle {
                capability: CapabilityId::PushDrawCommand
            })
        );
        assert_eq!(host.call_count(CapabilityId::PushDrawCommand), 0);
    }

    #[test]
    fn test_release_all_clears_everything() {
        let mut host = MockHost::new();
        let mut res = Resources::new();
        res.udp_open(&mut host, "127.0.0.1:1").unwrap();
        res.tcp_open(&mut host).unwrap();
        let layer = WindowLayer::desktop("w");
        res.open_window(&mut host, "w", &layer, 1, 1).unwrap();
        assert_eq!(res.references().len(), 3);

        let (released, errors) = res.release_all(&mut host);
        assert_eq!(released, 3);
        assert!(errors.is_empty());
        assert_eq!(host.open_sockets(), 0);
        assert_eq!(host.open_windows(), 0);
        assert!(res.references().is_empty());
    }
}
