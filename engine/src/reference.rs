//! The reference module shipped in the guest.
//!
//! On init it greets the host log, opens a UDP endpoint and sends a
//! greeting to its peer, reserves a receive buffer in the arena, and opens a
//! desktop window. Every tick it drains one datagram into the buffer and
//! renders its widget tree into the window. Any capability that fails during
//! setup is logged and left out; later ticks and stop never touch it.

use alloc::vec;
use alloc::vec::Vec;
use core::ptr::NonNull;

use fusion_primitives::codec::{self, Reader};
use fusion_primitives::{
    Bounds, Color, CommandPool, ModuleError, ModuleResult, SnapshotFault, Texture, TextureHandle, Vec2, WindowLayer,
};

use crate::capabilities::{SocketHandle, WindowHandle};
use crate::controller::{ModuleContext, ModuleLogic};
use crate::host::HostCapabilities;
use crate::widget::{Image, Label, Panel, UiEvent, Widget};
use crate::{log_info, log_warn};

pub const GREETING: &[u8] = b"Hello, World!";

/// Size of the arena-held receive buffer.
pub const RECV_BUFFER_LEN: usize = 512;

pub const WINDOW_ID: &str = "main";

const PAYLOAD_LEN: usize = 24;

/// State of the reference module.
pub struct ExampleModule {
    socket: Option<SocketHandle>,
    window: Option<WindowHandle>,
    recv_buffer: Option<NonNull<u8>>,
    ui: Widget,
    pool: CommandPool,
    bytes_received: u64,
    datagrams_sent: u64,
    frames_rendered: u64,
}

impl Default for ExampleModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ExampleModule {
    pub fn new() -> Self {
        let ui = Widget::Panel(Panel::new(
            Color::rgba(30, 30, 36, 255),
            vec![
                Widget::Label(Label::new("Hello from a Fusion module", 18, Color::WHITE)),
                Widget::Label(Label::tick_counter("Ticks: ", 14, Color::rgba(180, 180, 190, 255))),
                Widget::Image(Image::new(
                    Texture {
                        color: Color::WHITE,
                        handle: TextureHandle::Svg {
                            id: 1,
                            width: 64,
                            height: 64,
                        },
                    },
                    Vec2::new(64.0, 64.0),
                )),
            ],
        ));
        Self {
            socket: None,
            window: None,
            recv_buffer: None,
            ui,
            pool: CommandPool::new(),
            bytes_received: 0,
            datagrams_sent: 0,
            frames_rendered: 0,
        }
    }

    pub fn socket(&self) -> Option<SocketHandle> {
        self.socket
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.window
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Forward a UI event to the widget tree.
    pub fn handle_event(&mut self, event: &UiEvent) -> bool {
        self.ui.handle_event(event)
    }

    fn degrade<H: HostCapabilities>(ctx: &mut ModuleContext<H>, what: &str, err: &ModuleError) {
        ctx.counters.setup_errors += 1;
        ctx.report(what, err);
    }

    fn open_socket<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        let socket = ctx.resources.udp_open(&mut ctx.host, &ctx.config.udp_bind)?;
        ctx.resources.connect(&mut ctx.host, socket, &ctx.config.udp_remote)?;
        // Only a connected socket is kept.
        self.socket = Some(socket);
        let sent = ctx.resources.send(&mut ctx.host, socket, GREETING);
        match sent {
            Ok(n) => {
                self.datagrams_sent += 1;
                let remote = ctx.config.udp_remote.clone();
                log_info!(ctx, "sent {} bytes to {}", n, remote);
                Ok(())
            }
            Err(err) => {
                self.socket = None;
                Err(err)
            }
        }
    }

    fn open_window<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        let (width, height) = ctx.config.window_size;
        let layer = WindowLayer::desktop(ctx.config.window_title.clone());
        let window = ctx.resources.open_window(&mut ctx.host, WINDOW_ID, &layer, width, height)?;
        self.window = Some(window);
        self.ui.layout(Bounds::new(0.0, 0.0, width as f32, height as f32));
        Ok(())
    }

    fn receive<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        let (Some(socket), Some(buffer)) = (self.socket, self.recv_buffer) else {
            return Ok(());
        };
        let block = ctx
            .arena
            .as_mut()
            .and_then(|arena| arena.block_mut(buffer))
            .ok_or(ModuleError::AllocationFailure { requested: RECV_BUFFER_LEN })?;
        let len = block.len().min(RECV_BUFFER_LEN);
        match ctx.resources.recv(&mut ctx.host, socket, &mut block[..len]) {
            Ok(0) => Ok(()),
            Ok(n) => {
                self.bytes_received += n as u64;
                log_info!(ctx, "received {} bytes", n);
                Ok(())
            }
            Err(err) => {
                self.socket = None;
                Err(err)
            }
        }
    }

    fn render<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        if self.ui.update(ctx.counters.ticks) {
            let (width, height) = ctx.config.window_size;
            self.ui.layout(Bounds::new(0.0, 0.0, width as f32, height as f32));
        }
        let Some(window) = self.window else {
            return Ok(());
        };
        self.pool.clear();
        self.ui.collect_render(&mut self.pool);
        match ctx.resources.submit(&mut ctx.host, window, &self.pool) {
            Ok(()) => {
                self.frames_rendered += 1;
                Ok(())
            }
            Err(err) => {
                self.window = None;
                Err(err)
            }
        }
    }
}

impl ModuleLogic for ExampleModule {
    fn setup<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        log_info!(ctx, "Module init");

        if let Err(err) = self.open_socket(ctx) {
            Self::degrade(ctx, "udp", &err);
        }
        match ctx.alloc(RECV_BUFFER_LEN) {
            Ok(buffer) => self.recv_buffer = Some(buffer),
            Err(err) => Self::degrade(ctx, "receive buffer", &err),
        }
        if let Err(err) = self.open_window(ctx) {
            Self::degrade(ctx, "window", &err);
        }
        Ok(())
    }

    fn tick<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        let received = self.receive(ctx);
        let rendered = self.render(ctx);
        received.and(rendered)
    }

    fn teardown<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) {
        if let Some(buffer) = self.recv_buffer.take() {
            if let Err(err) = ctx.free(buffer) {
                ctx.report("receive buffer", &err);
            }
        }
        if let Some(window) = self.window.take() {
            if let Err(err) = ctx.resources.destroy_window(&mut ctx.host, window) {
                ctx.report("window", &err);
            }
        }
        if let Some(socket) = self.socket.take() {
            if let Err(err) = ctx.resources.shutdown(&mut ctx.host, socket) {
                log_warn!(ctx, "udp shutdown: {}", err);
            }
        }
        self.ui.destroy();
        log_info!(ctx, "Module stopped");
    }

    fn save(&self, out: &mut Vec<u8>) {
        codec::write_u64(out, self.bytes_received);
        codec::write_u64(out, self.datagrams_sent);
        codec::write_u64(out, self.frames_rendered);
    }

    fn load(&mut self, payload: &[u8]) -> ModuleResult<()> {
        if payload.len() != PAYLOAD_LEN {
            return Err(SnapshotFault::InvalidField.into());
        }
        let mut r = Reader::new(payload);
        let bytes_received = r.read_u64()?;
        let datagrams_sent = r.read_u64()?;
        let frames_rendered = r.read_u64()?;
        r.finish()?;

        self.bytes_received = bytes_received;
        self.datagrams_sent = datagrams_sent;
        self.frames_rendered = frames_rendered;
        Ok(())
    }
}
