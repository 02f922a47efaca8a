//! WASM host bridge: implements `HostCapabilities` by calling the imports.
//!
//! Each method marshals its arguments into `(ptr, len)` pairs of linear
//! memory, calls the import, and hands the raw result back. Interpreting
//! negative codes and sentinels is left to the engine's resource layer.
//! Structured payloads (window layers, command pools, config values) go
//! through `fusion_primitives::codec`.

use fusion_engine::{HostCapabilities, Level};
use fusion_primitives::codec::{decode_config_value, encode_command_pool, encode_window_layer};
use fusion_primitives::{CommandPool, ConfigValue, RawSocket, RawWindow, WindowLayer};

use crate::imports;

/// Bridges `HostCapabilities` to the `env` imports. Stateless.
pub struct WasmHost;

fn ptr(bytes: &[u8]) -> i32 {
    bytes.as_ptr() as i32
}

fn len(bytes: &[u8]) -> i32 {
    bytes.len() as i32
}

impl HostCapabilities for WasmHost {
    fn log(&mut self, level: Level, record: &[u8]) {
        unsafe {
            match level {
                Level::Info => imports::nms_log_info(ptr(record), len(record)),
                Level::Warn => imports::nms_log_warn(ptr(record), len(record)),
                Level::Error => imports::nms_log_error(ptr(record), len(record)),
            }
        }
    }

    fn config_get(&mut self, key: &str) -> Option<ConfigValue> {
        let mut out_len: i32 = 0;
        let data_ptr = unsafe {
            imports::nms_config_get(ptr(key.as_bytes()), len(key.as_bytes()), &mut out_len as *mut i32 as i32)
        };
        if data_ptr == 0 {
            return None;
        }

        let data = unsafe { core::slice::from_raw_parts(data_ptr as *const u8, out_len.max(0) as usize) };
        // An undecodable value is treated like a missing key.
        let value = decode_config_value(data).ok();

        // Release the host buffer whether or not it decoded.
        unsafe {
            imports::nms_config_release(data_ptr, out_len);
        }
        value
    }

    fn config_delete(&mut self, key: &str) {
        unsafe { imports::nms_config_delete(ptr(key.as_bytes()), len(key.as_bytes())) }
    }

    fn audio_set_volume(&mut self, level: i32) {
        unsafe { imports::nms_audio_set_volume(level) }
    }

    fn audio_mute(&mut self, muted: bool) {
        unsafe { imports::nms_audio_mute(i32::from(muted)) }
    }

    fn udp_create(&mut self, bind: &str) -> RawSocket {
        unsafe { imports::nms_net_socket_udp_create(ptr(bind.as_bytes()), len(bind.as_bytes())) }
    }

    fn udp_connect(&mut self, socket: RawSocket, remote: &str) -> i32 {
        unsafe { imports::nms_net_socket_udp_connect(socket, ptr(remote.as_bytes()), len(remote.as_bytes())) }
    }

    fn udp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64 {
        unsafe { imports::nms_net_socket_udp_send(socket, ptr(data), data.len() as i64) }
    }

    fn udp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64 {
        unsafe { imports::nms_net_socket_udp_recv(socket, buffer.as_mut_ptr() as i32, buffer.len() as i64) }
    }

    fn udp_shutdown(&mut self, socket: RawSocket) -> i32 {
        unsafe { imports::nms_net_socket_udp_shutdown(socket) }
    }

    fn tcp_create(&mut self) -> RawSocket {
        unsafe { imports::nms_net_socket_tcp_create() }
    }

    fn tcp_connect(&mut self, socket: RawSocket, remote: &str) -> i32 {
        unsafe { imports::nms_net_socket_tcp_connect(socket, ptr(remote.as_bytes()), len(remote.as_bytes())) }
    }

    fn tcp_send(&mut self, socket: RawSocket, data: &[u8]) -> i64 {
        unsafe { imports::nms_net_socket_tcp_send(socket, ptr(data), data.len() as i64) }
    }

    fn tcp_recv(&mut self, socket: RawSocket, buffer: &mut [u8]) -> i64 {
        unsafe { imports::nms_net_socket_tcp_recv(socket, buffer.as_mut_ptr() as i32, buffer.len() as i64) }
    }

    fn tcp_shutdown(&mut self, socket: RawSocket) -> i32 {
        unsafe { imports::nms_net_socket_tcp_shutdown(socket) }
    }

    fn create_window(&mut self, id: &str, layer: &WindowLayer, width: u32, height: u32) -> RawWindow {
        let encoded = encode_window_layer(layer);
        unsafe {
            imports::create_window(
                ptr(id.as_bytes()),
                len(id.as_bytes()),
                ptr(&encoded),
                len(&encoded),
                width as i32,
                height as i32,
            )
        }
    }

    fn destroy_window(&mut self, window: RawWindow) {
        unsafe { imports::destroy_window(window) }
    }

    fn set_window_title(&mut self, window: RawWindow, title: &str) {
        unsafe { imports::set_window_title(window, ptr(title.as_bytes()), len(title.as_bytes())) }
    }

    fn resize_window(&mut self, window: RawWindow, width: u32, height: u32) {
        unsafe { imports::resize_window(window, width as i32, height as i32) }
    }

    fn move_window(&mut self, window: RawWindow, x: i32, y: i32) {
        unsafe { imports::move_window(window, x, y) }
    }

    fn set_window_visibility(&mut self, window: RawWindow, visible: bool) {
        unsafe { imports::set_window_visibility(window, i32::from(visible)) }
    }

    fn push_draw_command(&mut self, window: RawWindow, pool: &CommandPool) {
        let encoded = encode_command_pool(pool);
        unsafe { imports::push_draw_command(window, ptr(&encoded), len(&encoded)) }
    }
}
