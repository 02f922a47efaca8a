//! Host capability imports.
//!
//! Every capability is imported under the `env` WASM module with the
//! signature recorded in `fusion_primitives::CAPABILITY_TABLE`. Pointers
//! are guest linear-memory addresses passed as `i32`.

#[link(wasm_import_module = "env")]
extern "C" {
    // ── Logging ──

    /// Message bytes, terminator included when the record ends a message.
    pub fn nms_log_info(msg_ptr: i32, msg_len: i32);
    pub fn nms_log_warn(msg_ptr: i32, msg_len: i32);
    pub fn nms_log_error(msg_ptr: i32, msg_len: i32);

    // ── Configuration ──

    /// Look up a key. Returns a host-owned buffer holding an encoded
    /// `ConfigValue` and writes its length to `*out_len_ptr`, or returns 0
    /// if the key does not exist. The buffer must be handed back with
    /// `nms_config_release`.
    pub fn nms_config_get(key_ptr: i32, key_len: i32, out_len_ptr: i32) -> i32;

    pub fn nms_config_release(ptr: i32, len: i32);

    pub fn nms_config_delete(key_ptr: i32, key_len: i32);

    // ── Audio ──

    pub fn nms_audio_set_volume(volume: i32);

    pub fn nms_audio_mute(enable: i32);

    // ── UDP ──

    /// Negative on failure; otherwise the socket id.
    pub fn nms_net_socket_udp_create(bind_ptr: i32, bind_len: i32) -> i32;
    pub fn nms_net_socket_udp_connect(id: i32, addr_ptr: i32, addr_len: i32) -> i32;
    pub fn nms_net_socket_udp_send(id: i32, data_ptr: i32, length: i64) -> i64;
    pub fn nms_net_socket_udp_recv(id: i32, buffer_ptr: i32, length: i64) -> i64;
    pub fn nms_net_socket_udp_shutdown(id: i32) -> i32;

    // ── TCP ──

    pub fn nms_net_socket_tcp_create() -> i32;
    pub fn nms_net_socket_tcp_connect(id: i32, addr_ptr: i32, addr_len: i32) -> i32;
    pub fn nms_net_socket_tcp_send(id: i32, data_ptr: i32, length: i64) -> i64;
    pub fn nms_net_socket_tcp_recv(id: i32, buffer_ptr: i32, length: i64) -> i64;
    pub fn nms_net_socket_tcp_shutdown(id: i32) -> i32;

    // ── Windowing ──

    /// `layer_ptr` points at an encoded `WindowLayer`. Returns a negative
    /// sentinel on failure.
    pub fn create_window(id_ptr: i32, id_len: i32, layer_ptr: i32, layer_len: i32, width: i32, height: i32) -> i64;
    pub fn destroy_window(window: i64);
    pub fn set_window_title(window: i64, title_ptr: i32, title_len: i32);
    pub fn resize_window(window: i64, width: i32, height: i32);
    pub fn move_window(window: i64, x: i32, y: i32);
    pub fn set_window_visibility(window: i64, visible: i32);

    // ── UI drawing ──

    /// `pool_ptr` points at an encoded `CommandPool`.
    pub fn push_draw_command(window: i64, pool_ptr: i32, pool_len: i32);
}
