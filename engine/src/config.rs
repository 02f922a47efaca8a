//! Module configuration.
//!
//! `ModuleConfig` carries the compiled-in defaults. At init the controller
//! lets the host override some of them through the configuration
//! capability; keys the host does not know keep their defaults.

use alloc::string::String;
use alloc::vec::Vec;

use fusion_primitives::{ConfigValue, ModuleError, ModuleResult, DEFAULT_HEAP_CAPACITY, LOG_BUFFER_CAPACITY};

use crate::host::HostCapabilities;

pub const KEY_HEAP_CAPACITY: &str = "module.heap_capacity";
pub const KEY_NET_BIND: &str = "net.bind";
pub const KEY_NET_REMOTE: &str = "net.remote";
/// One-shot: consumed with `config_delete` once applied.
pub const KEY_AUDIO_VOLUME: &str = "audio.volume";

/// Static configuration of one guest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Name the module identifies itself with. Snapshots are bound to it.
    pub module_name: String,

    /// Arena capacity requested at init.
    /// Default: 1 MiB
    pub heap_capacity: usize,

    /// Logging relay buffer size, terminator slot included.
    /// Default: 1024
    pub log_buffer_capacity: usize,

    /// Local UDP endpoint.
    /// Default: "127.0.0.1:12345"
    pub udp_bind: String,

    /// Remote UDP endpoint.
    /// Default: "127.0.0.1:12346"
    pub udp_remote: String,

    /// Title of the desktop window.
    pub window_title: String,

    /// Initial window size in pixels.
    /// Default: 800x600
    pub window_size: (u32, u32),

    /// Volume to apply at init, if the host asked for one.
    pub volume: Option<i32>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module_name: String::from("fusion.example"),
            heap_capacity: DEFAULT_HEAP_CAPACITY,
            log_buffer_capacity: LOG_BUFFER_CAPACITY,
            udp_bind: String::from("127.0.0.1:12345"),
            udp_remote: String::from("127.0.0.1:12346"),
            window_title: String::from("C Module Example"),
            window_size: (800, 600),
            volume: None,
        }
    }
}

impl ModuleConfig {
    /// Apply host overrides.
    ///
    /// Missing keys are skipped. Keys holding the wrong variant are skipped
    /// too and reported in the returned list; one bad key never stops the
    /// others from applying.
    pub fn apply_overrides<H>(&mut self, host: &mut H) -> Vec<ModuleError>
    where
        H: HostCapabilities + ?Sized,
    {
        let mut errors = Vec::new();

        match optional(host, KEY_HEAP_CAPACITY, ConfigValue::as_u32) {
            Ok(Some(v)) => self.heap_capacity = v as usize,
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
        match optional(host, KEY_NET_BIND, |v| v.as_str().map(String::from)) {
            Ok(Some(v)) => self.udp_bind = v,
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
        match optional(host, KEY_NET_REMOTE, |v| v.as_str().map(String::from)) {
            Ok(Some(v)) => self.udp_remote = v,
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
        match take(host, KEY_AUDIO_VOLUME) {
            Ok(value) => match value.as_i32() {
                Some(v) => self.volume = Some(v),
                None => errors.push(type_error(KEY_AUDIO_VOLUME)),
            },
            Err(ModuleError::ConfigMissing { .. }) => {}
            Err(e) => errors.push(e),
        }
        errors
    }
}

fn type_error(key: &str) -> ModuleError {
    ModuleError::ConfigType { key: String::from(key) }
}

/// Fetch a value. A null return becomes [`ModuleError::ConfigMissing`].
pub fn get<H>(host: &mut H, key: &str) -> ModuleResult<ConfigValue>
where
    H: HostCapabilities + ?Sized,
{
    host.config_get(key).ok_or_else(|| ModuleError::ConfigMissing {
        key: String::from(key),
    })
}

/// Fetch a value and delete the key.
pub fn take<H>(host: &mut H, key: &str) -> ModuleResult<ConfigValue>
where
    H: HostCapabilities + ?Sized,
{
    let value = get(host, key)?;
    host.config_delete(key);
    Ok(value)
}

/// Fetch and convert a value that may be absent.
pub fn optional<H, T>(host: &mut H, key: &str, convert: impl FnOnce(&ConfigValue) -> Option<T>) -> ModuleResult<Option<T>>
where
    H: HostCapabilities + ?Sized,
{
    match host.config_get(key) {
        None => Ok(None),
        Some(value) => convert(&value).map(Some).ok_or_else(|| type_error(key)),
    }
}
