//! `fusion-primitives`: shared vocabulary for Fusion guest modules.
//!
//! This crate provides the error taxonomy, lifecycle states, the static
//! capability table, the window/draw/configuration payload types, and the
//! deterministic binary codec shared by the engine, the wasm guest, and
//! test hosts.
//!
//! Supports `#![no_std]` for wasm guest builds (use `default-features = false`).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod types;
pub mod error;
pub mod state;
pub mod capability;
pub mod window;
pub mod draw;
pub mod config;
pub mod codec;

// Re-export commonly used types at the crate root for convenience.
pub use types::{RawSocket, RawWindow, FontId, ABI_VERSION, LOG_BUFFER_CAPACITY, DEFAULT_HEAP_CAPACITY};
pub use error::{ErrorCode, ModuleError, ModuleResult, SnapshotFault};
pub use state::{EntryPoint, ModuleState};
pub use capability::{Capability, CapabilityCategory, CapabilityId, FailureConvention, CAPABILITY_TABLE};
pub use window::{Anchor, DesktopOptions, SpecialLayer, SpecialOptions, TargetMonitor, WindowLayer};
pub use draw::{Bounds, Color, CommandPool, DrawCommand, Stroke, Texture, TextureHandle, Vec2};
pub use config::ConfigValue;
