//! `fusion-engine`: runtime core of a Fusion guest module.
//!
//! Everything here is independent of the WASM boundary. The guest crate
//! wires these pieces to real imports and exports; tests drive them through
//! [`host::MockHost`].
//!
//! ## Architecture
//!
//! - [`arena::Arena`]: constant-time allocator over the module heap
//! - [`relay::LogRelay`]: buffered logging to the host, with the `log_*!` macros
//! - [`host::HostCapabilities`]: trait over the imported capability table
//! - [`capabilities::Resources`]: typed sockets and windows behind generation-tagged handles
//! - [`widget::Widget`]: label, panel, and image widgets rendering into command pools
//! - [`snapshot`]: blob format for the failure and restore hooks
//! - [`controller::ModuleController`]: the lifecycle state machine
//! - [`reference::ExampleModule`]: the module the guest ships

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod relay;
pub mod arena;
pub mod handles;
pub mod host;
pub mod capabilities;
pub mod widget;
pub mod config;
pub mod snapshot;
pub mod controller;
pub mod reference;

// Re-export key types for convenience
pub use arena::{Arena, Diagnostics};
pub use capabilities::{Resources, SocketHandle, WindowHandle};
pub use config::ModuleConfig;
pub use controller::{Counters, ModuleContext, ModuleController, ModuleLogic, RecoveryStats};
pub use host::{HostCapabilities, MockHost};
pub use reference::ExampleModule;
pub use relay::{Level, LogRelay};
