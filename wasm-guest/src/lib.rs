//! `fusion-guest`: WASM cdylib shipping the reference Fusion module.
//!
//! This crate compiles to a `.wasm` artifact that exports the ten
//! `module_*` entry points the host drives:
//!
//! - `module_init`, `module_tick`, `module_stop`: lifecycle
//! - `module_heap_allocated`, `module_heap_capacity`, `module_heap_free`: arena statistics
//! - `module_alloc`, `module_free`: host allocations inside the module heap
//! - `module_on_failure`, `module_restore`: snapshot and resume
//!
//! Host capabilities are imported under the `env` WASM module.
//!
//! All module behavior lives in `fusion-engine`; this crate only marshals
//! pointers across the boundary. Both dependencies are built without their
//! `std` features.
//!
//! The `wasm32-unknown-unknown` standard library provides the allocator
//! and panic handler.

#![no_std]

extern crate alloc;

// ── Modules ──

mod imports;
mod host_bridge;
mod exports;

// Re-export the exported functions so the linker sees them.
pub use exports::{
    module_alloc, module_free, module_heap_allocated, module_heap_capacity, module_heap_free, module_init,
    module_on_failure, module_restore, module_stop, module_tick,
};
