//! Guest exported functions.
//!
//! The host drives the module through these ten entry points. Each one
//! borrows the single controller slot, forwards to the engine, and turns
//! the result into the ABI's sentinels: nothing for lifecycle calls, 0 for
//! sizes before init, null for pointers. Errors are already logged by the
//! controller, so they are dropped here.
//!
//! They must never panic; panics in WASM cause traps.

use core::cell::RefCell;
use core::ptr;

use fusion_engine::{ExampleModule, ModuleConfig, ModuleController};

use crate::host_bridge::WasmHost;

type Controller = ModuleController<WasmHost, ExampleModule>;

/// Holder for the module's only controller.
struct Slot(RefCell<Option<Controller>>);

// SAFETY: the host never runs two entry points concurrently or re-entrantly,
// and wasm32 guests are single-threaded. A re-entrant call still cannot
// alias the controller: `try_borrow_mut` fails and the call is dropped.
unsafe impl Sync for Slot {}

static CONTROLLER: Slot = Slot(RefCell::new(None));

/// Run `f` on the controller, creating it (Uninitialized) on first use.
///
/// Returns `fallback` if the slot is already borrowed.
fn with_controller<T>(fallback: T, f: impl FnOnce(&mut Controller) -> T) -> T {
    let Ok(mut slot) = CONTROLLER.0.try_borrow_mut() else {
        return fallback;
    };
    let controller =
        slot.get_or_insert_with(|| ModuleController::new(WasmHost, ModuleConfig::default(), ExampleModule::new()));
    f(controller)
}

// ── Lifecycle ──

/// Create the heap, apply host configuration, and set the module up.
#[no_mangle]
pub extern "C" fn module_init() {
    with_controller((), |c| {
        let _ = c.init();
    })
}

#[no_mangle]
pub extern "C" fn module_tick() {
    with_controller((), |c| {
        let _ = c.tick();
    })
}

/// Release every host resource. Safe to call more than once.
#[no_mangle]
pub extern "C" fn module_stop() {
    with_controller((), |c| {
        let _ = c.stop();
    })
}

// ── Heap ──

#[no_mangle]
pub extern "C" fn module_heap_allocated() -> usize {
    with_controller(0, |c| c.heap_allocated())
}

#[no_mangle]
pub extern "C" fn module_heap_capacity() -> usize {
    with_controller(0, |c| c.heap_capacity())
}

#[no_mangle]
pub extern "C" fn module_heap_free() -> usize {
    with_controller(0, |c| c.heap_free())
}

/// Allocate `size` bytes in the module heap. Null when full or before init.
#[no_mangle]
pub extern "C" fn module_alloc(size: usize) -> *mut u8 {
    with_controller(ptr::null_mut(), |c| c.alloc(size).map_or(ptr::null_mut(), |p| p.as_ptr()))
}

/// Free a pointer returned by `module_alloc` or `module_on_failure`.
/// Null is ignored; any other invalid address is logged and ignored.
#[no_mangle]
pub extern "C" fn module_free(pointer: *mut u8) {
    with_controller((), |c| {
        let _ = c.free(pointer);
    })
}

// ── Failure and restore ──

/// Snapshot the module into a heap-held blob owned by the host.
///
/// Null if the module was not initialized or the blob did not fit.
#[no_mangle]
pub extern "C" fn module_on_failure() -> *mut u8 {
    with_controller(ptr::null_mut(), |c| match c.on_failure() {
        Ok(Some(blob)) => blob.as_ptr(),
        _ => ptr::null_mut(),
    })
}

/// Resume from a blob returned by `module_on_failure`.
///
/// On success the blob is released. A rejected blob leaves the module in
/// the failed state and stays owned by the host.
#[no_mangle]
pub extern "C" fn module_restore(blob: *mut u8) {
    with_controller((), |c| {
        let _ = c.restore(blob);
    })
}
