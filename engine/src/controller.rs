//! Module lifecycle controller.
//!
//! The host drives a module through `init → tick* → stop`, and may at any
//! point while it is initialized call the failure hook and later hand the
//! snapshot back to the restore hook:
//!
//! ```text
//! Uninitialized --init--> Initialized --stop--> Stopped
//!                          |      ^
//!                on_failure|      |restore
//!                          v      |
//!                          Failed --stop--> Stopped
//! ```
//!
//! Every entry point returns a `ModuleResult` and logs its own failures
//! through the relay, so the export layer only has to drop the result.
//! Out-of-order calls are logged no-ops that change neither the state nor
//! the arena.

use alloc::vec::Vec;
use core::fmt;
use core::ptr::NonNull;

use fusion_primitives::{EntryPoint, ModuleError, ModuleResult, ModuleState, SnapshotFault, ABI_VERSION};

use crate::arena::{Arena, ALIGNMENT};
use crate::capabilities::Resources;
use crate::config::ModuleConfig;
use crate::host::HostCapabilities;
use crate::relay::{Level, LogRelay};
use crate::snapshot::{self, HeapStats, ModuleId, Snapshot};
use crate::{log_error, log_info, log_warn};

/// Controller-private counters carried through snapshots.
///
/// A failure followed by a restore leaves them exactly as they were.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Ticks run since init.
    pub ticks: u64,
    /// Errors reported by module setup.
    pub setup_errors: u64,
}

/// Failure and restore tallies. Not part of snapshots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Failure hooks taken.
    pub failures: u64,
    /// Successful restores.
    pub restores: u64,
}

/// Module-specific behavior plugged into the controller.
///
/// Hooks receive the whole context and may use any part of it. Errors
/// returned from `setup` and `tick` are logged by the controller; they
/// never change the lifecycle state.
pub trait ModuleLogic {
    fn setup<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()>;

    fn tick<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>) -> ModuleResult<()>;

    /// Release module-owned resources before the controller releases the
    /// remaining handles.
    fn teardown<H: HostCapabilities>(&mut self, ctx: &mut ModuleContext<H>);

    /// Serialize module state into a snapshot payload.
    fn save(&self, _out: &mut Vec<u8>) {}

    /// Replace module state from a snapshot payload.
    ///
    /// Must validate the whole payload before changing anything.
    fn load(&mut self, payload: &[u8]) -> ModuleResult<()> {
        if payload.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::SnapshotCorruption(SnapshotFault::InvalidField))
        }
    }
}

/// Everything a module owns: host access, arena, log relay, resources.
pub struct ModuleContext<H> {
    pub host: H,
    pub relay: LogRelay,
    /// `None` before init, or if the arena could not be created.
    pub arena: Option<Arena>,
    pub resources: Resources,
    pub config: ModuleConfig,
    pub counters: Counters,
}

impl<H: HostCapabilities> ModuleContext<H> {
    pub fn new(host: H, config: ModuleConfig) -> Self {
        Self {
            host,
            relay: LogRelay::new(config.log_buffer_capacity),
            arena: None,
            resources: Resources::new(),
            config,
            counters: Counters::default(),
        }
    }

    /// Relay a formatted message to the host. Used by the `log_*!` macros.
    pub fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        self.relay.log(&mut self.host, level, args);
    }

    /// Log an error with its status code.
    pub fn report(&mut self, context: &str, err: &ModuleError) {
        log_error!(self, "[{}] {}: {}", err.code(), context, err);
    }

    pub fn arena(&mut self) -> ModuleResult<&mut Arena> {
        self.arena
            .as_mut()
            .ok_or(ModuleError::AllocationFailure { requested: 0 })
    }

    /// Allocate `len` bytes from the arena.
    pub fn alloc(&mut self, len: usize) -> ModuleResult<NonNull<u8>> {
        self.arena()?
            .allocate(len)
            .ok_or(ModuleError::AllocationFailure { requested: len })
    }

    pub fn free(&mut self, ptr: NonNull<u8>) -> ModuleResult<()> {
        self.arena()?.free(ptr.as_ptr())
    }
}

/// Drives one module through its lifecycle.
pub struct ModuleController<H, M> {
    ctx: ModuleContext<H>,
    state: ModuleState,
    logic: M,
    module_id: ModuleId,
    recovery: RecoveryStats,
}

impl<H: HostCapabilities, M: ModuleLogic> ModuleController<H, M> {
    pub fn new(host: H, config: ModuleConfig, logic: M) -> Self {
        let module_id = snapshot::module_id(&config.module_name);
        Self {
            ctx: ModuleContext::new(host, config),
            state: ModuleState::Uninitialized,
            logic,
            module_id,
            recovery: RecoveryStats::default(),
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn counters(&self) -> Counters {
        self.ctx.counters
    }

    pub fn recovery(&self) -> RecoveryStats {
        self.recovery
    }

    pub fn context(&self) -> &ModuleContext<H> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ModuleContext<H> {
        &mut self.ctx
    }

    pub fn host(&self) -> &H {
        &self.ctx.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.ctx.host
    }

    pub fn logic(&self) -> &M {
        &self.logic
    }

    /// Log and return a precondition violation if `entry` is not accepted.
    fn admit(&mut self, entry: EntryPoint) -> ModuleResult<()> {
        if self.state.accepts(entry) {
            return Ok(());
        }
        let err = ModuleError::PreconditionViolation {
            entry,
            state: self.state,
        };
        log_warn!(self.ctx, "[{}] {}", err.code(), err);
        Err(err)
    }

    // ── Lifecycle ──

    /// Create the arena, apply configuration, and run module setup.
    ///
    /// Always ends Initialized when called from Uninitialized; setup
    /// failures only degrade the module.
    pub fn init(&mut self) -> ModuleResult<()> {
        self.admit(EntryPoint::Init)?;

        let config_errors = self.ctx.config.apply_overrides(&mut self.ctx.host);
        for err in &config_errors {
            self.ctx.report("configuration", err);
        }

        match Arena::new(self.ctx.config.heap_capacity) {
            Ok(arena) => self.ctx.arena = Some(arena),
            Err(err) => self.ctx.report("arena", &err),
        }

        if let Some(volume) = self.ctx.config.volume {
            self.ctx.host.audio_set_volume(volume);
        }

        if let Err(err) = self.logic.setup(&mut self.ctx) {
            self.ctx.counters.setup_errors += 1;
            self.ctx.report("setup", &err);
        }

        self.state = ModuleState::Initialized;
        Ok(())
    }

    /// Run one bounded slice of module work.
    pub fn tick(&mut self) -> ModuleResult<()> {
        self.admit(EntryPoint::Tick)?;
        self.ctx.counters.ticks += 1;
        let result = self.logic.tick(&mut self.ctx);
        if let Err(err) = &result {
            self.ctx.report("tick", err);
        }
        result
    }

    /// Release every resource and stop for good. Idempotent.
    pub fn stop(&mut self) -> ModuleResult<()> {
        if self.state == ModuleState::Stopped {
            return Ok(());
        }
        self.admit(EntryPoint::Stop)?;

        self.logic.teardown(&mut self.ctx);
        let (released, errors) = self.ctx.resources.release_all(&mut self.ctx.host);
        for err in &errors {
            self.ctx.report("release", err);
        }
        if released > 0 {
            log_info!(self.ctx, "released {} host resources", released);
        }
        self.ctx.relay.flush_pending(&mut self.ctx.host);
        self.state = ModuleState::Stopped;
        Ok(())
    }

    /// Serialize the module into an arena-held blob and enter Failed.
    ///
    /// Ownership of the blob passes to the host. Returns `Ok(None)` if the
    /// controller failed but the blob could not be produced.
    pub fn on_failure(&mut self) -> ModuleResult<Option<NonNull<u8>>> {
        self.admit(EntryPoint::OnFailure)?;
        self.recovery.failures += 1;
        self.state = ModuleState::Failed;

        match self.write_snapshot() {
            Ok(ptr) => {
                let ticks = self.ctx.counters.ticks;
                log_warn!(
                    self.ctx,
                    "module failed after {} ticks, snapshot at {:#x}",
                    ticks,
                    ptr.as_ptr() as usize
                );
                Ok(Some(ptr))
            }
            Err(err) => {
                self.ctx.report("snapshot", &err);
                Ok(None)
            }
        }
    }

    fn write_snapshot(&mut self) -> ModuleResult<NonNull<u8>> {
        let (capacity, allocated) = match &self.ctx.arena {
            Some(arena) => (arena.capacity(), arena.allocated()),
            None => return Err(ModuleError::AllocationFailure { requested: 0 }),
        };
        let mut payload = Vec::new();
        self.logic.save(&mut payload);

        let snap = Snapshot {
            abi_version: ABI_VERSION,
            module_id: self.module_id,
            state: ModuleState::Initialized,
            counters: self.ctx.counters,
            heap: HeapStats {
                capacity: capacity as u64,
                allocated: allocated as u64,
            },
            references: self.ctx.resources.references(),
            payload,
        };
        let bytes = snap.encode();

        let ptr = self.ctx.alloc(bytes.len())?;
        let arena = self.ctx.arena()?;
        let block = arena
            .block_mut(ptr)
            .ok_or(ModuleError::AllocationFailure { requested: bytes.len() })?;
        block[..bytes.len()].copy_from_slice(&bytes);
        Ok(ptr)
    }

    /// Resume from a blob produced by [`Self::on_failure`].
    ///
    /// Any defect in the blob is fatal: the controller stays Failed, the
    /// blob stays with the host, and nothing is partially applied.
    pub fn restore(&mut self, blob: *mut u8) -> ModuleResult<()> {
        self.admit(EntryPoint::Restore)?;
        match self.try_restore(blob) {
            Ok(()) => {
                let ticks = self.ctx.counters.ticks;
                let restores = self.recovery.restores;
                log_info!(self.ctx, "module restored at tick {} (restore #{})", ticks, restores);
                Ok(())
            }
            Err(err) => {
                self.ctx.report("restore", &err);
                Err(err)
            }
        }
    }

    fn try_restore(&mut self, blob: *mut u8) -> ModuleResult<()> {
        let ptr = NonNull::new(blob).ok_or(SnapshotFault::NotInHeap)?;
        let arena = self.ctx.arena.as_ref().ok_or(SnapshotFault::NotInHeap)?;
        let block = arena.block(ptr).ok_or(SnapshotFault::NotInHeap)?;
        let len = snapshot::blob_len(block)?;
        let bytes = block.get(..len).ok_or(SnapshotFault::Truncated)?;
        let snap = Snapshot::decode(bytes, &self.module_id)?;

        if snap.state != ModuleState::Initialized {
            return Err(SnapshotFault::InvalidField.into());
        }
        // Statistics as they will be once the blob is released.
        let blob_fragment = block.len() + ALIGNMENT;
        let allocated_after = arena.allocated() - blob_fragment;
        if snap.heap.capacity != arena.capacity() as u64 || snap.heap.allocated != allocated_after as u64 {
            return Err(SnapshotFault::HeapMismatch.into());
        }
        if snap.references != self.ctx.resources.references() {
            return Err(SnapshotFault::ResourceMismatch.into());
        }

        self.logic.load(&snap.payload)?;

        self.ctx.free(ptr)?;
        self.ctx.counters = snap.counters;
        self.recovery.restores += 1;
        self.state = ModuleState::Initialized;
        Ok(())
    }

    // ── Heap exports ──

    pub fn heap_allocated(&self) -> usize {
        self.ctx.arena.as_ref().map_or(0, Arena::allocated)
    }

    pub fn heap_capacity(&self) -> usize {
        self.ctx.arena.as_ref().map_or(0, Arena::capacity)
    }

    pub fn heap_free(&self) -> usize {
        self.ctx.arena.as_ref().map_or(0, Arena::free_bytes)
    }

    /// Allocate on behalf of the host. `None` before init or when full.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.ctx.arena.as_mut()?.allocate(size)
    }

    /// Free on behalf of the host. Invalid addresses are logged and ignored.
    pub fn free(&mut self, ptr: *mut u8) -> ModuleResult<()> {
        let Some(arena) = self.ctx.arena.as_mut() else {
            return if ptr.is_null() {
                Ok(())
            } else {
                Err(ModuleError::InvalidFree { address: ptr as usize })
            };
        };
        let result = arena.free(ptr);
        if let Err(err) = &result {
            self.ctx.report("module_free", err);
        }
        result
    }
}
