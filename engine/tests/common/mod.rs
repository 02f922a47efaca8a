//! Shared test helpers for integration tests.
//!
//! Provides controller factories, a minimal module, and helpers for
//! planting blobs in the module heap.

#![allow(dead_code)]

use std::ptr::NonNull;

use fusion_engine::controller::ModuleContext;
use fusion_engine::{
    ExampleModule, HostCapabilities, MockHost, ModuleConfig, ModuleController, ModuleLogic,
};
use fusion_primitives::ModuleResult;

/// Heap size used by the integration tests (64 KiB).
pub const TEST_HEAP: usize = 64 * 1024;

pub fn test_config() -> ModuleConfig {
    ModuleConfig {
        heap_capacity: TEST_HEAP,
        ..ModuleConfig::default()
    }
}

// ── Controllers ──

/// The reference module over a fresh mock host.
pub fn example() -> ModuleController<MockHost, ExampleModule> {
    example_with_host(MockHost::new())
}

pub fn example_with_host(host: MockHost) -> ModuleController<MockHost, ExampleModule> {
    ModuleController::new(host, test_config(), ExampleModule::new())
}

/// A module that does nothing but count its ticks.
#[derive(Default)]
pub struct Idle {
    pub ticks: u64,
}

impl ModuleLogic for Idle {
    fn setup<H: HostCapabilities>(&mut self, _ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        Ok(())
    }

    fn tick<H: HostCapabilities>(&mut self, _ctx: &mut ModuleContext<H>) -> ModuleResult<()> {
        self.ticks += 1;
        Ok(())
    }

    fn teardown<H: HostCapabilities>(&mut self, _ctx: &mut ModuleContext<H>) {}
}

pub fn idle() -> ModuleController<MockHost, Idle> {
    ModuleController::new(MockHost::new(), test_config(), Idle::default())
}

pub fn idle_named(name: &str) -> ModuleController<MockHost, Idle> {
    let config = ModuleConfig {
        module_name: name.to_string(),
        ..test_config()
    };
    ModuleController::new(MockHost::new(), config, Idle::default())
}

// ── Heap helpers ──

/// Copy `bytes` into a fresh heap allocation, as a host would.
pub fn plant<H, M>(controller: &mut ModuleController<H, M>, bytes: &[u8]) -> NonNull<u8>
where
    H: HostCapabilities,
    M: ModuleLogic,
{
    let ptr = controller.alloc(bytes.len()).expect("heap has room for the blob");
    let arena = controller.context_mut().arena.as_mut().expect("initialized");
    arena.block_mut(ptr).expect("live block")[..bytes.len()].copy_from_slice(bytes);
    ptr
}

/// Read a blob back out of the heap.
pub fn read_blob<H, M>(controller: &ModuleController<H, M>, ptr: NonNull<u8>) -> Vec<u8>
where
    H: HostCapabilities,
    M: ModuleLogic,
{
    let arena = controller.context().arena.as_ref().expect("initialized");
    let block = arena.block(ptr).expect("live block");
    let len = fusion_engine::snapshot::blob_len(block).expect("valid header");
    block[..len].to_vec()
}
