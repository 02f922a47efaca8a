//! Snapshot round trips and corrupted blob handling.

mod common;

use fusion_engine::snapshot::{module_id, Snapshot, CHECKSUM_LEN};
use fusion_primitives::{ModuleError, ModuleState, SnapshotFault};

use common::*;

// ── Test: round trip preserves counters and heap statistics ──

#[test]
fn test_round_trip_preserves_counters_and_heap() {
    let mut c = example();
    c.init().unwrap();
    for _ in 0..5 {
        c.tick().unwrap();
    }
    let heap = c.context().arena.as_ref().unwrap().diagnostics();
    let counters = c.counters();

    let blob = c.on_failure().unwrap().unwrap();
    let decoded = Snapshot::decode(&read_blob(&c, blob), &module_id("fusion.example")).unwrap();
    assert_eq!(decoded.counters.ticks, 5);
    assert_eq!(decoded.heap.allocated as usize, heap.allocated);
    assert_eq!(decoded.references.len(), 2, "socket and window");

    c.restore(blob.as_ptr()).unwrap();
    let after = c.context().arena.as_ref().unwrap().diagnostics();
    assert_eq!(after.allocated, heap.allocated);
    assert_eq!(after.capacity, heap.capacity);
    assert_eq!(c.counters(), counters);
    assert_eq!(c.recovery().failures, 1);
    assert_eq!(c.recovery().restores, 1);

    c.tick().unwrap();
    assert_eq!(c.counters().ticks, 6);
}

// ── Test: repeated failure cycles ──

#[test]
fn test_repeated_cycles() {
    let mut c = idle();
    c.init().unwrap();
    let allocated = c.heap_allocated();
    for round in 1..=3u64 {
        c.tick().unwrap();
        let counters = c.counters();
        let blob = c.on_failure().unwrap().unwrap();
        c.restore(blob.as_ptr()).unwrap();
        assert_eq!(c.counters(), counters);
        assert_eq!(c.recovery().restores, round);
        assert_eq!(c.heap_allocated(), allocated);
    }
}

// ── Test: blob from another module ──

#[test]
fn test_foreign_blob_is_fatal() {
    let mut other = idle_named("someone.else");
    other.init().unwrap();
    let foreign_ptr = other.on_failure().unwrap().unwrap();
    let foreign = read_blob(&other, foreign_ptr);

    let mut c = idle();
    c.init().unwrap();
    let own = c.on_failure().unwrap().unwrap();
    let planted = plant(&mut c, &foreign);

    let err = c.restore(planted.as_ptr()).unwrap_err();
    assert_eq!(err, ModuleError::SnapshotCorruption(SnapshotFault::ForeignModule));
    assert_eq!(c.state(), ModuleState::Failed);
    assert!(c.host().logged("blob belongs to another module"));

    // The genuine blob is still usable once the planted one is released.
    c.free(planted.as_ptr()).unwrap();
    c.restore(own.as_ptr()).unwrap();
    assert_eq!(c.state(), ModuleState::Initialized);
}

// ── Test: flipped payload byte ──

#[test]
fn test_corrupted_blob_stays_failed() {
    let mut c = idle();
    c.init().unwrap();
    let blob = c.on_failure().unwrap().unwrap();
    let heap = c.heap_allocated();

    let arena = c.context_mut().arena.as_mut().unwrap();
    let block = arena.block_mut(blob).unwrap();
    block[20] ^= 0xFF;

    let err = c.restore(blob.as_ptr()).unwrap_err();
    assert_eq!(err, ModuleError::SnapshotCorruption(SnapshotFault::ChecksumMismatch));
    assert_eq!(c.state(), ModuleState::Failed);
    assert_eq!(c.heap_allocated(), heap, "rejected blob was released");
    assert!(c.tick().is_err());
}

// ── Test: heap changed between failure and restore ──

#[test]
fn test_heap_drift_is_detected() {
    let mut c = idle();
    c.init().unwrap();
    let blob = c.on_failure().unwrap().unwrap();
    let extra = c.alloc(100).unwrap();

    let err = c.restore(blob.as_ptr()).unwrap_err();
    assert_eq!(err, ModuleError::SnapshotCorruption(SnapshotFault::HeapMismatch));

    c.free(extra.as_ptr()).unwrap();
    c.restore(blob.as_ptr()).unwrap();
}

// ── Test: garbage and truncated blobs ──

#[test]
fn test_garbage_blobs() {
    let mut c = idle();
    c.init().unwrap();
    let own = c.on_failure().unwrap().unwrap();
    let genuine = read_blob(&c, own);

    let junk = plant(&mut c, &[0xAB; 64]);
    assert_eq!(
        c.restore(junk.as_ptr()).unwrap_err(),
        ModuleError::SnapshotCorruption(SnapshotFault::BadMagic)
    );

    let mut short = genuine.clone();
    short.truncate(genuine.len() - CHECKSUM_LEN);
    let cut = plant(&mut c, &short);
    assert!(matches!(
        c.restore(cut.as_ptr()).unwrap_err(),
        ModuleError::SnapshotCorruption(SnapshotFault::Truncated | SnapshotFault::ChecksumMismatch)
    ));

    let interior = unsafe { own.as_ptr().add(8) };
    assert_eq!(
        c.restore(interior).unwrap_err(),
        ModuleError::SnapshotCorruption(SnapshotFault::NotInHeap)
    );
    assert_eq!(c.state(), ModuleState::Failed);
}
