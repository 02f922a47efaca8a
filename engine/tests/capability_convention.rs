//! No capability is ever invoked with a handle the host reported as failed.

mod common;

use fusion_engine::MockHost;
use fusion_primitives::{CapabilityId, ModuleState};

use common::*;

// ── Test: failed window create ──

#[test]
fn test_failed_window_is_never_used() {
    let mut host = MockHost::new();
    host.fail(CapabilityId::WindowCreate, -1);
    let mut c = example_with_host(host);
    c.init().unwrap();
    for _ in 0..3 {
        c.tick().unwrap();
    }
    c.stop().unwrap();

    assert!(c.host().calls_with_handle(-1).is_empty());
    assert_eq!(c.host().call_count(CapabilityId::PushDrawCommand), 0);
    assert_eq!(c.host().call_count(CapabilityId::WindowDestroy), 0);
}

// ── Test: recv failure invalidates the socket mid-run ──

#[test]
fn test_recv_failure_stops_socket_use() {
    let mut c = example();
    c.init().unwrap();
    c.host_mut().fail(CapabilityId::UdpRecv, -104);

    assert!(c.tick().is_err());
    assert_eq!(c.state(), ModuleState::Initialized, "tick errors do not fail the module");
    assert!(c.logic().socket().is_none());

    c.host_mut().recover(CapabilityId::UdpRecv);
    c.tick().unwrap();
    c.stop().unwrap();

    assert_eq!(c.host().call_count(CapabilityId::UdpRecv), 1);
    assert_eq!(c.host().call_count(CapabilityId::UdpShutdown), 0);
}

// ── Test: failed connect drops the socket ──

#[test]
fn test_failed_connect_drops_socket() {
    let mut host = MockHost::new();
    host.fail(CapabilityId::UdpConnect, -111);
    let mut c = example_with_host(host);
    c.init().unwrap();

    assert!(c.logic().socket().is_none());
    assert_eq!(c.counters().setup_errors, 1);
    c.tick().unwrap();
    c.stop().unwrap();
    assert_eq!(c.host().call_count(CapabilityId::UdpSend), 0);
    assert_eq!(c.host().call_count(CapabilityId::UdpShutdown), 0);
}

// ── Test: every raw handle used after stop belongs to a live resource ──

#[test]
fn test_no_calls_after_release() {
    let mut c = example();
    c.init().unwrap();
    c.tick().unwrap();
    c.stop().unwrap();
    let calls = c.host().calls().len();

    assert!(c.tick().is_err());
    assert!(c.stop().is_ok());
    let keyed_after: Vec<_> = c.host().calls()[calls..]
        .iter()
        .filter(|call| call.handle.is_some())
        .collect();
    assert!(keyed_after.is_empty());
}
