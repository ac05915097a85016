//! Call protocol tests against a scripted simulator.
//! Covers the flow-control handshake, argument blocks, data movement in both
//! directions and the debug reports a stream sends on its own.

use std::sync::Arc;

use pinned_memory::{memlock_limits, PinnedRegistry, RegistryStats};
use pipe_scenarios::{registry_with, ScriptedLocker, ScriptedPeer};
use pipe_stream::{DebugCode, IoStream, OpCode, PipeConfig, PipeStream, StreamError};

const REGION_SIZE: usize = 64 * 1024;

fn quiet_config(staging_hint: usize) -> PipeConfig {
    PipeConfig::default()
        .with_staging_hint(staging_hint)
        .with_region_size(REGION_SIZE)
        .with_memlock_report(false)
}

struct Harness {
    peer: ScriptedPeer,
    locker: ScriptedLocker,
    registry: Arc<PinnedRegistry>,
    stream: PipeStream<ScriptedPeer>,
}

impl Harness {
    fn new(peer: ScriptedPeer, staging_hint: usize) -> Self {
        let locker = ScriptedLocker::new();
        let registry = registry_with(&locker, 1);
        let stream = PipeStream::new(
            quiet_config(staging_hint),
            peer.clone(),
            Arc::clone(&registry),
        );
        Self {
            peer,
            locker,
            registry,
            stream,
        }
    }
}

#[test]
fn inactive_simulation_commits_without_touching_the_registry() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);

    let buf = h.stream.acquire_staging_buffer(8000).expect("staging");
    assert!(buf.len() >= 8000);
    for (i, byte) in buf[..8000].iter_mut().enumerate() {
        *byte = i as u8;
    }

    let status = h.stream.commit(8000);
    assert_eq!(status, 8000);

    assert_eq!(
        h.peer.ops(),
        vec![OpCode::Block, OpCode::IsSimulationActive, OpCode::WriteFully]
    );
    let write = &h.peer.calls_of(OpCode::WriteFully)[0];
    assert_eq!(write.len, 8000);
    assert_eq!(write.payload.len(), 8000);
    assert!(write.payload.iter().enumerate().all(|(i, &b)| b == i as u8));

    assert_eq!(h.registry.stats(), RegistryStats::default());
    assert!(h.locker.events().is_empty());
    assert_eq!(h.stream.region(), None);
}

#[test]
fn block_probes_spin_until_the_simulator_clears() {
    let mut h = Harness::new(ScriptedPeer::active(), 4096);
    h.peer.hold_for(2);

    h.stream.write_fully(b"hello");

    let ops = h.peer.ops();
    let first_write = ops
        .iter()
        .position(|op| *op == OpCode::WriteFully)
        .expect("data call issued");
    let probes = ops[..first_write]
        .iter()
        .filter(|op| **op == OpCode::Block)
        .count();
    assert_eq!(probes, 3);
    assert_eq!(
        ops,
        vec![
            OpCode::Block,
            OpCode::Block,
            OpCode::Block,
            OpCode::IsSimulationActive,
            OpCode::RegisterGraphicsMemory,
            OpCode::WriteFully,
        ]
    );
}

#[test]
fn graphics_memory_is_registered_once() {
    let mut h = Harness::new(ScriptedPeer::active(), 4096);

    h.stream.write_fully(b"first");
    h.stream.write_fully(b"second");

    let registrations = h.peer.calls_of(OpCode::RegisterGraphicsMemory);
    assert_eq!(registrations.len(), 1);
    let region = h.stream.region().expect("region allocated");
    assert_eq!(registrations[0].addr, region.addr);
    assert_eq!(registrations[0].len, REGION_SIZE);
    assert_eq!(h.registry.stats().allocations, 1);
}

#[test]
fn argument_blocks_carry_caller_ids() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);
    h.stream.write_fully(&[1, 2, 3]);

    for call in h.peer.calls() {
        assert_eq!(call.pid, std::process::id() as i32);
    }
    let write = &h.peer.calls_of(OpCode::WriteFully)[0];
    assert_eq!(write.payload, vec![1, 2, 3]);
}

#[test]
fn read_returns_the_delivered_prefix() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);
    h.peer.queue_inbound(b"pixels");

    let mut buf = [0u8; 16];
    let got = h.stream.read(&mut buf).expect("bytes delivered");
    assert_eq!(got, b"pixels");

    let mut buf = [0u8; 16];
    assert!(h.stream.read(&mut buf).is_none(), "nothing left to read");
    assert_eq!(h.peer.count(OpCode::Read), 2);
}

#[test]
fn read_treats_negative_status_as_nothing() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);
    h.peer.queue_inbound(b"ignored");
    h.peer.set_status(OpCode::Read, -1);

    let mut buf = [0u8; 8];
    assert!(h.stream.read(&mut buf).is_none());
}

#[test]
fn read_fully_reports_the_status_word() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);
    h.peer.queue_inbound(&[9; 32]);

    let mut buf = [0u8; 32];
    assert_eq!(h.stream.read_fully(&mut buf), 32);
    assert_eq!(buf, [9; 32]);

    h.peer.set_status(OpCode::ReadFully, 0x7f);
    assert_eq!(h.stream.read_fully(&mut buf), 0x7f);
}

#[test]
fn receive_uses_its_own_operation() {
    let mut h = Harness::new(ScriptedPeer::new(), 4096);
    h.peer.queue_inbound(b"ack");

    let mut buf = [0u8; 3];
    assert_eq!(h.stream.receive(&mut buf), 3);
    assert_eq!(&buf, b"ack");
    assert_eq!(h.peer.count(OpCode::Receive), 1);
    assert_eq!(h.peer.count(OpCode::ReadFully), 0);
}

#[test]
fn io_stream_interface_drives_the_same_protocol() {
    let mut h = Harness::new(ScriptedPeer::new(), 16);
    let stream: &mut dyn IoStream = &mut h.stream;

    let buf = stream.alloc_buffer(4).expect("staging");
    buf[..4].copy_from_slice(&0u32.to_ne_bytes());
    assert_eq!(stream.commit_buffer(4), 4);

    let write = &h.peer.calls_of(OpCode::WriteFully)[0];
    assert_eq!(write.payload, 0u32.to_ne_bytes().to_vec());
}

#[test]
fn oversized_commit_is_clamped_to_the_staging_buffer() {
    let mut h = Harness::new(ScriptedPeer::new(), 64);
    h.stream.acquire_staging_buffer(64).expect("staging");

    h.stream.commit(1000);
    assert_eq!(h.peer.calls_of(OpCode::WriteFully)[0].len, 64);
}

#[test]
fn staging_growth_failure_resets_and_reports() {
    let mut h = Harness::new(ScriptedPeer::new(), 1024);
    h.stream.acquire_staging_buffer(2048).expect("staging");

    match h.stream.acquire_staging_buffer(usize::MAX) {
        Err(StreamError::OutOfMemory { .. }) => {}
        other => panic!("expected out of memory, got {other:?}"),
    }
    assert_eq!(h.stream.staging_capacity(), 0);

    let reports: Vec<_> = h
        .peer
        .calls_of(OpCode::Debug)
        .iter()
        .filter_map(|call| call.debug_code())
        .collect();
    assert_eq!(reports, vec![DebugCode::PipeMemAllocFailed]);

    let buf = h.stream.acquire_staging_buffer(512).expect("recovers");
    assert_eq!(buf.len(), 1024);
}

#[test]
fn staging_buffer_never_shrinks_across_requests() {
    let mut h = Harness::new(ScriptedPeer::new(), 0);
    h.stream.acquire_staging_buffer(50_000).expect("large");
    let len = h.stream.acquire_staging_buffer(10).expect("small").len();
    assert_eq!(len, 50_000);
}

#[test]
fn opening_a_stream_reports_memlock_limits() {
    let peer = ScriptedPeer::new();
    let locker = ScriptedLocker::new();
    let config = PipeConfig::default().with_region_size(REGION_SIZE);
    let _stream = PipeStream::new(config, peer.clone(), registry_with(&locker, 1));

    let reports = peer.calls_of(OpCode::Debug);
    match memlock_limits() {
        Some(limits) => {
            assert_eq!(reports.len(), 2);
            assert!(reports
                .iter()
                .all(|call| call.debug_code() == Some(DebugCode::Info)));
            let expected = [limits.soft, limits.hard]
                .map(|value| usize::try_from(value).unwrap_or(usize::MAX));
            assert_eq!([reports[0].len, reports[1].len], expected);
        }
        None => assert!(reports.is_empty()),
    }
    // each report runs the full handshake
    assert_eq!(peer.count(OpCode::Block), reports.len());
}
