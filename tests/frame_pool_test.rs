use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use frame_ngin::{
    config::EngineConfig,
    data_structures::{
        frame_pool::{FrameBufferPool, PoolError, SlotLease},
        scene_graph::SceneNode,
        shapes,
        transform::Transform,
    },
};

use crate::common::test_utils::{MockFrame, MockGpu};

mod common;

const BLOCKED: Duration = Duration::from_millis(150);
const GENEROUS: Duration = Duration::from_secs(5);

#[test]
fn fourth_acquire_waits_for_the_first_completion() {
    let mut pool = FrameBufferPool::new(3, |i| i).unwrap();
    let mut leases: Vec<SlotLease> = (0..3)
        .map(|_| pool.acquire_next().unwrap().into_lease())
        .collect();
    assert_eq!(pool.in_flight(), 3);

    let (tx, rx) = mpsc::channel();
    let waiter = thread::spawn(move || {
        let index = pool.acquire_next().map(|handle| handle.index());
        tx.send(index).unwrap();
        pool
    });

    assert!(rx.recv_timeout(BLOCKED).is_err(), "fourth acquire must block");

    leases.remove(0).release();
    assert_eq!(rx.recv_timeout(GENEROUS).unwrap(), Ok(0));

    let pool = waiter.join().unwrap();
    assert_eq!(pool.cursor(), 1);
}

#[test]
fn shutdown_releases_a_blocked_waiter() {
    let mut pool = FrameBufferPool::new(2, |i| i).unwrap();
    let _leases: Vec<SlotLease> = (0..2)
        .map(|_| pool.acquire_next().unwrap().into_lease())
        .collect();
    let drainer = pool.drainer();

    let (tx, rx) = mpsc::channel();
    let waiter = thread::spawn(move || {
        let result = pool.acquire_next().map(|handle| handle.index());
        tx.send(result).unwrap();
    });

    assert!(rx.recv_timeout(BLOCKED).is_err());
    assert!(drainer.drain());
    assert_eq!(rx.recv_timeout(GENEROUS).unwrap(), Err(PoolError::Drained));
    waiter.join().unwrap();

    assert!(!drainer.drain(), "a second drain is a no-op");
}

#[test]
fn outstanding_slots_never_exceed_capacity() {
    const FRAMES: usize = 60;
    let mut pool = FrameBufferPool::new(3, |i| i).unwrap();
    let outstanding = Arc::new(AtomicUsize::new(0));

    let (tx, rx) = mpsc::channel::<SlotLease>();
    let completer = {
        let outstanding = Arc::clone(&outstanding);
        thread::spawn(move || {
            let mut held: Vec<SlotLease> = vec![];
            let mut completed = 0;
            for lease in rx {
                held.push(lease);
                if held.len() == 2 {
                    thread::sleep(Duration::from_millis(1));
                    // complete the newer one first
                    while let Some(lease) = held.pop() {
                        outstanding.fetch_sub(1, Ordering::SeqCst);
                        lease.release();
                        completed += 1;
                    }
                }
            }
            for lease in held {
                outstanding.fetch_sub(1, Ordering::SeqCst);
                lease.release();
                completed += 1;
            }
            completed
        })
    };

    let mut peak = 0;
    for _ in 0..FRAMES {
        let handle = pool.acquire_next().unwrap();
        peak = peak.max(outstanding.fetch_add(1, Ordering::SeqCst) + 1);
        tx.send(handle.into_lease()).unwrap();
    }
    drop(tx);

    assert_eq!(completer.join().unwrap(), FRAMES);
    assert!(peak <= 3, "peak of {peak} outstanding slots");
    assert_eq!(outstanding.load(Ordering::SeqCst), 0);
    assert_eq!(pool.available_permits(), 3);
}

#[test]
fn slots_are_not_rewritten_while_the_gpu_reads_them() {
    let gpu = Arc::new(MockGpu::new());
    let config = EngineConfig::default();
    let mut node = SceneNode::new("cube", &shapes::cube(), gpu.as_ref(), &config).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let completer = {
        let gpu = Arc::clone(&gpu);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                if !gpu.complete_next() {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        })
    };

    let identity = Transform::identity();
    for frame in 0..20 {
        node.render(gpu.as_ref(), &MockFrame(frame), &identity, &identity, None)
            .unwrap();
    }
    stop.store(true, Ordering::Release);
    completer.join().unwrap();
    gpu.complete_all();

    assert_eq!(gpu.overwrites_in_flight(), 0);
    let slots: Vec<String> = gpu
        .submissions()
        .into_iter()
        .map(|s| s.uniform_label)
        .collect();
    let expected: Vec<String> = (0..20).map(|i| format!("cube uniforms {}", i % 3)).collect();
    assert_eq!(slots, expected);
    assert_eq!(node.pool().available_permits(), 3);
}
