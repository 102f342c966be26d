//! A ring of per-frame uniform buffers shared between the CPU and the GPU.
//!
//! The CPU may run up to `capacity` frames ahead of the GPU. Every slot handed
//! out by [`FrameBufferPool::acquire_next`] consumes one permit, and the permit
//! only comes back when the GPU signals that the submission reading the slot
//! has completed. Slots are handed out strictly round-robin, so as long as a
//! queue completes its submissions in order, a slot is never rewritten while
//! the GPU may still read it.
//!
//! # Concurrency
//!
//! The cursor belongs to the control thread (`acquire_next` takes `&mut self`).
//! The permit counter is shared: a [`SlotLease`] can be moved into a GPU
//! completion callback and released from whatever thread the backend runs it
//! on.
//!
//! # Teardown
//!
//! [`FrameBufferPool::shutdown`] (also run on drop) releases every waiter once.
//! Waiters woken that way get [`PoolError::Drained`] instead of a slot.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures_intrusive::sync::Semaphore;
use thiserror::Error;

use crate::{data_structures::transform::Transform, gpu::Gpu};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("a frame buffer pool needs at least one slot")]
    ZeroCapacity,
    #[error("the frame buffer pool was drained during shutdown")]
    Drained,
}

/// One frame's worth of transform data: model-view at byte 0, projection at byte 64.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub model_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl Uniforms {
    pub const SIZE: u64 = std::mem::size_of::<Uniforms>() as u64;

    pub fn new(model_view: &Transform, projection: &Transform) -> Self {
        Self {
            model_view: model_view.columns(),
            projection: projection.columns(),
        }
    }
}

struct Permits {
    semaphore: Semaphore,
    drained: AtomicBool,
    capacity: usize,
}

impl Permits {
    fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    /// Wakes every waiter exactly once. Returns `false` if already drained.
    fn drain(&self) -> bool {
        if self.drained.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.semaphore.release(self.capacity);
        true
    }
}

/// The obligation to give a slot's permit back once the GPU is done with it.
///
/// Releasing is one-shot: [`SlotLease::release`] consumes the lease, and a
/// lease that is dropped without an explicit release gives its permit back
/// on drop, so a permit can never be lost or returned twice.
pub struct SlotLease {
    permits: Arc<Permits>,
    slot: usize,
    released: bool,
}

impl SlotLease {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn release(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.permits.semaphore.release(1);
        log::trace!("uniform slot {} released", self.slot);
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.signal();
    }
}

impl std::fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("slot", &self.slot)
            .field("released", &self.released)
            .finish()
    }
}

/// A checked-out slot: its index in the ring plus the lease that returns it.
#[derive(Debug)]
pub struct SlotHandle {
    index: usize,
    lease: SlotLease,
}

impl SlotHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Splits off the lease so it can travel into a completion callback.
    pub fn into_lease(self) -> SlotLease {
        self.lease
    }
}

/// A handle that can drain a pool from another thread, e.g. while the
/// control thread is blocked inside `acquire_next`.
#[derive(Clone)]
pub struct PoolDrain {
    permits: Arc<Permits>,
}

impl PoolDrain {
    /// Returns `true` if this call performed the drain.
    pub fn drain(&self) -> bool {
        self.permits.drain()
    }

    pub fn is_drained(&self) -> bool {
        self.permits.is_drained()
    }
}

/// A fixed ring of `capacity` uniform slots gated by a counting semaphore.
pub struct FrameBufferPool<S> {
    slots: Vec<S>,
    cursor: usize,
    permits: Arc<Permits>,
}

impl<S> FrameBufferPool<S> {
    /// Builds the ring, calling `make_slot` once per slot index.
    pub fn new(capacity: usize, make_slot: impl FnMut(usize) -> S) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let slots = (0..capacity).map(make_slot).collect();
        Ok(Self {
            slots,
            cursor: 0,
            permits: Arc::new(Permits {
                semaphore: Semaphore::new(true, capacity),
                drained: AtomicBool::new(false),
                capacity,
            }),
        })
    }

    /// Allocates `capacity` uniform buffers sized for [`Uniforms`] on `gpu`.
    pub fn with_gpu<G>(gpu: &G, label: &str, capacity: usize) -> Result<Self, PoolError>
    where
        G: Gpu<UniformBuffer = S> + ?Sized,
    {
        Self::new(capacity, |i| {
            gpu.create_uniform_buffer(&format!("{label} uniforms {i}"), Uniforms::SIZE)
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index the next successful acquire will hand out.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn available_permits(&self) -> usize {
        self.permits.semaphore.permits()
    }

    /// Slots checked out and not yet released by their completion signal.
    pub fn in_flight(&self) -> usize {
        self.capacity().saturating_sub(self.available_permits())
    }

    pub fn slots(&self) -> &[S] {
        &self.slots
    }

    pub fn slot_for(&self, handle: &SlotHandle) -> &S {
        debug_assert!(
            Arc::ptr_eq(&handle.lease.permits, &self.permits),
            "slot handle belongs to another pool"
        );
        &self.slots[handle.index]
    }

    /// Blocks until a slot is free, then hands out the slot at the cursor.
    ///
    /// This is the only place the control thread waits on the GPU. It returns
    /// [`PoolError::Drained`] if the pool is shut down before or while waiting.
    pub fn acquire_next(&mut self) -> Result<SlotHandle, PoolError> {
        if self.permits.is_drained() {
            return Err(PoolError::Drained);
        }
        {
            let semaphore = &self.permits.semaphore;
            let mut releaser = match semaphore.try_acquire(1) {
                Some(releaser) => releaser,
                None => {
                    log::debug!(
                        "all {} uniform slots in flight, waiting for the GPU",
                        self.slots.len()
                    );
                    futures::executor::block_on(semaphore.acquire(1))
                }
            };
            // The permit stays taken until the lease is released.
            releaser.disarm();
        }
        if self.permits.is_drained() {
            // Hand the permit on so the next waiter wakes up too.
            self.permits.semaphore.release(1);
            log::warn!("uniform slot acquire released by a pool drain");
            return Err(PoolError::Drained);
        }
        Ok(self.take_cursor())
    }

    /// Like [`acquire_next`](Self::acquire_next) but returns `Ok(None)`
    /// instead of blocking when every slot is in flight.
    pub fn try_acquire_next(&mut self) -> Result<Option<SlotHandle>, PoolError> {
        if self.permits.is_drained() {
            return Err(PoolError::Drained);
        }
        match self.permits.semaphore.try_acquire(1) {
            Some(mut releaser) => {
                releaser.disarm();
            }
            None => return Ok(None),
        }
        Ok(Some(self.take_cursor()))
    }

    fn take_cursor(&mut self) -> SlotHandle {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len();
        SlotHandle {
            index,
            lease: SlotLease {
                permits: Arc::clone(&self.permits),
                slot: index,
                released: false,
            },
        }
    }

    /// Copies model-view then projection into the slot behind `handle`.
    pub fn write_transforms<G>(
        &self,
        gpu: &G,
        handle: &SlotHandle,
        model_view: &Transform,
        projection: &Transform,
    ) where
        G: Gpu<UniformBuffer = S> + ?Sized,
    {
        let uniforms = Uniforms::new(model_view, projection);
        gpu.write_uniforms(self.slot_for(handle), bytemuck::bytes_of(&uniforms));
    }

    pub fn drainer(&self) -> PoolDrain {
        PoolDrain {
            permits: Arc::clone(&self.permits),
        }
    }

    /// Releases every thread blocked in `acquire_next`. Idempotent.
    pub fn shutdown(&self) -> bool {
        let drained = self.permits.drain();
        if drained {
            log::debug!("frame buffer pool with {} slots drained", self.slots.len());
        }
        drained
    }

    pub fn is_drained(&self) -> bool {
        self.permits.is_drained()
    }
}

impl<S> Drop for FrameBufferPool<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        let pool = FrameBufferPool::new(0, |i| i);
        assert_eq!(pool.err(), Some(PoolError::ZeroCapacity));
    }

    #[test]
    fn slots_are_created_once_in_order() {
        let pool = FrameBufferPool::new(3, |i| i * 10).unwrap();
        assert_eq!(pool.slots(), &[0, 10, 20]);
        assert_eq!(pool.available_permits(), 3);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn cursor_wraps_after_capacity() {
        let mut pool = FrameBufferPool::new(3, |i| i).unwrap();
        let indices: Vec<_> = (0..7)
            .map(|_| {
                let handle = pool.acquire_next().unwrap();
                let index = handle.index();
                handle.into_lease().release();
                index
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn try_acquire_reports_exhaustion() {
        let mut pool = FrameBufferPool::new(2, |i| i).unwrap();
        let a = pool.try_acquire_next().unwrap().unwrap();
        let _b = pool.try_acquire_next().unwrap().unwrap();
        assert!(pool.try_acquire_next().unwrap().is_none());
        assert_eq!(pool.in_flight(), 2);
        assert_eq!(pool.cursor(), 0);

        a.into_lease().release();
        let c = pool.try_acquire_next().unwrap().unwrap();
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn dropping_a_lease_returns_its_permit_once() {
        let mut pool = FrameBufferPool::new(2, |i| i).unwrap();
        let handle = pool.acquire_next().unwrap();
        assert_eq!(pool.available_permits(), 1);
        drop(handle);
        assert_eq!(pool.available_permits(), 2);
    }

    #[test]
    fn shutdown_is_idempotent_and_refuses_new_acquires() {
        let mut pool = FrameBufferPool::new(3, |i| i).unwrap();
        assert!(pool.shutdown());
        assert!(!pool.shutdown());
        assert!(pool.drainer().is_drained());
        assert_eq!(pool.acquire_next().err(), Some(PoolError::Drained));
        assert_eq!(pool.try_acquire_next().err(), Some(PoolError::Drained));
    }

    #[test]
    fn uniforms_put_projection_after_model_view() {
        let mut model_view = Transform::identity();
        model_view.translate(1.0, 2.0, 3.0);
        let projection = Transform::perspective(cgmath::Deg(85.0), 1.0, 0.01, 100.0);

        let uniforms = Uniforms::new(&model_view, &projection);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));

        assert_eq!(Uniforms::SIZE, 128);
        assert_eq!(&floats[..16], &model_view.raw());
        assert_eq!(&floats[16..], &projection.raw());
    }
}
