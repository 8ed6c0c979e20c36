//! Bounded SPSC ring buffer - the trade channel out of the engine.
//!
//! Capacity is a power of two. Two monotonically increasing 64-bit
//! position counters drive the queue: the slot for a position is
//! `position & (capacity - 1)`. Each side loads its own counter relaxed
//! and the opposing counter with acquire; publication is a release
//! store. The counters sit on separate cache lines so the producer and
//! consumer never false-share.
//!
//! Nothing blocks: a push against a full ring fails, a pop against an
//! empty ring returns `None`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use thiserror::Error;

/// Push failed because the ring is full. The record was not written.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("channel full")]
pub struct ChannelFull;

struct Shared<T> {
    /// `capacity - 1`; positions are masked into slot indices
    mask: u64,
    /// Slot storage; a slot is owned by the producer until the write
    /// position passes it, then by the consumer until the read position
    /// passes it
    slots: Box<[UnsafeCell<T>]>,
    /// Total number of positions published by the producer
    write: CachePadded<AtomicU64>,
    /// Total number of positions consumed by the consumer
    read: CachePadded<AtomicU64>,
}

// The position-counter protocol guarantees a slot is never accessed by
// both sides at once: the producer writes a slot strictly before the
// release store that exposes it, and the consumer reads it strictly
// after the acquire load that observes that store.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// Writing half of the channel. Owned by the engine thread.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Reading half of the channel. Owned by the drain thread.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a bounded SPSC channel of `capacity` slots.
///
/// # Panics
/// Panics if `capacity` is zero or not a power of two.
pub fn channel<T: Copy + Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity > 0 && capacity.is_power_of_two(),
        "channel capacity must be a power of two"
    );

    let slots: Box<[UnsafeCell<T>]> = (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();
    let shared = Arc::new(Shared {
        mask: capacity as u64 - 1,
        slots,
        write: CachePadded::new(AtomicU64::new(0)),
        read: CachePadded::new(AtomicU64::new(0)),
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl<T: Copy> Producer<T> {
    /// Append a record. Fails without overwriting when the ring is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), ChannelFull> {
        let shared = &*self.shared;
        let wp = shared.write.load(Ordering::Relaxed);
        let rp = shared.read.load(Ordering::Acquire);
        if wp.wrapping_sub(rp) > shared.mask {
            return Err(ChannelFull);
        }

        unsafe {
            *shared.slots[(wp & shared.mask) as usize].get() = value;
        }
        shared.write.store(wp.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Records currently queued. May momentarily under-estimate from
    /// this side while the consumer advances.
    #[inline]
    pub fn len(&self) -> u64 {
        let shared = &*self.shared;
        shared
            .write
            .load(Ordering::Acquire)
            .wrapping_sub(shared.read.load(Ordering::Acquire))
    }

    /// True when no record is queued
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot count of the ring
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}

impl<T: Copy> Consumer<T> {
    /// Remove and return the oldest record, or `None` when empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let rp = shared.read.load(Ordering::Relaxed);
        if rp == shared.write.load(Ordering::Acquire) {
            return None;
        }

        let value = unsafe { *shared.slots[(rp & shared.mask) as usize].get() };
        shared.read.store(rp.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Records currently queued. May momentarily over-estimate from
    /// this side while the producer publishes.
    #[inline]
    pub fn len(&self) -> u64 {
        let shared = &*self.shared;
        shared
            .write
            .load(Ordering::Acquire)
            .wrapping_sub(shared.read.load(Ordering::Acquire))
    }

    /// True when no record is queued
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot count of the ring
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}
