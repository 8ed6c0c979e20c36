//! Order pool - O(1) slab allocator with cache-line aligned nodes.
//!
//! The pool pre-allocates a contiguous block of order nodes at startup,
//! eliminating heap allocation in the hot path. A free list threaded
//! through the `next` link gives O(1) allocation and deallocation.

use std::fmt;

use crate::command::{OrderType, Side};

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NIL: u32 = u32::MAX;

/// Index into the order pool - a "compressed pointer".
/// Using u32 instead of 64-bit pointers halves linkage size.
pub type OrderIx = u32;

/// Index into the level pool (see [`crate::price_level`]).
pub type LevelIx = u32;

/// A single order - exactly 64 bytes (one cache line).
///
/// Live orders sit in a price level's FIFO via the `next`/`prev` links
/// and remember their owning level through `level`. Free slots reuse
/// `next` as the free-list link; every other field is meaningless then.
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct OrderNode {
    /// External order ID
    pub id: u64,
    /// Limit price in ticks (unbounded sentinel for market-style intents)
    pub price: i64,
    /// Trigger price in ticks; 0 when not applicable
    pub stop_price: i64,
    /// Remaining share count; strictly positive while resting
    pub qty: u32,
    /// Next order at the same price level (free-list link when free)
    pub next: OrderIx,
    /// Previous order at the same price level (enables O(1) cancel)
    pub prev: OrderIx,
    /// Back reference to the owning price level
    pub level: LevelIx,
    /// Order side
    pub side: Side,
    /// Order type
    pub kind: OrderType,
}

const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

impl OrderNode {
    /// Create an empty/uninitialized node (for the free list)
    #[inline]
    pub const fn empty() -> Self {
        Self {
            id: 0,
            price: 0,
            stop_price: 0,
            qty: 0,
            next: NIL,
            prev: NIL,
            level: NIL,
            side: Side::Buy,
            kind: OrderType::Limit,
        }
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("kind", &self.kind)
            .field("qty", &self.qty)
            .field("price", &self.price)
            .field("stop_price", &self.stop_price)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("level", &self.level)
            .finish()
    }
}

/// Pre-allocated order pool with O(1) allocation and deallocation.
///
/// No system calls or locks in the hot path. Nodes are never relocated
/// while alive, so indices stay valid for an order's whole lifetime.
pub struct OrderArena {
    /// Contiguous block of pre-allocated nodes
    nodes: Vec<OrderNode>,
    /// Head of the free list (index of first available node)
    free_head: OrderIx,
    /// Number of currently allocated nodes
    allocated: u32,
    /// Total capacity
    capacity: u32,
}

impl OrderArena {
    /// Create a new pool holding up to `capacity` orders.
    ///
    /// # Panics
    /// Panics if capacity is 0 or would collide with the `NIL` sentinel.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0 && capacity < NIL, "invalid pool capacity");

        let mut nodes = vec![OrderNode::empty(); capacity as usize];

        // Thread the free list through all nodes
        for i in 0..(capacity - 1) {
            nodes[i as usize].next = i + 1;
        }
        nodes[(capacity - 1) as usize].next = NIL;

        Self {
            nodes,
            free_head: 0,
            allocated: 0,
            capacity,
        }
    }

    /// Allocate a node and write the caller-supplied fields.
    ///
    /// Returns `None` if the pool is exhausted; the caller must treat
    /// that as a dropped action.
    #[inline]
    pub fn alloc(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        qty: u32,
        price: i64,
        stop_price: i64,
    ) -> Option<OrderIx> {
        if self.free_head == NIL {
            return None;
        }

        let index = self.free_head;
        self.free_head = self.nodes[index as usize].next;
        self.allocated += 1;

        let node = &mut self.nodes[index as usize];
        node.id = id;
        node.side = side;
        node.kind = kind;
        node.qty = qty;
        node.price = price;
        node.stop_price = stop_price;
        node.next = NIL;
        node.prev = NIL;
        node.level = NIL;

        Some(index)
    }

    /// Return a node to the pool.
    ///
    /// The caller must ensure the index was previously allocated and has
    /// not already been freed.
    #[inline]
    pub fn free(&mut self, index: OrderIx) {
        debug_assert!(index < self.capacity, "index out of bounds");
        debug_assert!(self.allocated > 0, "double free detected");

        let node = &mut self.nodes[index as usize];
        node.prev = NIL;
        node.level = NIL;
        node.next = self.free_head;
        self.free_head = index;
        self.allocated -= 1;
    }

    /// Get an immutable reference to a node.
    #[inline]
    pub fn get(&self, index: OrderIx) -> &OrderNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &self.nodes[index as usize]
    }

    /// Get a mutable reference to a node.
    #[inline]
    pub fn get_mut(&mut self, index: OrderIx) -> &mut OrderNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &mut self.nodes[index as usize]
    }

    /// Number of currently allocated nodes.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Total capacity of the pool.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns true if no free node remains.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NIL
    }

    /// Pre-fault all memory pages (warm-up routine).
    ///
    /// Touches every node so the OS maps virtual pages to physical RAM
    /// before the hot path runs.
    pub fn warm_up(&self) {
        for node in &self.nodes {
            let _ = unsafe { std::ptr::read_volatile(&node.qty) };
        }
    }
}

impl fmt::Debug for OrderArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderArena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated)
            .field("free_head", &self.free_head)
            .finish()
    }
}
