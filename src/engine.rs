//! Engine - action dispatch over the matching core.
//!
//! A thin facade that owns the [`MatchingEngine`] and maps [`Action`]
//! values onto its entry points. Drivers that already know which call
//! they want can use the direct methods instead.

use crate::command::{Action, OrderType, Reject, Side, TradeRecord};
use crate::matching::MatchingEngine;
use crate::ring::Consumer;

/// The engine: owns all book state and the producing half of the trade
/// channel. Strictly single-threaded; hand the returned [`Consumer`] to
/// the drain thread.
pub struct Engine {
    /// The underlying matching engine
    pub matcher: MatchingEngine,
}

impl Engine {
    /// Create an engine sized for `order_capacity` live orders.
    /// Returns the engine and the trade channel consumer.
    pub fn new(order_capacity: u32) -> (Self, Consumer<TradeRecord>) {
        let (matcher, consumer) = MatchingEngine::new(order_capacity);
        (Self { matcher }, consumer)
    }

    /// Create an engine with an explicit trade channel capacity
    /// (must be a power of two).
    pub fn with_trade_capacity(
        order_capacity: u32,
        trade_capacity: usize,
    ) -> (Self, Consumer<TradeRecord>) {
        let (matcher, consumer) = MatchingEngine::with_trade_capacity(order_capacity, trade_capacity);
        (Self { matcher }, consumer)
    }

    /// Apply one action. Returns `true` if it took effect: a submit was
    /// accepted, a cancel removed an order, or a modify repositioned one.
    #[inline]
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Submit(o) => self
                .matcher
                .submit(o.id, o.side, o.kind, o.qty, o.price, o.stop_price)
                .is_ok(),
            Action::Cancel(c) => self.matcher.cancel(c.id),
            Action::Modify(m) => self.matcher.modify(m.id, m.new_qty, m.new_price),
        }
    }

    /// Submit a new order
    #[inline]
    pub fn submit(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        qty: u32,
        price: i64,
        stop_price: i64,
    ) -> Result<(), Reject> {
        self.matcher.submit(id, side, kind, qty, price, stop_price)
    }

    /// Cancel a resting or armed order
    #[inline]
    pub fn cancel(&mut self, id: u64) -> bool {
        self.matcher.cancel(id)
    }

    /// Reprice and/or resize a resting order
    #[inline]
    pub fn modify(&mut self, id: u64, new_qty: u32, new_price: i64) -> bool {
        self.matcher.modify(id, new_qty, new_price)
    }

    /// Number of resting orders
    #[inline]
    pub fn resting_count(&self) -> usize {
        self.matcher.resting_count()
    }

    /// Number of armed stop orders
    #[inline]
    pub fn stop_count(&self) -> usize {
        self.matcher.stop_count()
    }

    /// Trades lost to trade channel back-pressure
    #[inline]
    pub fn dropped_trades(&self) -> u64 {
        self.matcher.dropped_trades()
    }

    /// Best bid price
    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.matcher.best_bid()
    }

    /// Best ask price
    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.matcher.best_ask()
    }

    /// Spread between the best prices
    #[inline]
    pub fn spread(&self) -> Option<i64> {
        self.matcher.spread()
    }

    /// Pre-fault the pools (warm-up routine)
    pub fn warm_up(&self) {
        self.matcher.warm_up();
    }

    /// Hash of the externally observable state, for determinism testing
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }
}
