//! Matching engine - the order lifecycle orchestrator.
//!
//! Implements the cross/rest algorithm with stop triggering:
//! 1. CROSSING: match an aggressor against the opposite side in strict
//!    price-time priority, publishing one trade record per fill
//! 2. TRIGGERING: after all matching for a submit, fire armed stops
//!    against the final executed price (once, never per print)
//! 3. RESTING: place any limit remainder in the book
//!
//! Everything here runs on one thread; the trade channel is the only
//! boundary another thread ever observes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace};

use crate::arena::{LevelIx, OrderArena, OrderIx, NIL};
use crate::command::{
    OrderType, Reject, Side, TradeRecord, TriggeredStop, BUY_MARKET_PRICE, SELL_MARKET_PRICE,
};
use crate::order_book::OrderBook;
use crate::price_level::LevelArena;
use crate::ring::{self, Consumer, Producer};

/// First id minted for stops re-entering the book after triggering.
/// External ids must stay below this.
pub const INTERNAL_ID_BASE: u64 = 1_000_000_000;

/// Default trade channel capacity (power of two)
pub const DEFAULT_TRADE_CAPACITY: usize = 65_536;

/// The matching engine core: pools, book, and the producing half of the
/// trade channel.
pub struct MatchingEngine {
    /// Order node pool
    pub(crate) orders: OrderArena,
    /// Price level pool, shared by all four trees
    pub(crate) levels: LevelArena,
    /// The book: trees and indices
    pub(crate) book: OrderBook,
    /// Producing half of the trade channel
    trades: Producer<TradeRecord>,
    /// Monotonic sequence stamped on every executed trade
    seq: u64,
    /// Next id for internally re-submitted (triggered) stops
    next_internal_id: u64,
    /// Trades lost to channel back-pressure
    dropped_trades: u64,
}

impl MatchingEngine {
    /// Create an engine sized for `order_capacity` live orders, with the
    /// default trade channel capacity. Returns the engine and the
    /// consuming half of the channel for the drain thread.
    pub fn new(order_capacity: u32) -> (Self, Consumer<TradeRecord>) {
        Self::with_trade_capacity(order_capacity, DEFAULT_TRADE_CAPACITY)
    }

    /// Create an engine with an explicit trade channel capacity
    /// (must be a power of two).
    pub fn with_trade_capacity(
        order_capacity: u32,
        trade_capacity: usize,
    ) -> (Self, Consumer<TradeRecord>) {
        let (trades, consumer) = ring::channel(trade_capacity);
        // Levels coalesce equal prices; a fifth of the order pool is
        // enough in any realistic book shape
        let level_capacity = (order_capacity / 5).max(8);

        let engine = Self {
            orders: OrderArena::new(order_capacity),
            levels: LevelArena::new(level_capacity),
            book: OrderBook::with_capacity(order_capacity as usize),
            trades,
            seq: 0,
            next_internal_id: INTERNAL_ID_BASE,
            dropped_trades: 0,
        };
        (engine, consumer)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Submit a new order.
    ///
    /// Market and limit orders match immediately; limit remainders rest.
    /// Stop and stop-limit orders arm in the stop book without matching.
    /// A rejected submit leaves the book exactly as it was, except that
    /// trades already executed before a residual-rest failure stand.
    pub fn submit(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        qty: u32,
        price: i64,
        stop_price: i64,
    ) -> Result<(), Reject> {
        self.submit_inner(id, side, kind, qty, price, stop_price, true)
    }

    fn submit_inner(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        qty: u32,
        price: i64,
        stop_price: i64,
        trigger_pass: bool,
    ) -> Result<(), Reject> {
        if qty == 0 {
            return Err(Reject::ZeroQuantity);
        }
        if self.book.contains(id) {
            return Err(Reject::DuplicateId(id));
        }

        if matches!(kind, OrderType::Stop | OrderType::StopLimit) {
            return self.arm_stop(id, side, kind, qty, price, stop_price);
        }

        // The unbounded sentinel stays internal: the type discriminator
        // decides, whatever price the caller passed
        let taker_price = match kind {
            OrderType::Market => match side {
                Side::Buy => BUY_MARKET_PRICE,
                Side::Sell => SELL_MARKET_PRICE,
            },
            _ => price,
        };

        let Some(taker) = self
            .orders
            .alloc(id, side, kind, qty, taker_price, stop_price)
        else {
            debug!(id, "order pool exhausted, submit dropped");
            return Err(Reject::PoolExhausted);
        };

        let mut last_price = 0i64;
        let mut traded = false;
        self.cross(taker, side, taker_price, &mut last_price, &mut traded);

        let mut triggered = Vec::new();
        if trigger_pass && traded {
            self.check_stops(last_price, side, &mut triggered);
        }

        let mut result = Ok(());
        if self.orders.get(taker).qty > 0 && kind == OrderType::Limit {
            if self.rest(taker, side).is_err() {
                // No level slot for the remainder: drop it rather than
                // leave a half-linked order. Executed trades stand.
                debug!(id, "level pool exhausted, limit remainder dropped");
                self.orders.free(taker);
                result = Err(Reject::PoolExhausted);
            }
        } else {
            self.orders.free(taker);
        }

        // Fired stops re-enter under fresh internal ids, with the
        // trigger pass suppressed so stop chains cannot cascade inside
        // one top-level submit
        for stop in &triggered {
            let new_id = self.next_internal_id;
            self.next_internal_id += 1;
            let _ = self.submit_inner(new_id, stop.side, stop.convert_to, stop.qty, stop.limit_price, 0, false);
        }

        result
    }

    /// Cancel a resting or armed order. Returns `false` for unknown ids.
    pub fn cancel(&mut self, id: u64) -> bool {
        if let Some(&order) = self.book.resting.get(&id) {
            let (level, side) = {
                let o = self.orders.get(order);
                (o.level, o.side)
            };
            self.remove_from_level(order, level, side, false);
            self.book.resting.remove(&id);
            self.orders.free(order);
            return true;
        }

        if let Some(&order) = self.book.stops.get(&id) {
            let (level, side) = {
                let o = self.orders.get(order);
                (o.level, o.side)
            };
            self.remove_from_level(order, level, side, true);
            self.book.stops.remove(&id);
            self.orders.free(order);
            return true;
        }

        false
    }

    /// Reprice and/or resize a resting order. Stops cannot be modified.
    ///
    /// Same price keeps time priority and overwrites the share count in
    /// place; a new price re-homes the order at the tail of its new
    /// level, forfeiting time priority. Modify never crosses the book.
    pub fn modify(&mut self, id: u64, new_qty: u32, new_price: i64) -> bool {
        if new_qty == 0 {
            return false;
        }
        let Some(&order) = self.book.resting.get(&id) else {
            return false;
        };

        let old_price = self.orders.get(order).price;
        if new_price == old_price {
            self.orders.get_mut(order).qty = new_qty;
            return true;
        }

        let side = self.orders.get(order).side;

        // Secure the destination level before unlinking anything, so a
        // pool-exhausted modify fails with the book untouched
        let dest = {
            let tree = self.book.resting_tree_mut(side);
            match tree.insert_or_find(&mut self.levels, new_price) {
                Some(ix) => ix,
                None => return false,
            }
        };

        let old_level = self.orders.get(order).level;
        self.remove_from_level(order, old_level, side, false);

        {
            let o = self.orders.get_mut(order);
            o.price = new_price;
            o.qty = new_qty;
        }
        self.levels.push_back(&mut self.orders, dest, order);

        true
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Consume opposite-side liquidity until the taker is filled, the
    /// book is exhausted, or the cross test fails.
    fn cross(
        &mut self,
        taker: OrderIx,
        side: Side,
        taker_price: i64,
        last_price: &mut i64,
        traded: &mut bool,
    ) {
        let taker_id = self.orders.get(taker).id;

        while self.orders.get(taker).qty > 0 {
            // Best opposite level: lowest ask for a buy, highest bid for a sell
            let best = match side {
                Side::Buy => self.book.asks.min(&self.levels),
                Side::Sell => self.book.bids.max(&self.levels),
            };
            let Some(best) = best else { break };

            let best_price = self.levels.get(best).price;
            let crosses = match side {
                Side::Buy => taker_price >= best_price,
                Side::Sell => taker_price <= best_price,
            };
            if !crosses {
                break;
            }

            // Walk the maker FIFO head to tail
            let mut maker = self.levels.get(best).head;
            while maker != NIL && self.orders.get(taker).qty > 0 {
                let maker_id = self.orders.get(maker).id;
                let fill = self.orders.get(taker).qty.min(self.orders.get(maker).qty);

                // The sequence advances per executed trade whether or
                // not the record makes it into the channel
                let record = TradeRecord {
                    taker_id,
                    maker_id,
                    qty: fill,
                    price: best_price,
                    timestamp: self.seq,
                };
                self.seq += 1;
                if self.trades.push(record).is_err() {
                    self.dropped_trades += 1;
                    trace!(taker_id, maker_id, "trade channel full, record dropped");
                }
                *last_price = best_price;
                *traded = true;

                self.orders.get_mut(taker).qty -= fill;
                self.orders.get_mut(maker).qty -= fill;

                if self.orders.get(maker).qty == 0 {
                    self.levels.pop_front(&mut self.orders, best);
                    self.book.resting.remove(&maker_id);
                    self.orders.free(maker);
                    maker = self.levels.get(best).head;
                } else {
                    break;
                }
            }

            if self.levels.get(best).head == NIL {
                match side {
                    Side::Buy => self.book.asks.remove(&mut self.levels, best_price),
                    Side::Sell => self.book.bids.remove(&mut self.levels, best_price),
                }
            }
        }
    }

    /// Rest a limit remainder at its own side's level
    fn rest(&mut self, taker: OrderIx, side: Side) -> Result<(), Reject> {
        let price = self.orders.get(taker).price;
        let level = {
            let tree = self.book.resting_tree_mut(side);
            tree.insert_or_find(&mut self.levels, price)
                .ok_or(Reject::PoolExhausted)?
        };
        self.levels.push_back(&mut self.orders, level, taker);
        let id = self.orders.get(taker).id;
        self.book.resting.insert(id, taker);
        Ok(())
    }

    /// Arm a stop or stop-limit in the stop book, keyed by trigger price
    fn arm_stop(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        qty: u32,
        price: i64,
        stop_price: i64,
    ) -> Result<(), Reject> {
        let Some(order) = self.orders.alloc(id, side, kind, qty, price, stop_price) else {
            debug!(id, "order pool exhausted, stop dropped");
            return Err(Reject::PoolExhausted);
        };

        let level = {
            let tree = self.book.stop_tree_mut(side);
            tree.insert_or_find(&mut self.levels, stop_price)
        };
        let Some(level) = level else {
            self.orders.free(order);
            debug!(id, "level pool exhausted, stop dropped");
            return Err(Reject::PoolExhausted);
        };

        self.levels.push_back(&mut self.orders, level, order);
        self.book.stops.insert(id, order);
        Ok(())
    }

    // ========================================================================
    // Stop triggering
    // ========================================================================

    /// Fire every stop level the final trade price reached, collecting
    /// descriptors for re-submission by the caller.
    ///
    /// A sell aggressor realizes a falling price: sell stops fire from
    /// the highest trigger down while `trigger >= last_price`. A buy
    /// aggressor mirrors on the buy stops from the lowest trigger up.
    fn check_stops(&mut self, last_price: i64, taker_side: Side, out: &mut Vec<TriggeredStop>) {
        match taker_side {
            Side::Sell => {
                while let Some(level) = self.book.stop_asks.max(&self.levels) {
                    let trigger = self.levels.get(level).price;
                    if trigger < last_price {
                        break;
                    }
                    self.drain_stop_level(level, out);
                    self.book.stop_asks.remove(&mut self.levels, trigger);
                }
            }
            Side::Buy => {
                while let Some(level) = self.book.stop_bids.min(&self.levels) {
                    let trigger = self.levels.get(level).price;
                    if trigger > last_price {
                        break;
                    }
                    self.drain_stop_level(level, out);
                    self.book.stop_bids.remove(&mut self.levels, trigger);
                }
            }
        }

        if !out.is_empty() {
            debug!(count = out.len(), last_price, "stop orders triggered");
        }
    }

    /// Convert every order in a fired stop level into a triggered
    /// descriptor, unindex it, and recycle it. The level's queue is left
    /// empty for the tree removal that follows.
    fn drain_stop_level(&mut self, level: LevelIx, out: &mut Vec<TriggeredStop>) {
        let mut cur = self.levels.get(level).head;
        while cur != NIL {
            let (id, side, kind, qty, price, next) = {
                let o = self.orders.get(cur);
                (o.id, o.side, o.kind, o.qty, o.price, o.next)
            };
            out.push(TriggeredStop {
                original_id: id,
                side,
                convert_to: if kind == OrderType::Stop {
                    OrderType::Market
                } else {
                    OrderType::Limit
                },
                qty,
                limit_price: price,
            });
            self.book.stops.remove(&id);
            self.orders.free(cur);
            cur = next;
        }

        let lv = self.levels.get_mut(level);
        lv.head = NIL;
        lv.tail = NIL;
    }

    // ========================================================================
    // Shared removal path
    // ========================================================================

    /// Unlink an order from its level and drop the level from the
    /// matching tree if it emptied.
    fn remove_from_level(&mut self, order: OrderIx, level: LevelIx, side: Side, is_stop: bool) {
        let emptied = self.levels.unlink(&mut self.orders, level, order);
        if emptied {
            let price = self.levels.get(level).price;
            let tree = if is_stop {
                self.book.stop_tree_mut(side)
            } else {
                self.book.resting_tree_mut(side)
            };
            tree.remove(&mut self.levels, price);
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Number of resting orders
    #[inline]
    pub fn resting_count(&self) -> usize {
        self.book.resting_count()
    }

    /// Number of armed stop orders
    #[inline]
    pub fn stop_count(&self) -> usize {
        self.book.stop_count()
    }

    /// Trades lost to trade channel back-pressure
    #[inline]
    pub fn dropped_trades(&self) -> u64 {
        self.dropped_trades
    }

    /// Best bid price (highest resting buy)
    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.book.best_bid(&self.levels)
    }

    /// Best ask price (lowest resting sell)
    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.book.best_ask(&self.levels)
    }

    /// Spread between the best prices
    #[inline]
    pub fn spread(&self) -> Option<i64> {
        self.book.spread(&self.levels)
    }

    /// Pre-fault both pools (warm-up routine)
    pub fn warm_up(&self) {
        self.orders.warm_up();
        self.levels.warm_up();
    }

    /// Hash of the externally observable state, for determinism testing
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.book.resting_count().hash(&mut hasher);
        self.book.stop_count().hash(&mut hasher);
        self.orders.allocated().hash(&mut hasher);
        self.levels.allocated().hash(&mut hasher);
        self.seq.hash(&mut hasher);
        self.dropped_trades.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("resting", &self.book.resting_count())
            .field("stops", &self.book.stop_count())
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("seq", &self.seq)
            .field("dropped_trades", &self.dropped_trades)
            .finish()
    }
}
