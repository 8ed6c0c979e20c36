//! Order book - the resting and stop sides of the market.
//!
//! Holds the four price trees (resting buy/sell, stop buy/sell) and the
//! two id-to-node maps used for O(1) cancel/modify lookup. The trees are
//! strictly disjoint: an order id lives in at most one of them.

use rustc_hash::FxHashMap;

use crate::arena::OrderIx;
use crate::command::Side;
use crate::price_level::LevelArena;
use crate::tree::LevelTree;

/// Mapping from order id to pool index for O(1) lookup
pub type OrderMap = FxHashMap<u64, OrderIx>;

/// The book: four trees of price levels plus the two order indices.
pub struct OrderBook {
    /// Resting buy levels (best = max)
    pub(crate) bids: LevelTree,
    /// Resting sell levels (best = min)
    pub(crate) asks: LevelTree,
    /// Armed buy stops, keyed by trigger price
    pub(crate) stop_bids: LevelTree,
    /// Armed sell stops, keyed by trigger price
    pub(crate) stop_asks: LevelTree,
    /// Resting order lookup: id -> pool index
    pub(crate) resting: OrderMap,
    /// Armed stop lookup: id -> pool index
    pub(crate) stops: OrderMap,
}

impl OrderBook {
    /// Create an empty book with map capacity pre-reserved for `orders`
    pub fn with_capacity(orders: usize) -> Self {
        Self {
            bids: LevelTree::new(),
            asks: LevelTree::new(),
            stop_bids: LevelTree::new(),
            stop_asks: LevelTree::new(),
            resting: OrderMap::with_capacity_and_hasher(orders, Default::default()),
            stops: OrderMap::with_capacity_and_hasher(orders / 4, Default::default()),
        }
    }

    /// The resting tree for a side
    #[inline]
    pub(crate) fn resting_tree_mut(&mut self, side: Side) -> &mut LevelTree {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// The stop tree for a side
    #[inline]
    pub(crate) fn stop_tree_mut(&mut self, side: Side) -> &mut LevelTree {
        match side {
            Side::Buy => &mut self.stop_bids,
            Side::Sell => &mut self.stop_asks,
        }
    }

    /// True if the id is resting or armed
    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.resting.contains_key(&id) || self.stops.contains_key(&id)
    }

    /// Number of resting orders
    #[inline]
    pub fn resting_count(&self) -> usize {
        self.resting.len()
    }

    /// Number of armed stop orders
    #[inline]
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Best bid price (highest resting buy)
    #[inline]
    pub fn best_bid(&self, levels: &LevelArena) -> Option<i64> {
        self.bids.max(levels).map(|ix| levels.get(ix).price)
    }

    /// Best ask price (lowest resting sell)
    #[inline]
    pub fn best_ask(&self, levels: &LevelArena) -> Option<i64> {
        self.asks.min(levels).map(|ix| levels.get(ix).price)
    }

    /// Spread (best ask minus best bid) when both sides are present
    pub fn spread(&self, levels: &LevelArena) -> Option<i64> {
        match (self.best_bid(levels), self.best_ask(levels)) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("resting", &self.resting.len())
            .field("stops", &self.stops.len())
            .finish()
    }
}
